//! Transformation pipeline
//!
//! Orders passes, visits every node once per pass per sweep, and repeats
//! sweeps until nothing changes or the sweep budget runs out.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{OptResult, TransformError};
use crate::graph::Graph;
use crate::traits::Transformation;

use super::context::{Diagnostic, TransformationContext};
use super::registry::{ParamValue, PassParams, PassRegistry};

fn default_max_sweeps() -> usize {
    10
}

fn default_true() -> bool {
    true
}

/// Pipeline configuration, loadable with serde
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on full sweeps over all passes
    pub max_sweeps: usize,
    /// Remove nodes no result depends on after the run
    pub prune_dead_nodes: bool,
    /// Run [`Graph::validate`] after every rewrite
    pub validate_after_rewrite: bool,
    /// Passes to instantiate, in registration order
    pub passes: Vec<PassConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_sweeps: default_max_sweeps(),
            prune_dead_nodes: true,
            validate_after_rewrite: false,
            passes: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Default settings with every pass of `registry` enabled
    pub fn all_passes(registry: &PassRegistry) -> Self {
        Self {
            passes: registry.ids().map(PassConfig::new).collect(),
            ..Self::default()
        }
    }
}

/// Configuration of one pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassConfig {
    /// Registered pass id
    pub id: String,
    /// Disabled passes are skipped entirely
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Overrides the pass's default priority
    #[serde(default)]
    pub priority: Option<i32>,
    /// Pass-specific parameters
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
}

impl PassConfig {
    /// Enabled pass with default priority and parameters
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            priority: None,
            params: BTreeMap::new(),
        }
    }
}

/// Outcome of a pipeline run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    /// Rewrite count per enabled pass, in schedule order; zero counts included
    pub passes_applied: IndexMap<String, usize>,
    /// The sweep budget ran out while passes were still rewriting
    pub did_not_converge: bool,
    /// Sweeps performed
    pub total_sweeps: usize,
    /// Net reduction in live nodes
    pub nodes_removed: usize,
    /// Declined rewrites reported by passes
    pub diagnostics: Vec<Diagnostic>,
}

impl Stats {
    /// Rewrites across all passes
    pub fn total_rewrites(&self) -> usize {
        self.passes_applied.values().sum()
    }

    /// Rewrites by `pass` (0 if the pass did not run)
    pub fn rewrites(&self, pass: &str) -> usize {
        self.passes_applied.get(pass).copied().unwrap_or(0)
    }
}

struct ScheduledPass {
    pass: Box<dyn Transformation>,
    priority: i32,
}

/// Ordered set of passes plus run options
pub struct Pipeline {
    passes: Vec<ScheduledPass>,
    max_sweeps: usize,
    prune_dead_nodes: bool,
    validate_after_rewrite: bool,
}

impl Default for Pipeline {
    fn default() -> Self {
        let config = PipelineConfig::default();
        Self {
            passes: Vec::new(),
            max_sweeps: config.max_sweeps,
            prune_dead_nodes: config.prune_dead_nodes,
            validate_after_rewrite: config.validate_after_rewrite,
        }
    }
}

impl Pipeline {
    /// Empty pipeline with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Every builtin pass with default priorities and parameters
    pub fn builtin() -> OptResult<Self> {
        let registry = PassRegistry::builtin();
        Self::from_config(&registry, &PipelineConfig::all_passes(&registry))
    }

    /// Instantiate the enabled passes of `config` from `registry`.
    ///
    /// Unknown ids fail with `UnknownPass`, even when disabled. Ordering
    /// hints are checked eagerly.
    pub fn from_config(registry: &PassRegistry, config: &PipelineConfig) -> OptResult<Self> {
        let mut pipeline = Self::new()
            .with_max_sweeps(config.max_sweeps)
            .with_pruning(config.prune_dead_nodes)
            .with_validation(config.validate_after_rewrite);

        let mut seen = FxHashSet::default();
        for pass_config in &config.passes {
            if !registry.contains(&pass_config.id) {
                return Err(TransformError::UnknownPass(pass_config.id.clone()));
            }
            if !seen.insert(pass_config.id.as_str()) {
                return Err(TransformError::InvalidPassParam {
                    pass: pass_config.id.clone(),
                    param: "id".to_string(),
                    reason: "pass listed more than once".to_string(),
                });
            }
            if !pass_config.enabled {
                continue;
            }

            let params = PassParams::new(&pass_config.id, pass_config.params.clone());
            let pass = registry.create(&pass_config.id, &params)?;
            let priority = pass_config.priority.unwrap_or(pass.descriptor().priority);
            pipeline = pipeline.with_pass_priority(pass, priority);
        }

        pipeline.schedule()?;
        Ok(pipeline)
    }

    /// Add a pass at its default priority
    pub fn with_pass(self, pass: Box<dyn Transformation>) -> Self {
        let priority = pass.descriptor().priority;
        self.with_pass_priority(pass, priority)
    }

    /// Add a pass at an explicit priority
    pub fn with_pass_priority(mut self, pass: Box<dyn Transformation>, priority: i32) -> Self {
        self.passes.push(ScheduledPass { pass, priority });
        self
    }

    /// Set the sweep budget (at least one sweep always runs)
    pub fn with_max_sweeps(mut self, max_sweeps: usize) -> Self {
        self.max_sweeps = max_sweeps.max(1);
        self
    }

    /// Enable or disable the final dead-node pruning
    pub fn with_pruning(mut self, enabled: bool) -> Self {
        self.prune_dead_nodes = enabled;
        self
    }

    /// Enable or disable validation after every rewrite
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate_after_rewrite = enabled;
        self
    }

    /// Pass ids in execution order
    pub fn pass_order(&self) -> OptResult<Vec<&'static str>> {
        Ok(self
            .schedule()?
            .into_iter()
            .map(|i| self.passes[i].pass.id())
            .collect())
    }

    /// Priority order (stable by insertion), adjusted so every `runs_after`
    /// hint naming a pass in this pipeline is honored.
    fn schedule(&self) -> OptResult<Vec<usize>> {
        let index: IndexMap<&str, usize> = self
            .passes
            .iter()
            .enumerate()
            .map(|(i, p)| (p.pass.id(), i))
            .collect();

        let mut pending = vec![0usize; self.passes.len()];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); self.passes.len()];
        for (i, p) in self.passes.iter().enumerate() {
            for before in p.pass.descriptor().runs_after {
                if let Some(&j) = index.get(before) {
                    successors[j].push(i);
                    pending[i] += 1;
                }
            }
        }

        let mut ready: BinaryHeap<Reverse<(i32, usize)>> = pending
            .iter()
            .enumerate()
            .filter(|&(_, &n)| n == 0)
            .map(|(i, _)| Reverse((self.passes[i].priority, i)))
            .collect();

        let mut order = Vec::with_capacity(self.passes.len());
        while let Some(Reverse((_, i))) = ready.pop() {
            order.push(i);
            for &s in &successors[i] {
                pending[s] -= 1;
                if pending[s] == 0 {
                    ready.push(Reverse((self.passes[s].priority, s)));
                }
            }
        }

        if order.len() != self.passes.len() {
            let stuck: Vec<&str> = pending
                .iter()
                .enumerate()
                .filter(|&(_, &n)| n > 0)
                .map(|(i, _)| self.passes[i].pass.id())
                .collect();
            return Err(TransformError::OrderingCycle(stuck.join(", ")));
        }
        Ok(order)
    }

    /// Optimize `graph` in place
    #[tracing::instrument(skip_all, fields(passes = self.passes.len(), nodes = graph.live_node_count()))]
    pub fn run(&self, graph: &mut Graph) -> OptResult<Stats> {
        let mut ctx = TransformationContext::new();
        self.run_with_context(&mut ctx, graph)
    }

    /// Optimize `graph` in place, keeping rewrite log and precision
    /// annotations in `ctx` for the caller
    pub fn run_with_context(
        &self,
        ctx: &mut TransformationContext,
        graph: &mut Graph,
    ) -> OptResult<Stats> {
        let order = self.schedule()?;
        let live_before = graph.live_node_count();
        let diagnostics_before = ctx.diagnostics().len();

        let mut stats = Stats::default();
        for &i in &order {
            stats
                .passes_applied
                .insert(self.passes[i].pass.id().to_string(), 0);
        }

        let mut converged = false;
        for sweep in 1..=self.max_sweeps {
            stats.total_sweeps = sweep;
            let mut sweep_rewrites = 0;

            for &i in &order {
                let pass = self.passes[i].pass.as_ref();
                let applied = self.run_pass(ctx, graph, pass, sweep)?;
                if applied > 0 {
                    *stats.passes_applied.entry(pass.id().to_string()).or_default() += applied;
                }
                sweep_rewrites += applied;
            }

            tracing::debug!(sweep, rewrites = sweep_rewrites, "sweep finished");
            if sweep_rewrites == 0 {
                converged = true;
                break;
            }
        }

        stats.did_not_converge = !converged;
        if !converged {
            tracing::warn!(max_sweeps = self.max_sweeps, "pipeline did not reach a fixpoint");
        }

        if self.prune_dead_nodes {
            let pruned = graph.prune_dead_nodes()?;
            tracing::debug!(pruned, "dead nodes pruned");
        }

        stats.nodes_removed = live_before.saturating_sub(graph.live_node_count());
        stats.diagnostics = ctx.diagnostics()[diagnostics_before..].to_vec();

        tracing::info!(
            sweeps = stats.total_sweeps,
            rewrites = stats.total_rewrites(),
            nodes_removed = stats.nodes_removed,
            converged,
            "pipeline finished"
        );
        Ok(stats)
    }

    /// One pass over a snapshot of the graph in reverse topological order.
    ///
    /// Returns the number of rewrites.
    fn run_pass(
        &self,
        ctx: &mut TransformationContext,
        graph: &mut Graph,
        pass: &dyn Transformation,
        sweep: usize,
    ) -> OptResult<usize> {
        let id = pass.id();
        if !pass.is_applicable(graph) {
            tracing::trace!(pass = id, "not applicable, skipping");
            return Ok(0);
        }

        ctx.begin_pass(id, sweep);
        let snapshot = graph.reverse_topological_order();
        let mut rewrites = 0;

        for node in snapshot {
            if !graph.contains(node) || !ctx.mark_visited(node) {
                continue;
            }
            if !pass.matches(graph, node) {
                continue;
            }

            let name = graph.display_name(node);
            tracing::trace!(pass = id, node = %name, "pattern matched");

            match pass.transform(ctx, graph, node) {
                Ok(true) => {
                    rewrites += 1;
                    tracing::debug!(pass = id, node = %name, sweep, "rewrite applied");
                    if self.validate_after_rewrite {
                        graph.validate().map_err(|e| pass_failed(id, &name, e))?;
                    }
                    ctx.record_rewrite(name);
                }
                Ok(false) => {
                    tracing::trace!(pass = id, node = %name, "rewrite declined");
                }
                Err(e) if e.is_recoverable() => {
                    let message = e.to_string();
                    if ctx.add_diagnostic(id, name.as_str(), message) {
                        tracing::warn!(pass = id, node = %name, error = %e, "rewrite declined");
                    } else {
                        tracing::trace!(pass = id, node = %name, "rewrite declined again");
                    }
                }
                Err(e) => return Err(pass_failed(id, &name, e)),
            }
        }

        Ok(rewrites)
    }
}

fn pass_failed(pass: &str, node: &str, source: TransformError) -> TransformError {
    TransformError::PassFailed {
        pass: pass.to_string(),
        node: node.to_string(),
        source: Box::new(source),
    }
}
