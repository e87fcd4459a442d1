//! Per-run transformation state
//!
//! One [`TransformationContext`] lives for one pipeline run. It is passed by
//! reference into every `transform` call and is never persisted.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::graph::NodeId;

/// One applied rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRecord {
    /// Pass that rewrote
    pub pass: &'static str,
    /// Name of the node the pass was visiting
    pub node: String,
    /// 1-based sweep number
    pub sweep: usize,
}

/// A declined rewrite worth reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Pass that declined
    pub pass: &'static str,
    /// Name of the node the pass was visiting
    pub node: String,
    /// Human readable reason
    pub message: String,
}

/// Precision attached to a value produced by a fusion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantizedPrecision {
    /// Number of levels the value is snapped to
    pub levels: i64,
}

/// Mutable state shared by the passes of one pipeline run
#[derive(Debug, Default)]
pub struct TransformationContext {
    sweep: usize,
    current_pass: Option<&'static str>,
    visited: FxHashSet<NodeId>,
    log: Vec<RewriteRecord>,
    diagnostics: Vec<Diagnostic>,
    precision: FxHashMap<NodeId, QuantizedPrecision>,
}

impl TransformationContext {
    /// Create a fresh context
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Sweep bookkeeping
    // ========================================================================

    /// Start visiting the graph with `pass`; clears the visited set
    pub fn begin_pass(&mut self, pass: &'static str, sweep: usize) {
        self.current_pass = Some(pass);
        self.sweep = sweep;
        self.visited.clear();
    }

    /// Current 1-based sweep number (0 before the first sweep)
    pub fn sweep(&self) -> usize {
        self.sweep
    }

    /// Pass currently visiting nodes
    pub fn current_pass(&self) -> Option<&'static str> {
        self.current_pass
    }

    /// Mark a node visited by the current pass.
    ///
    /// Returns `false` if it was already visited in this sweep.
    pub fn mark_visited(&mut self, node: NodeId) -> bool {
        self.visited.insert(node)
    }

    /// Check if the current pass already visited `node` this sweep
    pub fn is_visited(&self, node: NodeId) -> bool {
        self.visited.contains(&node)
    }

    // ========================================================================
    // Rewrite log and diagnostics
    // ========================================================================

    /// Record a successful rewrite by the current pass
    pub fn record_rewrite(&mut self, node: impl Into<String>) {
        if let Some(pass) = self.current_pass {
            self.log.push(RewriteRecord {
                pass,
                node: node.into(),
                sweep: self.sweep,
            });
        }
    }

    /// Applied rewrites in order
    pub fn rewrites(&self) -> &[RewriteRecord] {
        &self.log
    }

    /// Number of rewrites recorded for `pass`
    pub fn rewrite_count(&self, pass: &str) -> usize {
        self.log.iter().filter(|r| r.pass == pass).count()
    }

    /// Record a declined rewrite.
    ///
    /// A node declined again by the same pass in a later sweep is recorded
    /// once; returns `false` for such repeats.
    pub fn add_diagnostic(
        &mut self,
        pass: &'static str,
        node: impl Into<String>,
        message: impl Into<String>,
    ) -> bool {
        let node = node.into();
        if self
            .diagnostics
            .iter()
            .any(|d| d.pass == pass && d.node == node)
        {
            return false;
        }
        self.diagnostics.push(Diagnostic {
            pass,
            node,
            message: message.into(),
        });
        true
    }

    /// Diagnostics in order
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    // ========================================================================
    // Precision annotations
    // ========================================================================

    /// Annotate the value produced by `node` as snapped to `levels`
    pub fn annotate_precision(&mut self, node: NodeId, levels: i64) {
        self.precision.insert(node, QuantizedPrecision { levels });
    }

    /// Precision annotation of `node`, if any
    pub fn precision(&self, node: NodeId) -> Option<QuantizedPrecision> {
        self.precision.get(&node).copied()
    }

    /// Number of annotated nodes
    pub fn annotated_count(&self) -> usize {
        self.precision.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visited_cleared_per_pass() {
        let mut ctx = TransformationContext::new();
        let n = NodeId(3);

        ctx.begin_pass("a", 1);
        assert!(ctx.mark_visited(n));
        assert!(!ctx.mark_visited(n));
        assert!(ctx.is_visited(n));

        ctx.begin_pass("b", 1);
        assert!(!ctx.is_visited(n));
        assert_eq!(ctx.current_pass(), Some("b"));
    }

    #[test]
    fn test_rewrite_log() {
        let mut ctx = TransformationContext::new();
        ctx.record_rewrite("ignored");
        assert!(ctx.rewrites().is_empty());

        ctx.begin_pass("fuse", 2);
        ctx.record_rewrite("q0");
        ctx.record_rewrite("q1");
        assert_eq!(ctx.rewrite_count("fuse"), 2);
        assert_eq!(ctx.rewrite_count("other"), 0);
        assert_eq!(ctx.rewrites()[1].sweep, 2);
    }

    #[test]
    fn test_annotations_and_diagnostics() {
        let mut ctx = TransformationContext::new();
        ctx.annotate_precision(NodeId(1), 256);
        assert_eq!(ctx.precision(NodeId(1)), Some(QuantizedPrecision { levels: 256 }));
        assert!(ctx.precision(NodeId(2)).is_none());
        assert_eq!(ctx.annotated_count(), 1);

        assert!(ctx.add_diagnostic("fuse", "q", "levels must be >= 2"));
        assert_eq!(ctx.diagnostics()[0].node, "q");
    }

    #[test]
    fn test_repeated_diagnostic_recorded_once() {
        let mut ctx = TransformationContext::new();
        assert!(ctx.add_diagnostic("fuse", "q", "levels must be >= 2"));
        assert!(!ctx.add_diagnostic("fuse", "q", "levels must be >= 2"));
        assert!(ctx.add_diagnostic("other", "q", "declined"));
        assert!(ctx.add_diagnostic("fuse", "q2", "declined"));
        assert_eq!(ctx.diagnostics().len(), 3);
    }
}
