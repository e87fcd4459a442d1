//! Graph mutation operations
//!
//! Methods for modifying the graph structure: adding, removing, rewiring and
//! replacing nodes. Every public method either applies completely or leaves
//! the graph untouched.

use ndarray::ArrayD;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::error::{OptResult, TransformError};
use crate::tensor::ElementType;

use super::attrs::{AttrValue, Attributes};
use super::core::Graph;
use super::node::{Consumer, Node, NodeId, OutputRef, OutputSlot, TensorType};
use super::op::{infer_outputs, OpKind, OutputTypes};

impl Graph {
    // ========================================================================
    // Node creation
    // ========================================================================

    /// Insert a new node.
    ///
    /// Output types come from the kind's inference rule; consumer
    /// back-references are wired on every input.
    pub fn add_node(
        &mut self,
        kind: OpKind,
        name: impl Into<String>,
        inputs: &[OutputRef],
        attrs: Attributes,
    ) -> OptResult<NodeId> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(TransformError::DuplicateName(name));
        }

        let input_types = self.resolve_inputs(&name, inputs)?;
        let output_types = infer_outputs(kind, &name, &input_types, &attrs)?;

        let id = NodeId(self.nodes.len() as u32);
        for (input, src) in inputs.iter().enumerate() {
            self.slot_mut(*src)?.consumers.push(Consumer { node: id, input });
        }

        match kind {
            OpKind::Parameter => self.parameters.push(id),
            OpKind::Result => self.results.push(id),
            _ => {}
        }

        self.names.insert(name.clone(), id);
        self.nodes.push(Some(Node {
            kind,
            name,
            inputs: SmallVec::from_slice(inputs),
            outputs: output_types.into_iter().map(OutputSlot::new).collect(),
            attrs,
        }));
        self.live += 1;
        self.invalidate_order();

        Ok(id)
    }

    /// Add a graph entry
    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        elem: ElementType,
        shape: &[usize],
    ) -> OptResult<NodeId> {
        let attrs = Attributes::new()
            .with("shape", AttrValue::Shape(shape.to_vec()))
            .with("element_type", elem);
        self.add_node(OpKind::Parameter, name, &[], attrs)
    }

    /// Add an f32 constant holding `value`
    pub fn add_constant(&mut self, name: impl Into<String>, value: ArrayD<f32>) -> OptResult<NodeId> {
        self.add_node(OpKind::Constant, name, &[], Attributes::new().with("value", value))
    }

    /// Designate `src` as a graph exit
    pub fn add_result(&mut self, name: impl Into<String>, src: OutputRef) -> OptResult<NodeId> {
        self.add_node(OpKind::Result, name, &[src], Attributes::new())
    }

    // ========================================================================
    // Rewiring
    // ========================================================================

    /// Point input `input` of `node` at `src`.
    ///
    /// Fails with `ShapeInference` when the new edge would close a cycle or
    /// when downstream types no longer infer; the old edge is kept then.
    pub fn set_input(&mut self, node: NodeId, input: usize, src: OutputRef) -> OptResult<()> {
        let name = self.try_node(node)?.name.clone();
        let arity = self.try_node(node)?.inputs.len();
        if input >= arity {
            return Err(TransformError::InvalidNode(format!(
                "'{}' has {} inputs, cannot set input {}",
                name, arity, input
            )));
        }
        self.resolve_inputs(&name, &[src])?;
        if self.reaches(node, src.node) {
            return Err(TransformError::shape(
                name,
                format!("wiring input {} to {} would create a cycle", input, src),
            ));
        }

        let old = self.rewire(node, input, src)?;
        if let Err(e) = self.refresh_types(&[node]) {
            self.rewire(node, input, old)?;
            return Err(e);
        }
        Ok(())
    }

    /// Move every consumer of `old`'s outputs onto `new_outputs` by index.
    ///
    /// Consumer order is preserved. `old` is removed afterwards unless it
    /// is a graph parameter.
    pub fn replace_node(&mut self, old: NodeId, new_outputs: &[OutputRef]) -> OptResult<()> {
        let node = self.try_node(old)?;
        let name = node.name.clone();

        if node.kind == OpKind::Result {
            return Err(TransformError::InvalidNode(format!(
                "result '{}' cannot be replaced",
                name
            )));
        }
        if node.outputs.len() != new_outputs.len() {
            return Err(TransformError::ArityMismatch {
                node: name,
                expected: node.outputs.len(),
                actual: new_outputs.len(),
            });
        }
        if new_outputs.iter().any(|r| r.node == old) {
            return Err(TransformError::InvalidNode(format!(
                "'{}' cannot be replaced by its own outputs",
                name
            )));
        }
        self.resolve_inputs(&name, new_outputs)?;

        let moves: Vec<(Consumer, OutputRef)> = node
            .outputs
            .iter()
            .zip(new_outputs)
            .flat_map(|(slot, &dst)| slot.consumers.iter().map(move |&c| (c, dst)))
            .collect();

        for (consumer, dst) in &moves {
            if self.reaches(consumer.node, dst.node) {
                return Err(TransformError::shape(
                    self.display_name(consumer.node),
                    format!("rewiring onto {} would create a cycle", dst),
                ));
            }
        }

        let mut undo = Vec::with_capacity(moves.len());
        for (consumer, dst) in &moves {
            let prev = self.rewire(consumer.node, consumer.input, *dst)?;
            undo.push((*consumer, prev));
        }

        let touched: Vec<NodeId> = moves.iter().map(|(c, _)| c.node).collect();
        if let Err(e) = self.refresh_types(&touched) {
            for (consumer, prev) in undo {
                self.rewire(consumer.node, consumer.input, prev)?;
            }
            return Err(e);
        }

        if self.try_node(old)?.kind != OpKind::Parameter {
            self.remove_node(old)?;
        }
        tracing::trace!(node = %name, consumers = moves.len(), "node replaced");
        Ok(())
    }

    // ========================================================================
    // Removal and renaming
    // ========================================================================

    /// Remove a node with no consumers and return it.
    pub fn remove_node(&mut self, id: NodeId) -> OptResult<Node> {
        let node = self.try_node(id)?;
        let consumers = node.consumer_count();
        if consumers > 0 {
            return Err(TransformError::DanglingConsumer {
                node: node.name.clone(),
                consumers,
            });
        }

        let inputs = node.inputs.clone();
        for (input, src) in inputs.iter().enumerate() {
            self.unlink(*src, Consumer { node: id, input })?;
        }

        let node = self.nodes[id.index()]
            .take()
            .ok_or_else(|| TransformError::NodeNotFound(id.to_string()))?;
        self.names.remove(&node.name);
        self.parameters.retain(|&p| p != id);
        self.results.retain(|&r| r != id);
        self.live -= 1;
        self.invalidate_order();

        Ok(node)
    }

    /// Give a node a new unique name
    pub fn rename_node(&mut self, id: NodeId, name: impl Into<String>) -> OptResult<()> {
        let name = name.into();
        let current = self.try_node(id)?.name.clone();
        if current == name {
            return Ok(());
        }
        if self.names.contains_key(&name) {
            return Err(TransformError::DuplicateName(name));
        }

        self.names.remove(&current);
        self.names.insert(name.clone(), id);
        self.node_mut(id)?.name = name;
        Ok(())
    }

    /// Remove every node that no result depends on. Parameters are kept.
    ///
    /// Returns the number of removed nodes.
    pub fn prune_dead_nodes(&mut self) -> OptResult<usize> {
        let mut alive: FxHashSet<NodeId> = FxHashSet::default();
        let mut stack: Vec<NodeId> = self.results.clone();
        stack.extend(self.parameters.iter().copied());

        while let Some(id) = stack.pop() {
            if !alive.insert(id) {
                continue;
            }
            if let Some(node) = self.node(id) {
                stack.extend(node.inputs.iter().map(|r| r.node));
            }
        }

        let dead: Vec<NodeId> = self
            .reverse_topological_order()
            .into_iter()
            .filter(|id| !alive.contains(id))
            .collect();

        for &id in &dead {
            let node = self.remove_node(id)?;
            tracing::trace!(node = %node.name, "dead node pruned");
        }
        Ok(dead.len())
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    /// Types of the referenced outputs, or `ShapeInference` naming `owner`
    fn resolve_inputs(&self, owner: &str, refs: &[OutputRef]) -> OptResult<Vec<TensorType>> {
        refs.iter()
            .map(|r| {
                self.output_type(*r).cloned().ok_or_else(|| {
                    TransformError::shape(owner, format!("input {} is not a live output", r))
                })
            })
            .collect()
    }

    fn slot_mut(&mut self, output: OutputRef) -> OptResult<&mut OutputSlot> {
        self.node_mut(output.node)?
            .outputs
            .get_mut(output.index)
            .ok_or_else(|| TransformError::Internal(format!("output {} out of range", output)))
    }

    fn unlink(&mut self, src: OutputRef, consumer: Consumer) -> OptResult<()> {
        let slot = self.slot_mut(src)?;
        match slot.consumers.iter().position(|c| *c == consumer) {
            Some(pos) => {
                slot.consumers.remove(pos);
                Ok(())
            }
            None => Err(TransformError::Internal(format!(
                "{} has no consumer entry for {}:{}",
                src, consumer.node, consumer.input
            ))),
        }
    }

    /// Move one input edge and return the previous source
    fn rewire(&mut self, node: NodeId, input: usize, src: OutputRef) -> OptResult<OutputRef> {
        let prev = self
            .try_node(node)?
            .input(input)
            .ok_or_else(|| TransformError::Internal(format!("{} has no input {}", node, input)))?;

        self.unlink(prev, Consumer { node, input })?;
        self.slot_mut(src)?.consumers.push(Consumer { node, input });
        self.node_mut(node)?.inputs[input] = src;
        self.invalidate_order();

        Ok(prev)
    }

    /// Re-run inference on `seeds` and on everything downstream whose
    /// input types changed. Nothing is written unless every node infers.
    fn refresh_types(&mut self, seeds: &[NodeId]) -> OptResult<()> {
        let mut pending: FxHashMap<NodeId, OutputTypes> = FxHashMap::default();
        let mut worklist: Vec<NodeId> = seeds.to_vec();

        while let Some(id) = worklist.pop() {
            let node = self.try_node(id)?;
            let input_types: Vec<TensorType> = node
                .inputs
                .iter()
                .map(|r| {
                    pending
                        .get(&r.node)
                        .and_then(|types| types.get(r.index))
                        .or_else(|| self.output_type(*r))
                        .cloned()
                        .ok_or_else(|| {
                            TransformError::shape(&node.name, format!("input {} is not a live output", r))
                        })
                })
                .collect::<OptResult<_>>()?;

            let types = infer_outputs(node.kind, &node.name, &input_types, &node.attrs)?;
            if types.len() != node.outputs.len() {
                return Err(TransformError::shape(
                    &node.name,
                    format!("output count changed from {} to {}", node.outputs.len(), types.len()),
                ));
            }

            let current: Vec<&TensorType> = match pending.get(&id) {
                Some(p) => p.iter().collect(),
                None => node.outputs.iter().map(|s| &s.ty).collect(),
            };
            let changed = current.iter().zip(&types).any(|(a, b)| *a != b);
            let first_visit = !pending.contains_key(&id);

            if changed || first_visit {
                if changed {
                    worklist.extend(
                        node.outputs
                            .iter()
                            .flat_map(|s| s.consumers.iter().map(|c| c.node)),
                    );
                }
                pending.insert(id, types);
            }
        }

        for (id, types) in pending {
            let node = self.node_mut(id)?;
            for (slot, ty) in node.outputs.iter_mut().zip(types) {
                slot.ty = ty;
            }
        }
        Ok(())
    }
}
