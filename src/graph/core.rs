//! Graph arena
//!
//! `Graph` is the central structure of the IR. It owns every node in an
//! arena indexed by [`NodeId`], keeps a name index, the parameter/result
//! designations and a lazily computed topological order.

use std::cell::OnceCell;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ndarray::ArrayD;

use crate::error::{OptResult, TransformError};

use super::maps::{NameIndex, NodeArena};
use super::node::{Node, NodeId, OutputRef, TensorType};
use super::op::OpKind;

/// Dataflow graph of tensor operations
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub(crate) nodes: NodeArena,
    pub(crate) names: NameIndex,
    pub(crate) parameters: Vec<NodeId>,
    pub(crate) results: Vec<NodeId>,
    pub(crate) live: usize,
    pub(crate) order: OnceCell<Vec<NodeId>>,
}

impl PartialEq for Graph {
    /// Structural equality; the cached traversal order is ignored
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
            && self.names == other.names
            && self.parameters == other.parameters
            && self.results == other.results
            && self.live == other.live
    }
}

impl Graph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Node accessors
    // ========================================================================

    /// Get a node by id
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(|n| n.as_ref())
    }

    /// Get a node by id or fail with `NodeNotFound`
    pub fn try_node(&self, id: NodeId) -> OptResult<&Node> {
        self.node(id)
            .ok_or_else(|| TransformError::NodeNotFound(id.to_string()))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> OptResult<&mut Node> {
        self.nodes
            .get_mut(id.index())
            .and_then(|n| n.as_mut())
            .ok_or_else(|| TransformError::NodeNotFound(id.to_string()))
    }

    /// Look up a node id by name
    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Check if a node is live
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Number of live nodes
    pub fn live_node_count(&self) -> usize {
        self.live
    }

    /// Iterate over live nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (NodeId(i as u32), n)))
    }

    /// Ids of live nodes in id order
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes().map(|(id, _)| id).collect()
    }

    /// Name of a node, or its id when it is gone
    pub fn display_name(&self, id: NodeId) -> String {
        self.node(id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    // ========================================================================
    // Graph entries and exits
    // ========================================================================

    /// Parameter nodes (graph entries) in creation order
    pub fn parameters(&self) -> &[NodeId] {
        &self.parameters
    }

    /// Result nodes (graph exits) in creation order
    pub fn results(&self) -> &[NodeId] {
        &self.results
    }

    /// The values designated as graph outputs
    pub fn result_outputs(&self) -> Vec<OutputRef> {
        self.results
            .iter()
            .filter_map(|&r| self.node(r).and_then(|n| n.input(0)))
            .collect()
    }

    // ========================================================================
    // Value accessors
    // ========================================================================

    /// Declared type of a value
    pub fn output_type(&self, output: OutputRef) -> Option<&TensorType> {
        self.node(output.node)
            .and_then(|n| n.output_type(output.index))
    }

    /// Stored values of a constant node
    pub fn constant_value(&self, id: NodeId) -> Option<&ArrayD<f32>> {
        self.node(id)
            .filter(|n| n.kind == OpKind::Constant)
            .and_then(|n| n.attrs.tensor("value"))
    }

    // ========================================================================
    // Traversal order
    // ========================================================================

    /// Live nodes in topological order (producers before consumers).
    ///
    /// Computed on first request after a mutation; ties are broken by id so
    /// the order is deterministic.
    pub fn topological_order(&self) -> &[NodeId] {
        self.order.get_or_init(|| self.compute_order())
    }

    /// Live nodes in reverse topological order (consumers first)
    pub fn reverse_topological_order(&self) -> Vec<NodeId> {
        self.topological_order().iter().rev().copied().collect()
    }

    pub(crate) fn invalidate_order(&mut self) {
        self.order = OnceCell::new();
    }

    /// Kahn's algorithm over the live arena. Nodes caught in a cycle are
    /// left out, which `validate` reports.
    pub(crate) fn compute_order(&self) -> Vec<NodeId> {
        let mut pending: Vec<usize> = self
            .nodes
            .iter()
            .map(|n| n.as_ref().map_or(0, |n| n.inputs.len()))
            .collect();

        let mut ready: BinaryHeap<Reverse<NodeId>> = self
            .nodes()
            .filter(|(_, n)| n.inputs.is_empty())
            .map(|(id, _)| Reverse(id))
            .collect();

        let mut order = Vec::with_capacity(self.live);
        while let Some(Reverse(id)) = ready.pop() {
            order.push(id);
            let Some(node) = self.node(id) else { continue };
            for slot in &node.outputs {
                for consumer in &slot.consumers {
                    let count = &mut pending[consumer.node.index()];
                    *count -= 1;
                    if *count == 0 {
                        ready.push(Reverse(consumer.node));
                    }
                }
            }
        }

        order
    }
}
