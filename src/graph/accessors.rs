//! Connectivity queries
//!
//! Read-only helpers over the consumer index used by patterns and passes.

use rustc_hash::FxHashSet;

use super::core::Graph;
use super::node::{Consumer, Node, NodeId, OutputRef};
use super::op::OpKind;

impl Graph {
    // ========================================================================
    // Consumers and producers
    // ========================================================================

    /// Inputs currently reading `output`, in wiring order
    pub fn consumers(&self, output: OutputRef) -> &[Consumer] {
        self.node(output.node)
            .and_then(|n| n.outputs.get(output.index))
            .map_or(&[], |s| s.consumers.as_slice())
    }

    /// Total consumer edges across all outputs of a node
    pub fn consumer_count(&self, id: NodeId) -> usize {
        self.node(id).map_or(0, Node::consumer_count)
    }

    /// Check if a node has exactly one consumer edge in total
    pub fn is_single_use(&self, id: NodeId) -> bool {
        self.consumer_count(id) == 1
    }

    /// Check if nothing reads any output of a node
    pub fn is_unused(&self, id: NodeId) -> bool {
        self.consumer_count(id) == 0
    }

    /// Node producing input `input` of `id`
    pub fn producer(&self, id: NodeId, input: usize) -> Option<NodeId> {
        self.node(id)?.input(input).map(|r| r.node)
    }

    /// Node producing input `input` of `id`, with the node itself
    pub fn producer_node(&self, id: NodeId, input: usize) -> Option<(NodeId, &Node)> {
        let src = self.producer(id, input)?;
        self.node(src).map(|n| (src, n))
    }

    /// The only consumer of a single-use node
    pub fn sole_consumer(&self, id: NodeId) -> Option<Consumer> {
        let node = self.node(id)?;
        if node.consumer_count() != 1 {
            return None;
        }
        node.outputs.iter().find_map(|s| s.consumers.first().copied())
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Find nodes by op kind, in id order
    pub fn find_nodes_by_kind(&self, kind: OpKind) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, n)| n.kind == kind)
            .map(|(id, _)| id)
            .collect()
    }

    /// Find nodes matching any of the given kinds
    pub fn find_nodes_by_kinds(&self, kinds: &[OpKind]) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, n)| kinds.contains(&n.kind))
            .map(|(id, _)| id)
            .collect()
    }

    /// Check if `to` is reachable from `from` along consumer edges.
    ///
    /// A node reaches itself.
    pub fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        if from == to {
            return true;
        }

        let mut visited = FxHashSet::default();
        let mut stack = vec![from];

        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else { continue };
            for consumer in node.outputs.iter().flat_map(|s| s.consumers.iter()) {
                if consumer.node == to {
                    return true;
                }
                if visited.insert(consumer.node) {
                    stack.push(consumer.node);
                }
            }
        }

        false
    }
}
