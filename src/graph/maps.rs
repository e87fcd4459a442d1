//! Graph map types and builders
//!
//! Storage types behind [`super::Graph`] and the consumer-index rebuild
//! used by validation.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::node::{Consumer, Node, NodeId};

/// Node arena: slot `i` holds node `NodeId(i)`, `None` once removed
pub type NodeArena = Vec<Option<Node>>;

/// Type alias for name index: node name → id
pub type NameIndex = FxHashMap<String, NodeId>;

/// Consumers of one output slot.
/// SmallVec optimized for common case of 1-4 consumers
pub type ConsumerSet = SmallVec<[Consumer; 4]>;

/// Consumer sets keyed by (producer, output index)
pub type ConsumerIndex = FxHashMap<(NodeId, usize), Vec<Consumer>>;

/// Build the consumer index from input lists alone
///
/// This is the ground truth the incrementally maintained consumer sets must
/// agree with.
pub fn build_consumer_index(nodes: &NodeArena) -> ConsumerIndex {
    let mut map: ConsumerIndex = FxHashMap::default();

    for (i, node) in nodes.iter().enumerate() {
        let Some(node) = node else { continue };
        let id = NodeId(i as u32);
        for (input, src) in node.inputs.iter().enumerate() {
            map.entry((src.node, src.index))
                .or_default()
                .push(Consumer { node: id, input });
        }
    }

    for consumers in map.values_mut() {
        consumers.sort_unstable();
    }

    map
}
