//! Node elimination helpers
//!
//! Splice nodes out of the graph while keeping every consumer connected.

use crate::error::{OptResult, TransformError};
use crate::graph::{Graph, NodeId, OpKind};

/// Result of an elimination operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EliminationResult {
    /// Name of the eliminated node
    pub node_name: String,
    /// Number of consumer edges moved onto the bridged input
    pub bridged_connections: usize,
}

/// Check if a node can be spliced out through input `bridge_input`.
///
/// The node must be live, single-output, not a graph entry or exit, and the
/// bridged value must have the same type as the node's output.
pub fn can_eliminate(graph: &Graph, id: NodeId, bridge_input: usize) -> bool {
    let Some(node) = graph.node(id) else {
        return false;
    };
    if matches!(node.kind(), OpKind::Parameter | OpKind::Result) || node.output_count() != 1 {
        return false;
    }
    let Some(src) = node.input(bridge_input) else {
        return false;
    };
    graph.output_type(src) == node.output_type(0)
}

/// Splice out a node: its consumers read input `bridge_input` instead.
pub fn eliminate_node(graph: &mut Graph, id: NodeId, bridge_input: usize) -> OptResult<EliminationResult> {
    let node = graph.try_node(id)?;
    let node_name = node.name().to_string();
    let src = node.input(bridge_input).ok_or_else(|| {
        TransformError::InvalidNode(format!(
            "'{}' has no input {} to bridge",
            node_name, bridge_input
        ))
    })?;
    let bridged_connections = node.consumer_count();

    graph.replace_node(id, &[src])?;

    Ok(EliminationResult {
        node_name,
        bridged_connections,
    })
}

/// Remove a chain of nodes that no longer feed anything.
///
/// `chain` is ordered consumer first, so each removal frees the next node.
/// Returns the number of removed nodes.
pub fn remove_chain(graph: &mut Graph, chain: &[NodeId]) -> OptResult<usize> {
    for &id in chain {
        graph.remove_node(id)?;
    }
    Ok(chain.len())
}
