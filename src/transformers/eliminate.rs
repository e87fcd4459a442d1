//! Elimination transformers
//!
//! Transformers that remove pass-through nodes from the graph.

use crate::error::OptResult;
use crate::graph::{Graph, NodeId, OpKind};
use crate::pattern::{identity, matcher};
use crate::traits::{Transformation, TransformationDescriptor};
use crate::transform::{can_eliminate, eliminate_node, PassParams, TransformationContext};

use super::common::has_kind;

/// Pass identifier
pub const ID: &str = "eliminate_identity";

/// Eliminate Identity nodes
///
/// Identity nodes simply pass their input through. Their consumers can read
/// the input directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct EliminateIdentity;

impl EliminateIdentity {
    /// Create the pass
    pub fn new() -> Self {
        Self
    }

    /// Registry factory
    pub fn from_params(params: &PassParams) -> OptResult<Box<dyn Transformation>> {
        params.check_known(&[])?;
        Ok(Box::new(Self))
    }
}

impl Transformation for EliminateIdentity {
    fn descriptor(&self) -> TransformationDescriptor {
        TransformationDescriptor::new(ID, 0)
    }

    fn matches(&self, graph: &Graph, node: NodeId) -> bool {
        matcher(graph).match_node(node, &identity()).is_some() && can_eliminate(graph, node, 0)
    }

    fn is_applicable(&self, graph: &Graph) -> bool {
        has_kind(graph, OpKind::Identity)
    }

    fn transform(
        &self,
        _ctx: &mut TransformationContext,
        graph: &mut Graph,
        node: NodeId,
    ) -> OptResult<bool> {
        let result = eliminate_node(graph, node, 0)?;
        tracing::trace!(
            node = %result.node_name,
            consumers = result.bridged_connections,
            "identity eliminated"
        );
        Ok(true)
    }
}
