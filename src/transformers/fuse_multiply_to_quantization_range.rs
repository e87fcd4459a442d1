//! Multiply-after-quantization fusion
//!
//! ```text
//! x -> QuantizeRange -> Multiply(c)   =>   x -> QuantizeRange'
//! ```
//!
//! A positive scale stretches the output grid, so it moves into the output
//! bounds: `output_low' = output_low * c`, `output_high' = output_high * c`.

use crate::error::OptResult;
use crate::graph::{Graph, NodeId, OpKind};
use crate::traits::{Transformation, TransformationDescriptor};
use crate::transform::{PassParams, TransformationContext};

use super::common::{combine_bound, has_kind, range_and_constant};
use super::output_side::{fold_into_range, OutputRewrite};

/// Pass identifier
pub const ID: &str = "fuse_multiply_to_quantization_range";

/// Fold a constant positive scale into the preceding quantization range
#[derive(Debug, Default, Clone, Copy)]
pub struct FuseMultiplyToQuantizationRange;

impl FuseMultiplyToQuantizationRange {
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

impl Transformation for FuseMultiplyToQuantizationRange {
    fn descriptor(&self) -> TransformationDescriptor {
        TransformationDescriptor::new(ID, 10)
    }

    fn matches(&self, graph: &Graph, node: NodeId) -> bool {
        graph.node(node).is_some_and(|n| n.kind() == OpKind::Multiply)
            && range_and_constant(graph, node, true).is_some()
    }

    fn is_applicable(&self, graph: &Graph) -> bool {
        has_kind(graph, OpKind::QuantizeRange) && has_kind(graph, OpKind::Multiply)
    }

    fn transform(
        &self,
        _ctx: &mut TransformationContext,
        graph: &mut Graph,
        node: NodeId,
    ) -> OptResult<bool> {
        let Some((q, c)) = range_and_constant(graph, node, true) else {
            return Ok(false);
        };
        let Some(scale) = graph.constant_value(c) else {
            return Ok(false);
        };
        if !scale.iter().all(|&v| v.is_finite() && v > 0.0) {
            tracing::trace!(node = %graph.display_name(node), "scale is not strictly positive");
            return Ok(false);
        }
        let scale = scale.clone();

        fold_into_range(
            graph,
            OutputRewrite { op: node, q, constant: c },
            |range| {
                range.output_low = combine_bound(&range.output_low, &scale, |a, b| a * b)?;
                range.output_high = combine_bound(&range.output_high, &scale, |a, b| a * b)?;
                Some(())
            },
        )
    }
}
