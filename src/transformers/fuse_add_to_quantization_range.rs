//! Add/Subtract-after-quantization fusion
//!
//! ```text
//! x -> QuantizeRange -> Add(c)        =>   x -> QuantizeRange'
//! x -> QuantizeRange -> Subtract(c)   =>   x -> QuantizeRange'
//! ```
//!
//! A constant shift moves the whole output grid, so it is added to (or
//! subtracted from) both output bounds. `c - QuantizeRange(x)` negates the
//! value and is left alone.

use crate::error::OptResult;
use crate::graph::{Graph, NodeId, OpKind};
use crate::traits::{Transformation, TransformationDescriptor};
use crate::transform::{PassParams, TransformationContext};

use super::common::{combine_bound, has_kind, range_and_constant};
use super::output_side::{fold_into_range, OutputRewrite};

/// Pass identifier
pub const ID: &str = "fuse_add_to_quantization_range";

/// Fold a constant shift into the preceding quantization range
#[derive(Debug, Default, Clone, Copy)]
pub struct FuseAddToQuantizationRange;

impl FuseAddToQuantizationRange {
    /// Create the pass
    pub fn new() -> Self {
        Self
    }

    /// Registry factory
    pub fn from_params(params: &PassParams) -> OptResult<Box<dyn Transformation>> {
        params.check_known(&[])?;
        Ok(Box::new(Self))
    }

    fn operands(graph: &Graph, node: NodeId) -> Option<(OpKind, NodeId, NodeId)> {
        let kind = graph.node(node)?.kind();
        let (q, c) = match kind {
            OpKind::Add => range_and_constant(graph, node, true)?,
            OpKind::Subtract => range_and_constant(graph, node, false)?,
            _ => return None,
        };
        Some((kind, q, c))
    }
}

impl Transformation for FuseAddToQuantizationRange {
    fn descriptor(&self) -> TransformationDescriptor {
        TransformationDescriptor::new(ID, 20)
    }

    fn matches(&self, graph: &Graph, node: NodeId) -> bool {
        Self::operands(graph, node).is_some()
    }

    fn is_applicable(&self, graph: &Graph) -> bool {
        has_kind(graph, OpKind::QuantizeRange)
            && (has_kind(graph, OpKind::Add) || has_kind(graph, OpKind::Subtract))
    }

    fn transform(
        &self,
        _ctx: &mut TransformationContext,
        graph: &mut Graph,
        node: NodeId,
    ) -> OptResult<bool> {
        let Some((kind, q, c)) = Self::operands(graph, node) else {
            return Ok(false);
        };
        let Some(shift) = graph.constant_value(c) else {
            return Ok(false);
        };
        if !shift.iter().all(|v| v.is_finite()) {
            return Ok(false);
        }
        let shift = match kind {
            OpKind::Subtract => shift.mapv(|v| -v),
            _ => shift.clone(),
        };

        fold_into_range(
            graph,
            OutputRewrite { op: node, q, constant: c },
            |range| {
                range.output_low = combine_bound(&range.output_low, &shift, |a, b| a + b)?;
                range.output_high = combine_bound(&range.output_high, &shift, |a, b| a + b)?;
                Some(())
            },
        )
    }
}
