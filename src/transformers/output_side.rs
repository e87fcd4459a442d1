//! Shared rewrite for the output-side range fusions
//!
//! Both fusions replace `op(QuantizeRange(x), Constant)` with a single
//! `QuantizeRange'(x)` whose bounds absorb the constant.

use crate::error::OptResult;
use crate::graph::{Graph, NodeId, OpKind};
use crate::tensor::{broadcasts_to, QuantRange};

use super::common::unique_name;

/// Nodes taking part in one output-side fusion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OutputRewrite {
    /// Binary op consuming the range
    pub op: NodeId,
    /// Quantization range feeding `op`
    pub q: NodeId,
    /// Constant operand of `op`
    pub constant: NodeId,
}

/// Rewrite `op(q, constant)` into one range whose bounds are edited by
/// `edit`.
///
/// Declines when `q` is shared, when `op` changes the value's type, or
/// when `edit` returns `None`. The fused node takes over `op`'s name.
pub(crate) fn fold_into_range(
    graph: &mut Graph,
    rewrite: OutputRewrite,
    edit: impl FnOnce(&mut QuantRange) -> Option<()>,
) -> OptResult<bool> {
    let OutputRewrite { op, q, constant } = rewrite;

    if !graph.is_single_use(q) {
        return Ok(false);
    }
    let q_node = graph.try_node(q)?;
    let op_node = graph.try_node(op)?;
    if q_node.output_type(0) != op_node.output_type(0) {
        tracing::trace!(node = op_node.name(), "constant operand broadcasts the value");
        return Ok(false);
    }
    let Some(src) = q_node.input(0) else {
        return Ok(false);
    };
    let Some(in_shape) = graph.output_type(src).map(|ty| ty.shape.to_vec()) else {
        return Ok(false);
    };

    let op_name = op_node.name().to_string();
    let q_name = q_node.name().to_string();
    let mut range = QuantRange::from_node(q_node)?;
    range.validate(&q_name)?;

    if edit(&mut range).is_none() {
        return Ok(false);
    }
    let fits = [&range.output_low, &range.output_high]
        .iter()
        .all(|b| broadcasts_to(b.shape(), &in_shape));
    if !fits {
        return Ok(false);
    }
    range.validate(&op_name)?;

    let temp_name = unique_name(graph, &format!("{}_fused", op_name));
    let fused = graph.add_node(OpKind::QuantizeRange, temp_name, &[src], range.to_attributes())?;
    if let Err(e) = graph.replace_node(op, &[fused.into()]) {
        graph.remove_node(fused)?;
        return Err(e);
    }

    graph.remove_node(q)?;
    if graph.is_unused(constant) {
        graph.remove_node(constant)?;
    }
    graph.rename_node(fused, op_name.as_str())?;

    tracing::debug!(node = %op_name, range = %q_name, "constant folded into quantization range");
    Ok(true)
}
