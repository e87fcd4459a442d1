//! Common utilities for transformers
//!
//! Shared helpers used across the fusion and elimination passes.

use ndarray::ArrayD;

use crate::error::{OptResult, TransformError};
use crate::graph::op::validate_permutation;
use crate::graph::{Graph, Node, NodeId, OpKind};
use crate::pattern::{const_then_quantize_range_op, matcher, quantize_range_then_const_op};
use crate::tensor::{broadcast_shape, permute_array, reshape_array};

/// Name derived from `base` that no live node carries yet
pub fn unique_name(graph: &Graph, base: &str) -> String {
    if graph.node_by_name(base).is_none() {
        return base.to_string();
    }
    (1..)
        .map(|i| format!("{}_{}", base, i))
        .find(|name| graph.node_by_name(name).is_none())
        .unwrap_or_else(|| base.to_string())
}

/// Check if the graph holds a live node of `kind`
pub fn has_kind(graph: &Graph, kind: OpKind) -> bool {
    graph.nodes().any(|(_, n)| n.kind() == kind)
}

/// Evaluate a precision-preserving node on a compile-time value.
///
/// The result has the node's inferred output shape.
pub fn evaluate_preserving(node: &Node, value: &ArrayD<f32>) -> OptResult<ArrayD<f32>> {
    let out_shape = node
        .output_type(0)
        .map(|ty| ty.shape.to_vec())
        .ok_or_else(|| TransformError::Internal(format!("'{}' has no output", node.name())))?;

    match node.kind() {
        OpKind::Identity => Ok(value.clone()),
        OpKind::Reshape | OpKind::Squeeze | OpKind::Unsqueeze => reshape_array(value, &out_shape),
        OpKind::Transpose => {
            let perm = node.attrs().require_ints(node.name(), "perm")?;
            let perm = validate_permutation(perm, value.ndim())
                .map_err(|reason| TransformError::shape(node.name(), reason))?;
            permute_array(value, &perm)
        }
        other => Err(TransformError::InvalidNode(format!(
            "'{}' is a {}, which cannot be evaluated at compile time",
            node.name(),
            other
        ))),
    }
}

/// Quantization range and constant feeding a binary node, as
/// `(range, constant)`.
///
/// `commutative` also accepts the constant as the first operand.
pub fn range_and_constant(graph: &Graph, op: NodeId, commutative: bool) -> Option<(NodeId, NodeId)> {
    let kind = graph.node(op)?.kind();
    let m = matcher(graph);
    let binding = m
        .match_node(op, &quantize_range_then_const_op(&[kind]))
        .or_else(|| {
            commutative
                .then(|| const_then_quantize_range_op(&[kind]))
                .and_then(|pattern| m.match_node(op, &pattern))
        })?;
    Some((binding.get("q")?, binding.get("c")?))
}

/// Combine a bound with a constant operand elementwise.
///
/// Returns `None` when the shapes do not broadcast together.
pub fn combine_bound(
    bound: &ArrayD<f32>,
    operand: &ArrayD<f32>,
    f: impl Fn(f32, f32) -> f32,
) -> Option<ArrayD<f32>> {
    let shape = broadcast_shape(bound.shape(), operand.shape())?;
    let dim = ndarray::IxDyn(&shape);
    let lhs = bound.broadcast(dim.clone())?;
    let rhs = operand.broadcast(dim)?;
    Some(ndarray::Zip::from(&lhs).and(&rhs).map_collect(|&a, &b| f(a, b)))
}
