//! Common operation patterns
//!
//! Precision-preserving op set and pre-built patterns used by the fusion
//! passes.

use crate::graph::OpKind;

use super::matcher::PatternSpec;

/// Operations that only move or relabel values, so a quantization grid
/// applied after them can equally be applied before them
pub const PRECISION_PRESERVING_OPS: &[OpKind] = &[
    OpKind::Identity,
    OpKind::Reshape,
    OpKind::Transpose,
    OpKind::Squeeze,
    OpKind::Unsqueeze,
];

/// Check if an op kind is transparent for quantization-range propagation
pub fn is_precision_preserving(kind: OpKind) -> bool {
    PRECISION_PRESERVING_OPS.contains(&kind)
}

/// Quantization range fed by anything, labelled `"q"` / `"src"`
pub fn quantize_range() -> PatternSpec {
    PatternSpec::kind(OpKind::QuantizeRange)
        .label("q")
        .child(PatternSpec::any().label("src"))
}

/// `op(QuantizeRange(..), Constant)` for any of `ops`, labelled
/// `"op"` / `"q"` / `"c"`
pub fn quantize_range_then_const_op(ops: &[OpKind]) -> PatternSpec {
    PatternSpec::any_of(ops)
        .label("op")
        .child(PatternSpec::kind(OpKind::QuantizeRange).label("q"))
        .child(PatternSpec::kind(OpKind::Constant).label("c"))
}

/// `op(Constant, QuantizeRange(..))`, the commuted form of
/// [`quantize_range_then_const_op`] with the same labels
pub fn const_then_quantize_range_op(ops: &[OpKind]) -> PatternSpec {
    PatternSpec::any_of(ops)
        .label("op")
        .child(PatternSpec::kind(OpKind::Constant).label("c"))
        .child(PatternSpec::kind(OpKind::QuantizeRange).label("q"))
}

/// Identity node, labelled `"identity"`
pub fn identity() -> PatternSpec {
    PatternSpec::kind(OpKind::Identity).label("identity")
}
