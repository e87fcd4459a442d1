//! Operation kinds and their shape/type inference rules
//!
//! The operation set is closed: every kind has one inference rule in
//! [`infer_outputs`], which both validates the inputs and computes the
//! output slot types.

use std::fmt;

use smallvec::{smallvec, SmallVec};

use crate::error::{OptResult, TransformError};
use crate::tensor::{
    broadcast_shape, broadcasts_to, normalize_axes, normalize_axis, resolve_reshape, Shape,
    BOUND_ATTRS,
};

use super::attrs::Attributes;
use super::node::TensorType;

/// Inferred output types of one node
pub type OutputTypes = SmallVec<[TensorType; 1]>;

/// Operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpKind {
    /// Graph entry; attributes `shape`, optional `element_type`
    Parameter,
    /// Compile-time tensor; attribute `value`, optional `element_type`
    Constant,
    /// Graph exit; passes its single input through
    Result,
    /// Pass-through
    Identity,
    /// Element type conversion; attribute `destination_type`
    Convert,
    /// max(x, 0)
    Relu,
    /// Clip to `[min, max]`
    Clamp,
    /// Reshape to attribute `shape` (0 copies, -1 infers)
    Reshape,
    /// Axis permutation; attribute `perm`
    Transpose,
    /// Drop size-1 axes; optional attribute `axes`
    Squeeze,
    /// Insert size-1 axes; attribute `axes`
    Unsqueeze,
    /// Broadcasting elementwise add
    Add,
    /// Broadcasting elementwise subtract
    Subtract,
    /// Broadcasting elementwise multiply
    Multiply,
    /// Batched matrix multiply
    MatMul,
    /// Concatenation along attribute `axis`
    Concat,
    /// Simulated quantize/dequantize; attributes `input_low`, `input_high`,
    /// `output_low`, `output_high` and `levels`
    QuantizeRange,
}

impl OpKind {
    /// Canonical name of the operation
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parameter => "Parameter",
            Self::Constant => "Constant",
            Self::Result => "Result",
            Self::Identity => "Identity",
            Self::Convert => "Convert",
            Self::Relu => "Relu",
            Self::Clamp => "Clamp",
            Self::Reshape => "Reshape",
            Self::Transpose => "Transpose",
            Self::Squeeze => "Squeeze",
            Self::Unsqueeze => "Unsqueeze",
            Self::Add => "Add",
            Self::Subtract => "Subtract",
            Self::Multiply => "Multiply",
            Self::MatMul => "MatMul",
            Self::Concat => "Concat",
            Self::QuantizeRange => "QuantizeRange",
        }
    }

    /// Operations that only move or relabel elements
    pub fn is_shape_only(self) -> bool {
        matches!(
            self,
            Self::Identity | Self::Reshape | Self::Transpose | Self::Squeeze | Self::Unsqueeze
        )
    }

    /// Graph entries and compile-time constants (no inputs)
    pub fn is_source(self) -> bool {
        matches!(self, Self::Parameter | Self::Constant)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate inputs against `kind` and compute the output types.
pub fn infer_outputs(
    kind: OpKind,
    name: &str,
    inputs: &[TensorType],
    attrs: &Attributes,
) -> OptResult<OutputTypes> {
    let fail = |reason: String| TransformError::shape(name, reason);

    match kind {
        OpKind::Parameter => {
            expect_inputs(name, kind, inputs, 0)?;
            let shape = attrs
                .shape("shape")
                .ok_or_else(|| TransformError::attr(name, "shape", "missing"))?;
            let elem = attrs.elem_type("element_type").unwrap_or_default();
            Ok(smallvec![TensorType::new(elem, shape)])
        }

        OpKind::Constant => {
            expect_inputs(name, kind, inputs, 0)?;
            let value = attrs.require_tensor(name, "value")?;
            let elem = attrs.elem_type("element_type").unwrap_or_default();
            Ok(smallvec![TensorType::new(elem, value.shape())])
        }

        OpKind::Result | OpKind::Identity | OpKind::Relu => {
            expect_inputs(name, kind, inputs, 1)?;
            Ok(smallvec![inputs[0].clone()])
        }

        OpKind::Convert => {
            expect_inputs(name, kind, inputs, 1)?;
            let dest = attrs
                .elem_type("destination_type")
                .ok_or_else(|| TransformError::attr(name, "destination_type", "missing"))?;
            Ok(smallvec![TensorType {
                elem: dest,
                shape: inputs[0].shape.clone(),
            }])
        }

        OpKind::Clamp => {
            expect_inputs(name, kind, inputs, 1)?;
            let min = attrs.require_float(name, "min")?;
            let max = attrs.require_float(name, "max")?;
            if min > max {
                return Err(TransformError::attr(
                    name,
                    "min",
                    format!("min {} exceeds max {}", min, max),
                ));
            }
            Ok(smallvec![inputs[0].clone()])
        }

        OpKind::Reshape => {
            expect_inputs(name, kind, inputs, 1)?;
            let target = attrs.require_ints(name, "shape")?;
            let shape = resolve_reshape(&inputs[0].shape, target).map_err(fail)?;
            Ok(smallvec![TensorType {
                elem: inputs[0].elem,
                shape,
            }])
        }

        OpKind::Transpose => {
            expect_inputs(name, kind, inputs, 1)?;
            let input = &inputs[0];
            let perm = attrs.require_ints(name, "perm")?;
            let perm = validate_permutation(perm, input.rank()).map_err(fail)?;
            let shape: Shape = perm.iter().map(|&p| input.shape[p]).collect();
            Ok(smallvec![TensorType {
                elem: input.elem,
                shape,
            }])
        }

        OpKind::Squeeze => {
            expect_inputs(name, kind, inputs, 1)?;
            let input = &inputs[0];
            let shape: Shape = match attrs.ints("axes") {
                Some(axes) => {
                    let axes = normalize_axes(axes, input.rank())
                        .ok_or_else(|| fail(format!("axes {:?} out of range", axes)))?;
                    if let Some(&bad) = axes.iter().find(|&&a| input.shape[a] != 1) {
                        return Err(fail(format!(
                            "cannot squeeze axis {} of size {}",
                            bad, input.shape[bad]
                        )));
                    }
                    input
                        .shape
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| !axes.contains(i))
                        .map(|(_, &d)| d)
                        .collect()
                }
                None => input.shape.iter().copied().filter(|&d| d != 1).collect(),
            };
            Ok(smallvec![TensorType {
                elem: input.elem,
                shape,
            }])
        }

        OpKind::Unsqueeze => {
            expect_inputs(name, kind, inputs, 1)?;
            let input = &inputs[0];
            let axes = attrs.require_ints(name, "axes")?;
            let out_rank = input.rank() + axes.len();
            let mut axes = normalize_axes(axes, out_rank)
                .ok_or_else(|| fail(format!("axes {:?} out of range", axes)))?;
            axes.sort_unstable();
            if axes.windows(2).any(|w| w[0] == w[1]) {
                return Err(fail(format!("duplicate axes {:?}", axes)));
            }

            let mut rest = input.shape.iter().copied();
            let shape: Shape = (0..out_rank)
                .map(|i| {
                    if axes.contains(&i) {
                        1
                    } else {
                        rest.next().unwrap_or(1)
                    }
                })
                .collect();
            Ok(smallvec![TensorType {
                elem: input.elem,
                shape,
            }])
        }

        OpKind::Add | OpKind::Subtract | OpKind::Multiply => {
            expect_inputs(name, kind, inputs, 2)?;
            let (a, b) = (&inputs[0], &inputs[1]);
            expect_same_elem(name, a, b)?;
            let shape = broadcast_shape(&a.shape, &b.shape).ok_or_else(|| {
                fail(format!(
                    "shapes {:?} and {:?} are not broadcastable",
                    a.shape.as_slice(),
                    b.shape.as_slice()
                ))
            })?;
            Ok(smallvec![TensorType {
                elem: a.elem,
                shape,
            }])
        }

        OpKind::MatMul => {
            expect_inputs(name, kind, inputs, 2)?;
            let (a, b) = (&inputs[0], &inputs[1]);
            expect_same_elem(name, a, b)?;
            if a.rank() < 2 || b.rank() < 2 {
                return Err(fail(format!(
                    "MatMul needs rank >= 2 operands, got {} and {}",
                    a.rank(),
                    b.rank()
                )));
            }
            let (m, k) = (a.shape[a.rank() - 2], a.shape[a.rank() - 1]);
            let (k2, n) = (b.shape[b.rank() - 2], b.shape[b.rank() - 1]);
            if k != k2 {
                return Err(fail(format!("inner dimensions differ: {} vs {}", k, k2)));
            }
            let batch = broadcast_shape(&a.shape[..a.rank() - 2], &b.shape[..b.rank() - 2])
                .ok_or_else(|| fail("batch dimensions are not broadcastable".to_string()))?;
            let mut shape = batch;
            shape.push(m);
            shape.push(n);
            Ok(smallvec![TensorType {
                elem: a.elem,
                shape,
            }])
        }

        OpKind::Concat => {
            if inputs.is_empty() {
                return Err(fail("Concat needs at least one input".to_string()));
            }
            let first = &inputs[0];
            let axis = attrs.require_int(name, "axis")?;
            let axis = normalize_axis(axis, first.rank())
                .ok_or_else(|| fail(format!("axis {} out of range", axis)))?;

            let mut shape = first.shape.clone();
            for other in &inputs[1..] {
                expect_same_elem(name, first, other)?;
                let compatible = other.rank() == first.rank()
                    && (0..first.rank()).all(|i| i == axis || other.shape[i] == first.shape[i]);
                if !compatible {
                    return Err(fail(format!(
                        "cannot concatenate {:?} with {:?} on axis {}",
                        first.shape.as_slice(),
                        other.shape.as_slice(),
                        axis
                    )));
                }
                shape[axis] += other.shape[axis];
            }
            Ok(smallvec![TensorType {
                elem: first.elem,
                shape,
            }])
        }

        OpKind::QuantizeRange => {
            expect_inputs(name, kind, inputs, 1)?;
            let input = &inputs[0];
            if !input.elem.is_float() {
                return Err(fail(format!(
                    "quantization range needs a float input, got {}",
                    input.elem
                )));
            }
            for bound in BOUND_ATTRS {
                let value = attrs.require_tensor(name, bound)?;
                if !broadcasts_to(value.shape(), &input.shape) {
                    return Err(fail(format!(
                        "{} of shape {:?} does not broadcast to input {:?}",
                        bound,
                        value.shape(),
                        input.shape.as_slice()
                    )));
                }
            }
            attrs.require_int(name, "levels")?;
            Ok(smallvec![input.clone()])
        }
    }
}

fn expect_inputs(name: &str, kind: OpKind, inputs: &[TensorType], expected: usize) -> OptResult<()> {
    if inputs.len() != expected {
        return Err(TransformError::shape(
            name,
            format!("{} expects {} input(s), got {}", kind, expected, inputs.len()),
        ));
    }
    Ok(())
}

fn expect_same_elem(name: &str, a: &TensorType, b: &TensorType) -> OptResult<()> {
    if a.elem != b.elem {
        return Err(TransformError::shape(
            name,
            format!("element types differ: {} vs {}", a.elem, b.elem),
        ));
    }
    Ok(())
}

pub(crate) fn validate_permutation(perm: &[i64], rank: usize) -> Result<Vec<usize>, String> {
    if perm.len() != rank {
        return Err(format!("perm {:?} does not match rank {}", perm, rank));
    }
    let mut seen = vec![false; rank];
    perm.iter()
        .map(|&p| {
            let p = usize::try_from(p)
                .ok()
                .filter(|&p| p < rank && !seen[p])
                .ok_or_else(|| format!("perm {:?} is not a permutation of 0..{}", perm, rank))?;
            seen[p] = true;
            Ok(p)
        })
        .collect()
}
