//! Shape utilities for graph values
//!
//! Functions for working with static tensor shapes and dimensions.

use smallvec::SmallVec;

/// Static tensor shape (row-major dimensions)
pub type Shape = SmallVec<[usize; 4]>;

/// Calculate total number of elements from shape
pub fn numel(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Check if two shapes are broadcastable (numpy rules)
pub fn is_broadcastable(shape_a: &[usize], shape_b: &[usize]) -> bool {
    broadcast_shape(shape_a, shape_b).is_some()
}

/// Compute broadcast output shape
///
/// Dimensions are aligned from the right; a dimension of 1 stretches.
pub fn broadcast_shape(shape_a: &[usize], shape_b: &[usize]) -> Option<Shape> {
    let max_len = shape_a.len().max(shape_b.len());
    let mut result: Shape = SmallVec::from_elem(0, max_len);

    for i in 0..max_len {
        let dim_a = trailing_dim(shape_a, i);
        let dim_b = trailing_dim(shape_b, i);

        let out_dim = if dim_a == dim_b || dim_b == 1 {
            dim_a
        } else if dim_a == 1 {
            dim_b
        } else {
            return None;
        };

        result[max_len - 1 - i] = out_dim;
    }

    Some(result)
}

/// Check that `from` can be broadcast *to* exactly `to` (unidirectional)
pub fn broadcasts_to(from: &[usize], to: &[usize]) -> bool {
    if from.len() > to.len() {
        return false;
    }
    (0..from.len()).all(|i| {
        let f = trailing_dim(from, i);
        f == 1 || f == trailing_dim(to, i)
    })
}

fn trailing_dim(shape: &[usize], i: usize) -> usize {
    if i < shape.len() {
        shape[shape.len() - 1 - i]
    } else {
        1
    }
}

/// Normalize axis to positive index
pub fn normalize_axis(axis: i64, ndim: usize) -> Option<usize> {
    let ndim_i64 = ndim as i64;
    let normalized = if axis < 0 { axis + ndim_i64 } else { axis };

    if normalized < 0 || normalized >= ndim_i64 {
        return None;
    }

    Some(normalized as usize)
}

/// Normalize multiple axes
pub fn normalize_axes(axes: &[i64], ndim: usize) -> Option<Vec<usize>> {
    axes.iter().map(|&a| normalize_axis(a, ndim)).collect()
}

/// Resolve a reshape target against an input shape.
///
/// `0` copies the input dimension at the same position, one `-1` is inferred
/// from the remaining element count.
pub fn resolve_reshape(input: &[usize], target: &[i64]) -> Result<Shape, String> {
    let mut out: Shape = SmallVec::with_capacity(target.len());
    let mut infer_at = None;

    for (i, &d) in target.iter().enumerate() {
        match d {
            -1 => {
                if infer_at.replace(i).is_some() {
                    return Err(format!("more than one -1 in target {:?}", target));
                }
                out.push(1);
            }
            0 => {
                let copied = input
                    .get(i)
                    .ok_or_else(|| format!("0 at position {} exceeds input rank {}", i, input.len()))?;
                out.push(*copied);
            }
            d if d > 0 => out.push(d as usize),
            d => return Err(format!("invalid dimension {} in target {:?}", d, target)),
        }
    }

    let total = numel(input);
    if let Some(i) = infer_at {
        let known = numel(&out);
        if known == 0 || total % known != 0 {
            return Err(format!(
                "cannot infer -1: {} elements do not divide by {}",
                total, known
            ));
        }
        out[i] = total / known;
    }

    if numel(&out) != total {
        return Err(format!(
            "element count mismatch: input {:?} has {}, target {:?} has {}",
            input,
            total,
            out.as_slice(),
            numel(&out)
        ));
    }

    Ok(out)
}
