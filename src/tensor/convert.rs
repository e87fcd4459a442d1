//! Tensor conversion utilities
//!
//! Build and re-layout the `ndarray` payloads carried by constant nodes and
//! quantization bounds.

use ndarray::{Array, ArrayD, IxDyn};

use crate::error::{OptResult, TransformError};

use super::shape::numel;

/// Create an f32 array from flat row-major data
pub fn array_from_vec(data: Vec<f32>, shape: &[usize]) -> OptResult<ArrayD<f32>> {
    if data.len() != numel(shape) {
        return Err(TransformError::Internal(format!(
            "Data length {} does not match shape {:?} (expected {})",
            data.len(),
            shape,
            numel(shape)
        )));
    }

    Array::from_shape_vec(IxDyn(shape), data).map_err(|e| TransformError::Internal(e.to_string()))
}

/// Create a 1-D f32 array
pub fn vector(data: &[f32]) -> ArrayD<f32> {
    Array::from_vec(data.to_vec()).into_dyn()
}

/// Create a rank-0 f32 array
pub fn scalar(value: f32) -> ArrayD<f32> {
    ArrayD::from_elem(IxDyn(&[]), value)
}

/// Reshape into `shape`, keeping row-major element order
pub fn reshape_array(array: &ArrayD<f32>, shape: &[usize]) -> OptResult<ArrayD<f32>> {
    let standard = array.as_standard_layout();
    let data: Vec<f32> = standard.iter().copied().collect();
    array_from_vec(data, shape)
}

/// Permute axes and materialize in standard layout
pub fn permute_array(array: &ArrayD<f32>, perm: &[usize]) -> OptResult<ArrayD<f32>> {
    if perm.len() != array.ndim() {
        return Err(TransformError::Internal(format!(
            "Permutation {:?} does not match rank {}",
            perm,
            array.ndim()
        )));
    }
    let permuted = array.clone().permuted_axes(IxDyn(perm));
    Ok(permuted.as_standard_layout().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_from_vec() {
        let arr = array_from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        assert_eq!(arr.shape(), &[2, 3]);
        assert_eq!(arr[[1, 0]], 4.0);

        assert!(array_from_vec(vec![1.0], &[2]).is_err());
    }

    #[test]
    fn test_scalar() {
        let s = scalar(2.5);
        assert_eq!(s.ndim(), 0);
        assert_eq!(s.iter().next(), Some(&2.5));
    }

    #[test]
    fn test_reshape_array() {
        let arr = vector(&[1.0, 2.0, 3.0, 4.0]);
        let reshaped = reshape_array(&arr, &[2, 2]).unwrap();
        assert_eq!(reshaped.shape(), &[2, 2]);
        assert_eq!(reshaped[[1, 1]], 4.0);
    }

    #[test]
    fn test_permute_array() {
        let arr = array_from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let t = permute_array(&arr, &[1, 0]).unwrap();
        assert_eq!(t.shape(), &[3, 2]);
        let flat: Vec<f32> = t.iter().copied().collect();
        assert_eq!(flat, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }
}
