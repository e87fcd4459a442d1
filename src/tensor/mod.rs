//! Tensor utilities for graph values
//!
//! This module provides utilities for working with the values flowing
//! through the graph:
//! - Element types (`dtype`)
//! - Shape utilities (`shape`)
//! - Building and re-laying out `ndarray` payloads (`convert`)
//! - The simulated quantization function (`quantize`)
//!
//! # Example
//!
//! ```ignore
//! use lowp_optimizer::tensor::{vector, QuantRange};
//!
//! let data = vector(&[1.0, 2.0, 3.0, 4.0]);
//! let folded = range.apply("fq", &data)?;
//! ```

pub mod convert;
pub mod dtype;
pub mod quantize;
pub mod shape;

// Re-export commonly used items
pub use convert::{array_from_vec, permute_array, reshape_array, scalar, vector};
pub use dtype::ElementType;
pub use quantize::{QuantRange, BOUND_ATTRS};
pub use shape::{
    broadcast_shape, broadcasts_to, is_broadcastable, normalize_axes, normalize_axis, numel,
    resolve_reshape, Shape,
};
