//! Built-in transformation passes
//!
//! This module provides ready-to-use passes for low-precision graphs:
//!
//! - **Elimination**: [`EliminateIdentity`] splices out pass-through nodes
//! - **Output-side fusion**: [`FuseMultiplyToQuantizationRange`] and
//!   [`FuseAddToQuantizationRange`] absorb a constant scale or shift that
//!   follows a quantization range into its output bounds
//! - **Constant folding**: [`FuseQuantizationRange`] folds a range into the
//!   constant feeding it, across precision-preserving ops
//!
//! # Example
//!
//! ```
//! use lowp_optimizer::graph::{Attributes, Graph, OpKind};
//! use lowp_optimizer::tensor::{scalar, vector, QuantRange};
//! use lowp_optimizer::transform::Pipeline;
//! use lowp_optimizer::transformers::FuseQuantizationRange;
//!
//! let mut graph = Graph::new();
//! let c = graph.add_constant("c", vector(&[0.4, 1.6, 2.5])).unwrap();
//! let range = QuantRange {
//!     input_low: scalar(0.0),
//!     input_high: scalar(4.0),
//!     output_low: scalar(0.0),
//!     output_high: scalar(4.0),
//!     levels: 5,
//! };
//! let q = graph
//!     .add_node(OpKind::QuantizeRange, "q", &[c.into()], range.to_attributes())
//!     .unwrap();
//! graph.add_result("out", q.into()).unwrap();
//!
//! let stats = Pipeline::new()
//!     .with_pass(Box::new(FuseQuantizationRange::new()))
//!     .run(&mut graph)
//!     .unwrap();
//! assert_eq!(stats.rewrites("fuse_quantization_range"), 1);
//! ```

/// Common utilities
pub mod common;
/// Elimination passes
pub mod eliminate;
/// Fold a constant shift into a quantization range
pub mod fuse_add_to_quantization_range;
/// Fold a constant scale into a quantization range
pub mod fuse_multiply_to_quantization_range;
/// Fold a quantization range into its constant producer
pub mod fuse_quantization_range;
mod output_side;

pub use eliminate::EliminateIdentity;
pub use fuse_add_to_quantization_range::FuseAddToQuantizationRange;
pub use fuse_multiply_to_quantization_range::FuseMultiplyToQuantizationRange;
pub use fuse_quantization_range::FuseQuantizationRange;

use crate::transform::PassRegistry;

/// Register every built-in pass
pub fn register_builtin(registry: &mut PassRegistry) {
    registry
        .register(eliminate::ID, EliminateIdentity::from_params)
        .register(
            fuse_multiply_to_quantization_range::ID,
            FuseMultiplyToQuantizationRange::from_params,
        )
        .register(
            fuse_add_to_quantization_range::ID,
            FuseAddToQuantizationRange::from_params,
        )
        .register(fuse_quantization_range::ID, FuseQuantizationRange::from_params);
}
