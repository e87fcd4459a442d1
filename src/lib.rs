//! # lowp-optimizer
//!
//! Pattern-matching graph optimizer for low-precision inference.
//!
//! This crate rewrites a dataflow graph of tensor operations in place, folding
//! simulated quantization ranges into adjacent operations so the graph can
//! run in reduced precision without changing its results.
//!
//! ## Features
//!
//! - **Graph IR**: arena-backed nodes with typed outputs and consumer
//!   back-references kept in sync by atomic mutators
//! - **Pattern Matching**: small operator trees with labels and predicates
//! - **Passes**: quantization range folding, output-side scale/shift fusion
//!   and identity elimination
//! - **Pipeline**: prioritized passes swept to a fixpoint, configurable
//!   through serde
//!
//! ## Example
//!
//! ```
//! use lowp_optimizer::prelude::*;
//! use lowp_optimizer::tensor::ElementType;
//!
//! let mut graph = Graph::new();
//! let x = graph.add_parameter("x", ElementType::F32, &[8]).unwrap();
//! graph.add_result("out", x.into()).unwrap();
//!
//! let stats = Pipeline::builtin().unwrap().run(&mut graph).unwrap();
//! assert_eq!(stats.total_rewrites(), 0);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// ============================================================================
// Module declarations
// ============================================================================

pub mod error;
pub mod graph;
pub mod pattern;
pub mod tensor;
pub mod traits;
pub mod transform;
pub mod transformers;

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Prelude module - import commonly used types with `use lowp_optimizer::prelude::*`
pub mod prelude {
    pub use crate::error::{OptResult, TransformError};
    pub use crate::graph::{Attributes, Graph, NodeId, OpKind, OutputRef};
    pub use crate::pattern::{matcher, Binding, PatternMatcher, PatternSpec};
    pub use crate::tensor::QuantRange;
    pub use crate::traits::{Transformation, TransformationDescriptor};
    pub use crate::transform::{
        PassRegistry, Pipeline, PipelineConfig, Stats, TransformationContext,
    };
    pub use crate::transformers::{
        EliminateIdentity, FuseAddToQuantizationRange, FuseMultiplyToQuantizationRange,
        FuseQuantizationRange,
    };
}

// ============================================================================
// Crate-level re-exports
// ============================================================================

pub use error::{OptResult, TransformError};
pub use traits::Transformation;

// ============================================================================
// Version information
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_prelude_builds_pipeline() {
        use crate::prelude::*;

        let registry = PassRegistry::builtin();
        let config = PipelineConfig::all_passes(&registry);
        let pipeline = Pipeline::from_config(&registry, &config).unwrap();
        assert_eq!(pipeline.pass_order().unwrap().len(), 4);
    }
}
