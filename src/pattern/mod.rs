//! Pattern matching module for graph optimization
//!
//! This module provides tools for identifying and matching patterns in the
//! graph, which is essential for rewrites like node fusion.
//!
//! # Overview
//!
//! The pattern matching system works by:
//! 1. Describing a pattern as a tree of op tests over producer edges
//! 2. Matching the tree top-down from a root node (output → input)
//! 3. Optionally checking a predicate on each matched node
//!
//! # Example
//!
//! ```
//! use lowp_optimizer::graph::{Attributes, Graph, OpKind};
//! use lowp_optimizer::pattern::{PatternMatcher, PatternSpec};
//! use lowp_optimizer::tensor::ElementType;
//!
//! let mut graph = Graph::new();
//! let x = graph.add_parameter("x", ElementType::F32, &[4]).unwrap();
//! let relu = graph
//!     .add_node(OpKind::Relu, "relu", &[x.into()], Attributes::new())
//!     .unwrap();
//!
//! let pattern = PatternSpec::kind(OpKind::Relu)
//!     .label("act")
//!     .child(PatternSpec::kind(OpKind::Parameter).label("input"));
//!
//! let binding = PatternMatcher::new(&graph).match_node(relu, &pattern).unwrap();
//! assert_eq!(binding.get("input"), Some(x));
//! ```

pub mod matcher;
pub mod ops;

// Re-export main types
pub use matcher::{matcher, Binding, NodePredicate, OpPattern, PatternMatcher, PatternSpec};
pub use ops::{
    const_then_quantize_range_op, identity, is_precision_preserving, quantize_range,
    quantize_range_then_const_op, PRECISION_PRESERVING_OPS,
};
