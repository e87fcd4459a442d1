//! Graph IR for tensor dataflow programs
//!
//! This module provides the core infrastructure for representing and
//! mutating computation graphs:
//!
//! - [`Graph`]: arena of nodes with O(1) lookups and consumer back-references
//! - [`Node`], [`OutputRef`], [`Consumer`]: nodes and the edges between them
//! - [`OpKind`]: closed set of operations, each with an inference rule
//! - [`Attributes`]: typed attribute maps
//!
//! # Example
//!
//! ```
//! use lowp_optimizer::graph::{Attributes, Graph, OpKind};
//! use lowp_optimizer::tensor::ElementType;
//!
//! let mut graph = Graph::new();
//! let x = graph.add_parameter("x", ElementType::F32, &[1, 8]).unwrap();
//! let relu = graph
//!     .add_node(OpKind::Relu, "relu", &[x.into()], Attributes::new())
//!     .unwrap();
//! graph.add_result("out", relu.into()).unwrap();
//!
//! assert!(graph.is_single_use(x));
//! assert_eq!(graph.topological_order().len(), 3);
//! ```
//!
//! # Invariants
//!
//! Every public mutator keeps these true after each call:
//!
//! | Invariant | Maintained by |
//! |-----------|---------------|
//! | inputs resolve to live outputs | `add_node`, `remove_node` (refuses while consumed) |
//! | consumer sets mirror input lists | every rewiring helper |
//! | acyclic | `set_input` / `replace_node` cycle checks |
//! | output types are fresh | type refresh with rollback |
//!
//! [`Graph::validate`] rechecks all of them from scratch.

pub mod accessors;
pub mod attrs;
pub mod core;
pub mod maps;
pub mod mutators;
pub mod node;
pub mod op;
pub mod validate;

// Re-export main types
pub use attrs::{AttrValue, Attributes};
pub use self::core::Graph;
pub use maps::{ConsumerSet, NameIndex, NodeArena};
pub use node::{Consumer, Node, NodeId, OutputRef, OutputSlot, TensorType};
pub use op::{infer_outputs, OpKind, OutputTypes};
