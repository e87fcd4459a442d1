//! Graph transformation module
//!
//! This module provides the infrastructure that drives passes over a graph:
//!
//! - [`Pipeline`]: orders passes and sweeps the graph to a fixpoint
//! - [`TransformationContext`]: per-run visited set, rewrite log and
//!   precision annotations
//! - [`PassRegistry`]: pass id → factory, used by [`Pipeline::from_config`]
//! - [`eliminate`]: splice helpers shared by the passes
//!
//! # Example
//!
//! ```
//! use lowp_optimizer::graph::{Attributes, Graph, OpKind};
//! use lowp_optimizer::tensor::{vector, ElementType};
//! use lowp_optimizer::transform::Pipeline;
//!
//! let mut graph = Graph::new();
//! let x = graph.add_parameter("x", ElementType::F32, &[4]).unwrap();
//! let id = graph
//!     .add_node(OpKind::Identity, "id", &[x.into()], Attributes::new())
//!     .unwrap();
//! graph.add_result("out", id.into()).unwrap();
//!
//! let stats = Pipeline::builtin().unwrap().run(&mut graph).unwrap();
//! assert_eq!(stats.rewrites("eliminate_identity"), 1);
//! assert!(!stats.did_not_converge);
//! ```
//!
//! # Sweep semantics
//!
//! | Step | Behavior |
//! |------|----------|
//! | order | priority, stable by insertion, then `runs_after` hints |
//! | visit | reverse topological snapshot; removed nodes skipped |
//! | stop | a sweep with zero rewrites, or the sweep budget |
//! | errors | quantization preconditions → diagnostic; others → `PassFailed` |

pub mod context;
pub mod eliminate;
pub mod pipeline;
pub mod registry;

// Re-export main types and functions
pub use context::{Diagnostic, QuantizedPrecision, RewriteRecord, TransformationContext};
pub use eliminate::{can_eliminate, eliminate_node, remove_chain, EliminationResult};
pub use pipeline::{PassConfig, Pipeline, PipelineConfig, Stats};
pub use registry::{ParamValue, PassFactory, PassParams, PassRegistry};
