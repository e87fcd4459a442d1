//! Error types for lowp-optimizer
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Main error type for graph transformation operations
#[derive(Error, Debug)]
pub enum TransformError {
    /// A node's inputs are structurally incompatible with its operation,
    /// or a rewiring would introduce a cycle
    #[error("Shape inference failed for node '{node}': {reason}")]
    ShapeInference {
        /// Name of the node being created or rewired
        node: String,
        /// What went wrong
        reason: String,
    },

    /// `replace_node` was handed the wrong number of replacement outputs
    #[error("Arity mismatch replacing '{node}': node has {expected} outputs, got {actual}")]
    ArityMismatch {
        /// Name of the replaced node
        node: String,
        /// Output count of the replaced node
        expected: usize,
        /// Number of replacement outputs supplied
        actual: usize,
    },

    /// A node still has consumers and cannot be removed
    #[error("Cannot remove '{node}': {consumers} consumer(s) still reference its outputs")]
    DanglingConsumer {
        /// Name of the node
        node: String,
        /// Number of live consumer edges
        consumers: usize,
    },

    /// Quantization range node with fewer than two levels
    #[error("Invalid quantization levels on '{node}': {levels} (must be >= 2)")]
    InvalidQuantizationLevels {
        /// Name of the quantization range node
        node: String,
        /// Level count found on the node
        levels: i64,
    },

    /// Quantization range node whose low bound exceeds its high bound
    #[error("Invalid quantization range on '{node}': {reason}")]
    InvalidQuantizationRange {
        /// Name of the quantization range node
        node: String,
        /// Which bound is inverted
        reason: String,
    },

    /// Node id or name does not resolve to a live node
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Another live node already carries this name
    #[error("Duplicate node name: {0}")]
    DuplicateName(String),

    /// Invalid node configuration
    #[error("Invalid node: {0}")]
    InvalidNode(String),

    /// Attribute missing or of the wrong type
    #[error("Invalid attribute '{attr}' on '{node}': {reason}")]
    InvalidAttribute {
        /// Node name
        node: String,
        /// Attribute name
        attr: String,
        /// What went wrong
        reason: String,
    },

    /// Pass identifier not present in the registry
    #[error("Unknown pass: {0}")]
    UnknownPass(String),

    /// Pass parameter override could not be interpreted
    #[error("Invalid parameter '{param}' for pass '{pass}': {reason}")]
    InvalidPassParam {
        /// Pass identifier
        pass: String,
        /// Parameter name
        param: String,
        /// What went wrong
        reason: String,
    },

    /// Pass ordering hints form a cycle
    #[error("Pass ordering hints form a cycle involving: {0}")]
    OrderingCycle(String),

    /// A structural error raised while a pass was rewriting a node
    #[error("Pass '{pass}' failed on node '{node}': {source}")]
    PassFailed {
        /// Pass identifier
        pass: String,
        /// Name of the node the pass was visiting
        node: String,
        /// Underlying error
        #[source]
        source: Box<TransformError>,
    },

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransformError {
    /// Create a shape inference error
    pub fn shape(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ShapeInference {
            node: node.into(),
            reason: reason.into(),
        }
    }

    /// Create an attribute error
    pub fn attr(node: impl Into<String>, attr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            node: node.into(),
            attr: attr.into(),
            reason: reason.into(),
        }
    }

    /// Pass-local precondition failures.
    ///
    /// The pipeline turns these into diagnostics and keeps going; everything
    /// else aborts the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidQuantizationLevels { .. } | Self::InvalidQuantizationRange { .. }
        )
    }
}

/// Result type alias for optimizer operations
pub type OptResult<T> = Result<T, TransformError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransformError::shape("reshape_0", "element count mismatch");
        assert!(err.to_string().contains("reshape_0"));
        assert!(err.to_string().contains("element count mismatch"));
    }

    #[test]
    fn test_arity_mismatch() {
        let err = TransformError::ArityMismatch {
            node: "fq".to_string(),
            expected: 1,
            actual: 2,
        };
        assert!(err.to_string().contains("1 outputs, got 2"));
    }

    #[test]
    fn test_recoverable() {
        let levels = TransformError::InvalidQuantizationLevels {
            node: "fq".to_string(),
            levels: 1,
        };
        assert!(levels.is_recoverable());

        let dangling = TransformError::DanglingConsumer {
            node: "c".to_string(),
            consumers: 2,
        };
        assert!(!dangling.is_recoverable());
    }

    #[test]
    fn test_pass_failed_source() {
        use std::error::Error;

        let err = TransformError::PassFailed {
            pass: "fuse_quantization_range".to_string(),
            node: "fq".to_string(),
            source: Box::new(TransformError::NodeNotFound("n3".to_string())),
        };
        assert!(err.to_string().contains("fuse_quantization_range"));
        assert!(err.source().is_some());
    }
}
