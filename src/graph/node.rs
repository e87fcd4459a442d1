//! Node, output and edge types
//!
//! Nodes live in the graph arena and are addressed by [`NodeId`]. Edges are
//! plain index pairs: a consumer input holds an [`OutputRef`], and each
//! output slot keeps the matching set of [`Consumer`] back-references.

use std::fmt;

use smallvec::SmallVec;

use crate::tensor::{ElementType, Shape};

use super::attrs::Attributes;
use super::maps::ConsumerSet;
use super::op::OpKind;

/// Arena index of a node. Ids are never reused within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Position in the arena
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reference to one produced value: owning node + output index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputRef {
    /// Producing node
    pub node: NodeId,
    /// Zero-based output index on the producer
    pub index: usize,
}

impl OutputRef {
    /// Create a reference to output `index` of `node`
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

impl From<NodeId> for OutputRef {
    /// First output of a node
    fn from(node: NodeId) -> Self {
        Self { node, index: 0 }
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.index)
    }
}

/// Back-reference from an output slot to one consuming input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Consumer {
    /// Consuming node
    pub node: NodeId,
    /// Input position on the consuming node
    pub input: usize,
}

/// Element type and static shape of a value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TensorType {
    /// Element type
    pub elem: ElementType,
    /// Row-major dimensions
    pub shape: Shape,
}

impl TensorType {
    /// Create a tensor type
    pub fn new(elem: ElementType, shape: &[usize]) -> Self {
        Self {
            elem,
            shape: SmallVec::from_slice(shape),
        }
    }

    /// Rank of the value
    pub fn rank(&self) -> usize {
        self.shape.len()
    }
}

impl fmt::Display for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.elem, self.shape.as_slice())
    }
}

/// One output value slot owned by a node
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSlot {
    pub(crate) ty: TensorType,
    pub(crate) consumers: ConsumerSet,
}

impl OutputSlot {
    pub(crate) fn new(ty: TensorType) -> Self {
        Self {
            ty,
            consumers: ConsumerSet::new(),
        }
    }

    /// Declared type of the value
    pub fn ty(&self) -> &TensorType {
        &self.ty
    }

    /// Inputs currently reading this value, in wiring order
    pub fn consumers(&self) -> &[Consumer] {
        &self.consumers
    }
}

/// An operation instance in the graph
///
/// Fields are only mutable through [`crate::graph::Graph`] so the consumer
/// index and inferred types cannot drift.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) kind: OpKind,
    pub(crate) name: String,
    pub(crate) inputs: SmallVec<[OutputRef; 4]>,
    pub(crate) outputs: SmallVec<[OutputSlot; 1]>,
    pub(crate) attrs: Attributes,
}

impl Node {
    /// Operation kind
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// Unique name within the graph
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered input references
    pub fn inputs(&self) -> &[OutputRef] {
        &self.inputs
    }

    /// Input reference at `index`
    pub fn input(&self, index: usize) -> Option<OutputRef> {
        self.inputs.get(index).copied()
    }

    /// Ordered output slots
    pub fn outputs(&self) -> &[OutputSlot] {
        &self.outputs
    }

    /// Number of output slots
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Type of output `index`
    pub fn output_type(&self, index: usize) -> Option<&TensorType> {
        self.outputs.get(index).map(|s| &s.ty)
    }

    /// Attribute map
    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    /// Total number of consumer edges across all outputs
    pub fn consumer_count(&self) -> usize {
        self.outputs.iter().map(|s| s.consumers.len()).sum()
    }
}
