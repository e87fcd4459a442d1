//! Node attributes
//!
//! Attributes are a name → [`AttrValue`] map kept in insertion order.

use indexmap::IndexMap;
use ndarray::ArrayD;

use crate::error::{OptResult, TransformError};
use crate::tensor::ElementType;

use super::core::Graph;

/// Typed attribute payload
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Integer scalar
    Int(i64),
    /// Float scalar
    Float(f32),
    /// Integer list (axes, permutations, reshape targets)
    Ints(Vec<i64>),
    /// Static shape
    Shape(Vec<usize>),
    /// Element type
    Type(ElementType),
    /// Enumeration / free-form string
    Str(String),
    /// Constant tensor payload
    Tensor(ArrayD<f32>),
    /// Nested sub-graph
    Graph(Box<Graph>),
}

impl AttrValue {
    /// Short name of the variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Ints(_) => "ints",
            Self::Shape(_) => "shape",
            Self::Type(_) => "type",
            Self::Str(_) => "string",
            Self::Tensor(_) => "tensor",
            Self::Graph(_) => "graph",
        }
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for AttrValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<Vec<i64>> for AttrValue {
    fn from(v: Vec<i64>) -> Self {
        Self::Ints(v)
    }
}

impl From<ElementType> for AttrValue {
    fn from(v: ElementType) -> Self {
        Self::Type(v)
    }
}

impl From<ArrayD<f32>> for AttrValue {
    fn from(v: ArrayD<f32>) -> Self {
        Self::Tensor(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

/// Ordered attribute map of a node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(IndexMap<String, AttrValue>);

impl Attributes {
    /// Create an empty attribute map
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    /// Insert or overwrite an attribute
    pub fn insert(&mut self, name: &str, value: impl Into<AttrValue>) -> Option<AttrValue> {
        self.0.insert(name.to_string(), value.into())
    }

    /// Get raw attribute value
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.0.get(name)
    }

    /// Check if attribute exists
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.0.iter()
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get attribute value as i64
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get attribute value as f32
    pub fn float(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            AttrValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Get attribute value as i64 list
    pub fn ints(&self, name: &str) -> Option<&[i64]> {
        match self.get(name)? {
            AttrValue::Ints(v) => Some(v),
            _ => None,
        }
    }

    /// Get attribute value as a shape
    pub fn shape(&self, name: &str) -> Option<&[usize]> {
        match self.get(name)? {
            AttrValue::Shape(v) => Some(v),
            _ => None,
        }
    }

    /// Get attribute value as an element type
    pub fn elem_type(&self, name: &str) -> Option<ElementType> {
        match self.get(name)? {
            AttrValue::Type(v) => Some(*v),
            _ => None,
        }
    }

    /// Get attribute value as string
    pub fn str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            AttrValue::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Get attribute value as tensor
    pub fn tensor(&self, name: &str) -> Option<&ArrayD<f32>> {
        match self.get(name)? {
            AttrValue::Tensor(v) => Some(v),
            _ => None,
        }
    }

    /// Get attribute value as sub-graph
    pub fn graph(&self, name: &str) -> Option<&Graph> {
        match self.get(name)? {
            AttrValue::Graph(g) => Some(g),
            _ => None,
        }
    }

    /// Required i64 attribute, labelled with the owning node for errors
    pub fn require_int(&self, node: &str, name: &str) -> OptResult<i64> {
        self.int(name).ok_or_else(|| self.missing(node, name, "int"))
    }

    /// Required f32 attribute
    pub fn require_float(&self, node: &str, name: &str) -> OptResult<f32> {
        self.float(name).ok_or_else(|| self.missing(node, name, "float"))
    }

    /// Required i64 list attribute
    pub fn require_ints(&self, node: &str, name: &str) -> OptResult<&[i64]> {
        self.ints(name).ok_or_else(|| self.missing(node, name, "ints"))
    }

    /// Required tensor attribute
    pub fn require_tensor(&self, node: &str, name: &str) -> OptResult<&ArrayD<f32>> {
        self.tensor(name).ok_or_else(|| self.missing(node, name, "tensor"))
    }

    fn missing(&self, node: &str, name: &str, expected: &str) -> TransformError {
        match self.get(name) {
            Some(v) => TransformError::attr(
                node,
                name,
                format!("expected {}, found {}", expected, v.type_name()),
            ),
            None => TransformError::attr(node, name, "missing"),
        }
    }
}

impl FromIterator<(String, AttrValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, AttrValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
