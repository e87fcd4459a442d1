//! Pass registry and pass parameters
//!
//! The registry is explicit caller configuration: it maps pass ids to
//! factories, and [`crate::transform::Pipeline::from_config`] instantiates
//! the passes a [`crate::transform::PipelineConfig`] asks for.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{OptResult, TransformError};
use crate::traits::Transformation;

/// Scalar pass parameter as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean flag
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    Str(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Str(v) => write!(f, "\"{}\"", v),
        }
    }
}

/// Parameter overrides handed to a pass factory
#[derive(Debug, Clone, Default)]
pub struct PassParams {
    pass: String,
    values: BTreeMap<String, ParamValue>,
}

impl PassParams {
    /// Parameters for `pass`
    pub fn new(pass: impl Into<String>, values: BTreeMap<String, ParamValue>) -> Self {
        Self {
            pass: pass.into(),
            values,
        }
    }

    /// Empty parameter set for `pass`
    pub fn empty(pass: impl Into<String>) -> Self {
        Self::new(pass, BTreeMap::new())
    }

    /// Raw value
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Fail on any parameter not in `known`
    pub fn check_known(&self, known: &[&str]) -> OptResult<()> {
        match self.values.keys().find(|k| !known.contains(&k.as_str())) {
            Some(unknown) => Err(self.invalid(unknown, "unknown parameter")),
            None => Ok(()),
        }
    }

    /// Non-negative integer parameter
    pub fn usize_or(&self, name: &str, default: usize) -> OptResult<usize> {
        match self.values.get(name) {
            None => Ok(default),
            Some(ParamValue::Int(v)) => usize::try_from(*v).map_err(|_| {
                self.invalid(name, format!("expected a non-negative integer, got {}", v))
            }),
            Some(other) => Err(self.invalid(name, format!("expected an integer, got {}", other))),
        }
    }

    /// Boolean parameter
    pub fn bool_or(&self, name: &str, default: bool) -> OptResult<bool> {
        match self.values.get(name) {
            None => Ok(default),
            Some(ParamValue::Bool(v)) => Ok(*v),
            Some(other) => Err(self.invalid(name, format!("expected a boolean, got {}", other))),
        }
    }

    /// Float parameter; integers are accepted
    pub fn f64_or(&self, name: &str, default: f64) -> OptResult<f64> {
        match self.values.get(name) {
            None => Ok(default),
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            Some(other) => Err(self.invalid(name, format!("expected a number, got {}", other))),
        }
    }

    fn invalid(&self, param: &str, reason: impl Into<String>) -> TransformError {
        TransformError::InvalidPassParam {
            pass: self.pass.clone(),
            param: param.to_string(),
            reason: reason.into(),
        }
    }
}

/// Builds a pass from its parameters
pub type PassFactory = fn(&PassParams) -> OptResult<Box<dyn Transformation>>;

/// Pass id → factory, in registration order
#[derive(Clone, Default)]
pub struct PassRegistry {
    factories: IndexMap<&'static str, PassFactory>,
}

impl fmt::Debug for PassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassRegistry")
            .field("passes", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PassRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every pass shipped with this crate
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        crate::transformers::register_builtin(&mut registry);
        registry
    }

    /// Register (or overwrite) a factory
    pub fn register(&mut self, id: &'static str, factory: PassFactory) -> &mut Self {
        self.factories.insert(id, factory);
        self
    }

    /// Check if `id` is registered
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered ids in registration order
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    /// Instantiate pass `id`
    pub fn create(&self, id: &str, params: &PassParams) -> OptResult<Box<dyn Transformation>> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| TransformError::UnknownPass(id.to_string()))?;
        factory(params)
    }
}
