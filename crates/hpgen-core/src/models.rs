//! Data models for hpgen.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

use crate::error::{HpgenError, Result};

/// A single flag value: int, float, bool or string.
///
/// The variant is fixed when the value is constructed, so a bool can never be
/// mistaken for a number further down the line.
#[derive(Debug, Clone, PartialEq)]
pub enum FlagValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl FlagValue {
    /// Convert a loosely typed YAML value into a flag value.
    ///
    /// Nulls, sequences, mappings and tagged values have no hparams
    /// representation and are rejected as a contract violation.
    pub fn from_yaml(name: &str, value: &serde_yaml::Value) -> Result<Self> {
        use serde_yaml::Value;
        match value {
            Value::Bool(b) => Ok(FlagValue::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(FlagValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(FlagValue::Float(f))
                } else {
                    Err(violation(name, value))
                }
            }
            Value::String(s) => Ok(FlagValue::Text(s.clone())),
            _ => Err(violation(name, value)),
        }
    }
}

fn violation(name: &str, value: &serde_yaml::Value) -> HpgenError {
    HpgenError::ContractViolation {
        name: name.to_string(),
        value: format!("{value:?}"),
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Int(i) => write!(f, "{i}"),
            FlagValue::Float(x) => write!(f, "{x}"),
            FlagValue::Bool(b) => write!(f, "{b}"),
            FlagValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for FlagValue {
    fn from(v: f64) -> Self {
        FlagValue::Float(v)
    }
}
impl From<f32> for FlagValue {
    fn from(v: f32) -> Self {
        FlagValue::Float(v as f64)
    }
}
impl From<i64> for FlagValue {
    fn from(v: i64) -> Self {
        FlagValue::Int(v)
    }
}
impl From<i32> for FlagValue {
    fn from(v: i32) -> Self {
        FlagValue::Int(v as i64)
    }
}
impl From<bool> for FlagValue {
    fn from(v: bool) -> Self {
        FlagValue::Bool(v)
    }
}
impl From<String> for FlagValue {
    fn from(v: String) -> Self {
        FlagValue::Text(v)
    }
}
impl From<&str> for FlagValue {
    fn from(v: &str) -> Self {
        FlagValue::Text(v.to_string())
    }
}

/// Flag values used when a run is created without explicit values.
pub fn sample_flags() -> BTreeMap<String, FlagValue> {
    BTreeMap::from([
        ("noise".to_string(), FlagValue::Float(0.1)),
        ("x".to_string(), FlagValue::Float(1.0)),
    ])
}

/// Lifecycle status of a sample run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Error,
    Terminated,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Error | RunStatus::Terminated
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Error => write!(f, "error"),
            RunStatus::Terminated => write!(f, "terminated"),
        }
    }
}

/// Declared type of a flag in the guild file.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlagType {
    Float,
    Int,
    String,
    /// Any type name hparams has no dedicated domain for (`boolean`, `path`, ...).
    #[serde(other)]
    Other,
}

/// A flag declared by an operation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlagDef {
    pub name: String,
    pub flag_type: Option<FlagType>,
    pub description: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl FlagDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, flag_type: FlagType) -> Self {
        self.flag_type = Some(flag_type);
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }
}

/// One point of a scalar time series.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarPoint {
    pub tag: String,
    pub value: f64,
    pub step: i64,
}

impl ScalarPoint {
    pub fn new(tag: impl Into<String>, value: f64, step: i64) -> Self {
        Self {
            tag: tag.into(),
            value,
            step,
        }
    }
}
