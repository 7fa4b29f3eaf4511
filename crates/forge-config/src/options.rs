//! Build option values
//!
//! Manifests carry loosely typed option maps (`BUILD_TESTING: false`,
//! `CMAKE_CXX_STANDARD: 17`, `CMAKE_OSX_DEPLOYMENT_TARGET: 12.0`,
//! `ZLIB_SUFFIX: "d"`). They are kept as a small tagged value so builders
//! can render them for their own tool.
//!
//! Floats render in their shortest round-trip form, so `10.10` becomes
//! `10.1`. Quote values whose trailing zeros matter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single build option value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl OptionValue {
    /// Boolean view, if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// String view, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            // Debug keeps the fraction: 12.0 stays "12.0"
            Self::Float(x) => write!(f, "{:?}", x),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Ordered option map (name -> value)
pub type BuildOptions = BTreeMap<String, OptionValue>;
