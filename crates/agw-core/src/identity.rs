//! # Ownership Identity
//!
//! Several independent gateway instances may share one stream of input
//! documents. Each instance is configured with an [`InstanceId`]; each
//! document may restrict itself to one or more instances through its
//! `ambassador_id` field, either a single string or a list of strings.
//!
//! A document without the field belongs to the `"default"` instance.
//! A document whose field is null, an empty string, or an empty list is
//! not restricted at all.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resource::Resource;

/// Identity used when none is configured.
pub const DEFAULT_INSTANCE_ID: &str = "default";

/// Document field carrying the set of owning instances.
pub const OWNERSHIP_FIELD: &str = "ambassador_id";

/// The identity this compiler instance answers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(String);

impl InstanceId {
    /// Wrap an identity string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Access the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self(DEFAULT_INSTANCE_ID.to_string())
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The set of instances a document admits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ownership {
    /// Every instance processes the document.
    Unrestricted,
    /// Only the listed instances process the document.
    Restricted(Vec<String>),
}

impl Ownership {
    /// Interpret the ownership field of a resource.
    pub fn of(resource: &Resource) -> Self {
        match resource.get(OWNERSHIP_FIELD) {
            None => Self::Restricted(vec![DEFAULT_INSTANCE_ID.to_string()]),
            Some(value) => Self::from_value(value),
        }
    }

    /// Interpret a raw ownership value.
    ///
    /// Any falsy value (null, `false`, `0`, empty string, list or mapping)
    /// means every instance. Non-string entries never match any instance.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::Unrestricted,
            Value::String(s) if s.is_empty() => Self::Unrestricted,
            Value::String(s) => Self::Restricted(vec![s.clone()]),
            Value::Array(items) if items.is_empty() => Self::Unrestricted,
            Value::Array(items) => Self::Restricted(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
            Value::Bool(false) => Self::Unrestricted,
            Value::Number(n) if n.as_f64() == Some(0.0) => Self::Unrestricted,
            Value::Object(map) if map.is_empty() => Self::Unrestricted,
            _ => Self::Restricted(Vec::new()),
        }
    }

    /// Whether the given instance should process the document.
    pub fn admits(&self, id: &InstanceId) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Restricted(ids) => ids.iter().any(|candidate| candidate == id.as_str()),
        }
    }
}

impl std::fmt::Display for Ownership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unrestricted => f.write_str("*"),
            Self::Restricted(ids) => write!(f, "[{}]", ids.join(", ")),
        }
    }
}
