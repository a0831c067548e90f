//! # Error Types
//!
//! Errors raised while constructing core values, and the structured
//! `ErrorRecord` that every later stage attaches to a resource and to the
//! pass-wide ledger.
//!
//! ## Design
//!
//! - Two severities only. `Fatal` rejects the whole pass; `Object` makes a
//!   single resource unusable while the rest of the pass proceeds.
//! - An `ErrorRecord` always carries enough text to answer "why" on its
//!   own. The "which document" half comes from the `rkey` it is filed under.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error constructing a [`Resource`](crate::Resource) from a parsed document.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The parsed document was not a mapping.
    #[error("{rkey}: document must be a mapping, found {found}")]
    NotAMapping {
        /// Key of the offending document.
        rkey: String,
        /// JSON type name of what was found instead.
        found: &'static str,
    },
}

/// Error computing a canonical digest.
#[derive(Error, Debug)]
pub enum DigestError {
    /// Canonical JSON serialization failed.
    #[error("canonical serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// How bad an error is for the pass it occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The configuration is unusable; the pass must not be published.
    Fatal,
    /// One resource is unusable; the pass is degraded but usable.
    Object,
}

impl Severity {
    /// Returns the lowercase severity name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fatal => "fatal",
            Self::Object => "object",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured error, as reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Severity of the failure.
    pub severity: Severity,
    /// Human-readable reason.
    pub error: String,
}

impl ErrorRecord {
    /// Build a record from a severity and anything displayable.
    pub fn new(severity: Severity, error: impl std::fmt::Display) -> Self {
        Self {
            severity,
            error: error.to_string(),
        }
    }

    /// Whether this record rejects the pass.
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

impl std::fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.severity, self.error)
    }
}
