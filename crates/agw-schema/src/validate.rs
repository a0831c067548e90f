//! # Resource Validation
//!
//! Applies the [`SchemaCache`] to a [`Resource`].
//!
//! 1. `apiVersion`, `kind`, and `name` must all be present.
//! 2. `apiVersion` must start with [`API_VERSION_PREFIX`]. The next path
//!    segment is the schema version.
//! 3. The schema for `(version, kind)` is resolved through the cache.
//! 4. With no schema, the resource passes. With a schema, the whole
//!    document must conform; every violation is reported.
//!
//! Steps 1 and 2 fail the same way whether or not a schema exists.

use std::fmt;

use agw_core::Resource;
use thiserror::Error;

use crate::cache::{SchemaCache, SchemaKey};

/// Namespace every supported `apiVersion` starts with.
pub const API_VERSION_PREFIX: &str = "ambassador/";

/// Why a resource failed validation.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// One of the identifying fields is absent.
    #[error("must have apiVersion, kind, and name")]
    MissingFields,

    /// `apiVersion` is outside the supported namespace.
    #[error("apiVersion {api_version} unsupported")]
    UnsupportedApiVersion {
        /// The offending `apiVersion`.
        api_version: String,
    },

    /// The document does not conform to its schema.
    #[error("not a valid {kind}: {violations}")]
    SchemaViolation {
        /// Kind whose schema was violated.
        kind: String,
        /// Structured list of individual violations.
        violations: ValidationViolations,
    },
}

/// A single validation violation with structured context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// JSON Pointer path to the violating field in the instance.
    pub instance_path: String,
    /// JSON Pointer path within the schema that triggered the error.
    pub schema_path: String,
    /// Human-readable description of the violation.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_path, self.message)
        }
    }
}

/// Collection of validation violations.
#[derive(Debug, Clone)]
pub struct ValidationViolations {
    violations: Vec<Violation>,
}

impl ValidationViolations {
    /// Returns the number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Returns true if there are no violations.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns a slice of all violations.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

impl fmt::Display for ValidationViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

/// Extract the schema version from a supported `apiVersion`.
///
/// `ambassador/v1` yields `v1`. Anything outside the namespace, or with
/// nothing after the prefix, yields `None`.
pub fn schema_version(api_version: &str) -> Option<&str> {
    api_version
        .strip_prefix(API_VERSION_PREFIX)
        .and_then(|rest| rest.split('/').next())
        .filter(|version| !version.is_empty())
}

/// Validate a resource against its schema, if one exists.
///
/// # Errors
///
/// - [`ValidationError::MissingFields`] if `apiVersion`, `kind`, or `name`
///   is absent.
/// - [`ValidationError::UnsupportedApiVersion`] if `apiVersion` is outside
///   [`API_VERSION_PREFIX`].
/// - [`ValidationError::SchemaViolation`] if a schema exists and the
///   document does not conform.
pub fn validate_resource(
    schemas: &mut SchemaCache,
    resource: &Resource,
) -> Result<(), ValidationError> {
    let (Some(api_version), Some(kind), Some(_name)) =
        (resource.api_version(), resource.kind(), resource.name())
    else {
        return Err(ValidationError::MissingFields);
    };

    let version =
        schema_version(api_version).ok_or_else(|| ValidationError::UnsupportedApiVersion {
            api_version: api_version.to_string(),
        })?;

    let key = SchemaKey::new(version, kind);
    let Some(validator) = schemas.resolve(&key) else {
        return Ok(());
    };

    let instance = resource.to_value();
    let violations: Vec<Violation> = validator
        .iter_errors(&instance)
        .map(|e| Violation {
            instance_path: e.instance_path.to_string(),
            schema_path: e.schema_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::SchemaViolation {
            kind: kind.to_string(),
            violations: ValidationViolations { violations },
        })
    }
}
