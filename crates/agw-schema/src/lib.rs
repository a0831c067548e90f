//! # agw-schema: Schema Cache & Resource Validation
//!
//! Runtime JSON Schema validation of gateway resources.
//!
//! ## Schema Cache (`cache`)
//!
//! [`SchemaCache`] maps `(version, kind)` to a compiled schema read from
//! `<schema_root>/<version>/<Kind>.schema`, loading lazily and caching for
//! the lifetime of a compilation pass.
//!
//! ## Validation (`validate`)
//!
//! [`validate_resource`] checks the identifying fields, the `apiVersion`
//! namespace, and then the schema if there is one.
//!
//! ## Crate Policy
//!
//! - Depends only on `agw-core` internally.
//! - Schema presence is optional: a kind without a schema is accepted as-is.
//! - Schema enforcement is strict: when a schema exists, every violation is
//!   reported and the resource is rejected.

pub mod cache;
pub mod validate;

pub use cache::{SchemaCache, SchemaKey, SCHEMA_FILE_SUFFIX};
pub use validate::{
    schema_version, validate_resource, ValidationError, ValidationViolations, Violation,
    API_VERSION_PREFIX,
};
