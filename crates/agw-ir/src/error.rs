//! # Processing Errors
//!
//! `ProcessError` is what a single resource can fail with; its
//! [`severity`](ProcessError::severity) decides whether the pass survives.
//! `PassError` is what a whole pass can fail with.

use agw_core::{DigestError, Severity};
use agw_schema::ValidationError;
use thiserror::Error;

/// Failure processing one resource.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The resource has no `apiVersion`.
    #[error("need apiVersion")]
    MissingApiVersion,

    /// The resource has no `kind`.
    #[error("need kind")]
    MissingKind,

    /// A non-Pragma resource has no `name`.
    #[error("need name")]
    MissingName,

    /// Schema or field validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A bucket already holds a resource with this name.
    #[error("{resource} defines {kind} {name}, which is already present in {bucket}")]
    DuplicateName {
        /// The resource attempting the redefinition.
        resource: String,
        /// Its kind.
        kind: String,
        /// The conflicting name.
        name: String,
        /// The bucket holding the earlier definition.
        bucket: String,
    },

    /// A kind handler could not make sense of the resource.
    #[error("{resource}: could not process {kind} object: {reason}")]
    Handler {
        /// The resource being handled.
        resource: String,
        /// Its kind.
        kind: String,
        /// What went wrong.
        reason: String,
    },
}

impl ProcessError {
    /// Whether this failure rejects the pass or only the resource.
    pub fn severity(&self) -> Severity {
        match self {
            Self::MissingApiVersion
            | Self::MissingKind
            | Self::MissingName
            | Self::Validation(_) => Severity::Object,
            Self::DuplicateName { .. } | Self::Handler { .. } => Severity::Fatal,
        }
    }
}

/// Failure of a whole pass.
#[derive(Error, Debug)]
pub enum PassError {
    /// At least one fatal error occurred; the pass must not be published.
    #[error("unparseable configuration: {fatal_errors} fatal and {object_errors} object error(s)")]
    Rejected {
        /// Number of fatal errors.
        fatal_errors: usize,
        /// Number of resource-scoped errors.
        object_errors: usize,
    },
}

/// Failure to publish a pass.
#[derive(Error, Debug)]
pub enum PublishError {
    /// The pass itself was rejected.
    #[error(transparent)]
    Pass(#[from] PassError),

    /// The accepted IR could not be fingerprinted.
    #[error("cannot digest IR: {0}")]
    Digest(#[from] DigestError),
}
