//! # agw-ir: Ingestion Pipeline & Intermediate Representation
//!
//! Folds an ordered set of loosely-typed resources into one consistent
//! intermediate representation, keyed by bucket and name.
//!
//! ## Pass lifecycle
//!
//! 1. [`Ir::new`] builds an empty aggregate from [`PassSettings`], with the
//!    two bootstrap sources and the probe templates already in place.
//! 2. [`Ir::load_all`] filters by ownership, applies Pragma location
//!    overrides, validates, dispatches by kind, and stores. Failures go to
//!    the [`Diagnostics`] ledger instead of aborting the batch.
//! 3. The pass is accepted whole ([`PassHealth::Clean`] or
//!    [`PassHealth::Degraded`]) or rejected whole ([`PassError::Rejected`]).
//! 4. [`Publisher::recompile`] swaps an accepted pass in atomically.
//!
//! ## Crate Policy
//!
//! - Single-threaded, synchronous passes. No I/O other than schema reads.
//! - No mutable globals: settings are threaded explicitly.
//! - A bucket never silently overwrites a name.

pub mod diagnostics;
pub mod error;
pub mod handlers;
pub mod ir;
pub mod pipeline;
pub mod publish;
pub mod settings;

pub use diagnostics::{Diagnostics, PassHealth};
pub use error::{PassError, ProcessError, PublishError};
pub use handlers::{Handler, HANDLERS};
pub use ir::{Bucket, Ir, IrSnapshot, LocationOverride, MODULES_BUCKET};
pub use pipeline::PRAGMA_KIND;
pub use publish::{compile, PublishedIr, Publisher};
pub use settings::{PassSettings, PragmaOrdering, ProbeDefaults, ProbeTemplate, Runtime};
