//! # agw-core: Foundational Types for the Gateway Configuration Compiler
//!
//! This crate defines the values every other crate in the workspace passes
//! around. It depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **One `Resource` per input document.** A `Resource` is the permanent
//!    provenance record of the document it was parsed from. After
//!    construction it changes in exactly two ways: its `location` may be
//!    overridden by a Pragma, and errors may be attached to it.
//!
//! 2. **`rkey` is the join key.** Provenance, location overrides, and the
//!    error ledger are all keyed by the originating document's `rkey`.
//!
//! 3. **Newtype for the ownership identity.** `InstanceId` is not a bare
//!    string; `Ownership` interprets a document's `ambassador_id` field.
//!
//! 4. **Digests flow through `CanonicalBytes`.** RFC 8785 canonical JSON,
//!    then SHA-256. Equal IR snapshots always produce equal digests.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `agw-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod digest;
pub mod error;
pub mod identity;
pub mod resource;

// Re-export primary types for ergonomic imports.
pub use digest::{sha256_digest, CanonicalBytes, ContentDigest};
pub use error::{DigestError, ErrorRecord, ResourceError, Severity};
pub use identity::{InstanceId, Ownership, DEFAULT_INSTANCE_ID, OWNERSHIP_FIELD};
pub use resource::{Resource, DIAGNOSTICS_RKEY, INTERNAL_RKEY};
