//! # agw-cli: Gateway Configuration Compiler CLI
//!
//! Loads YAML resource files, runs one compilation pass, and reports the
//! intermediate representation and pass health.
//!
//! ## Subcommands
//!
//! - `compile`: print the IR (buckets, sources, error ledger)
//! - `check`: print only health and errors
//!
//! ## Crate Policy
//!
//! - Argument parsing is separated from business logic.
//! - Handler functions delegate to `agw-ir`; no pipeline logic here.

pub mod compile;
pub mod load;
