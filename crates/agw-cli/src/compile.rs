//! # Compile & Check Subcommands
//!
//! `compile` runs one pass over the given YAML files and prints the IR;
//! `check` runs the same pass and prints only health and errors.
//!
//! Exit codes: `0` clean, `2` degraded (recoverable errors or skipped
//! documents), `1` rejected.

use std::collections::BTreeMap;
use std::path::PathBuf;

use agw_core::{ErrorRecord, InstanceId};
use agw_ir::{Ir, PassError, PassHealth, PassSettings, PragmaOrdering};
use clap::{Args, ValueEnum};
use serde_json::json;

use crate::load::{load_file, source_names, LoadedDocuments, SkippedDocument};

/// Exit code for a clean pass.
pub const EXIT_CLEAN: u8 = 0;
/// Exit code for a rejected pass.
pub const EXIT_REJECTED: u8 = 1;
/// Exit code for a pass with recoverable errors.
pub const EXIT_DEGRADED: u8 = 2;

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Machine-readable JSON.
    Json,
    /// Human-readable summary.
    Text,
}

/// Options shared by `compile` and `check`.
#[derive(Args, Debug)]
pub struct PassArgs {
    /// Root of the `<version>/<Kind>.schema` tree.
    #[arg(long, default_value = "schemas")]
    pub schemas: PathBuf,

    /// Ownership identity (defaults to $AMBASSADOR_ID, then "default").
    #[arg(long)]
    pub id: Option<String>,

    /// Apply every Pragma before any other resource.
    #[arg(long)]
    pub hoist_pragmas: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// YAML files to load, processed in the order given.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Arguments for the compile subcommand.
#[derive(Args, Debug)]
pub struct CompileArgs {
    #[command(flatten)]
    pub pass: PassArgs,
}

/// Arguments for the check subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub pass: PassArgs,
}

/// Build per-pass settings from the environment and the command line.
pub fn settings_for(args: &PassArgs) -> PassSettings {
    let mut settings = PassSettings::from_env(&args.schemas);
    if let Some(id) = &args.id {
        settings = settings.with_instance_id(InstanceId::new(id));
    }
    if args.hoist_pragmas {
        settings = settings.with_pragma_ordering(PragmaOrdering::Hoisted);
    }
    settings
}

/// Load every file named on the command line, in order.
///
/// # Errors
///
/// Fails on the first unreadable or unparseable file, or if a path is
/// given twice.
pub fn load_inputs(args: &PassArgs) -> anyhow::Result<LoadedDocuments> {
    let names = source_names(&args.files)?;
    let mut loaded = LoadedDocuments::default();
    for (file, name) in args.files.iter().zip(&names) {
        let documents = load_file(file, name)?;
        tracing::info!(
            file = %file.display(),
            source = %name,
            resources = documents.resources.len(),
            skipped = documents.skipped.len(),
            "loaded"
        );
        loaded.extend(documents);
    }
    Ok(loaded)
}

/// One finished pass over the command-line inputs.
#[derive(Debug)]
pub struct PassRun {
    /// The aggregate.
    pub ir: Ir,
    /// What `load_all` returned.
    pub outcome: Result<PassHealth, PassError>,
    /// Documents that never became resources.
    pub skipped: Vec<SkippedDocument>,
}

impl PassRun {
    /// Health of the whole run. Skipped documents degrade a clean pass.
    pub fn health(&self) -> Option<PassHealth> {
        match &self.outcome {
            Ok(PassHealth::Clean) if !self.skipped.is_empty() => Some(PassHealth::Degraded),
            Ok(health) => Some(*health),
            Err(_) => None,
        }
    }

    /// Process exit code for this run.
    pub fn exit_code(&self) -> u8 {
        match self.health() {
            Some(PassHealth::Clean) => EXIT_CLEAN,
            Some(PassHealth::Degraded) => EXIT_DEGRADED,
            None => EXIT_REJECTED,
        }
    }

    fn health_label(&self) -> &'static str {
        match self.health() {
            Some(PassHealth::Clean) => "clean",
            Some(PassHealth::Degraded) => "degraded",
            None => "rejected",
        }
    }
}

/// Run one pass over the inputs.
///
/// # Errors
///
/// Fails only if the inputs cannot be loaded. A rejected pass is an
/// outcome, not an error.
pub fn run_pass(args: &PassArgs) -> anyhow::Result<PassRun> {
    let loaded = load_inputs(args)?;
    let mut ir = Ir::new(settings_for(args));
    let outcome = ir.load_all(loaded.resources);
    Ok(PassRun {
        ir,
        outcome,
        skipped: loaded.skipped,
    })
}

/// Handle `agw compile`.
///
/// # Errors
///
/// Fails if inputs cannot be loaded or the IR cannot be serialized.
pub fn run_compile(args: &CompileArgs) -> anyhow::Result<u8> {
    let run = run_pass(&args.pass)?;

    match args.pass.format {
        OutputFormat::Json => {
            let snapshot = run.ir.snapshot();
            let digest = match &run.outcome {
                Ok(_) => Some(snapshot.digest()?.to_string()),
                Err(_) => None,
            };
            let report = json!({
                "health": run.health_label(),
                "digest": digest,
                "skipped": run.skipped,
                "ir": snapshot,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("{}", run.ir);
            print_skipped(&run.skipped);
            print_errors(run.ir.diagnostics().errors());
            println!("health: {}", run.health_label());
        }
    }

    Ok(run.exit_code())
}

/// Handle `agw check`.
///
/// # Errors
///
/// Fails if inputs cannot be loaded.
pub fn run_check(args: &CheckArgs) -> anyhow::Result<u8> {
    let run = run_pass(&args.pass)?;
    let diagnostics = run.ir.diagnostics();

    match args.pass.format {
        OutputFormat::Json => {
            let report = json!({
                "health": run.health_label(),
                "fatal_errors": diagnostics.fatal_errors(),
                "object_errors": diagnostics.object_errors(),
                "skipped": run.skipped,
                "errors": diagnostics.errors(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            print_skipped(&run.skipped);
            print_errors(diagnostics.errors());
            println!(
                "health: {} ({} fatal, {} object, {} skipped)",
                run.health_label(),
                diagnostics.fatal_errors(),
                diagnostics.object_errors(),
                run.skipped.len()
            );
        }
    }

    Ok(run.exit_code())
}

fn print_skipped(skipped: &[SkippedDocument]) {
    for document in skipped {
        println!("{}: [skipped] {}", document.rkey, document.reason);
    }
}

fn print_errors(errors: &BTreeMap<String, Vec<ErrorRecord>>) {
    for (rkey, records) in errors {
        for record in records {
            println!("{rkey}: {record}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(outcome: Result<PassHealth, PassError>, skipped: usize) -> PassRun {
        PassRun {
            ir: Ir::new(PassSettings::new("/nonexistent")),
            outcome,
            skipped: (0..skipped)
                .map(|i| SkippedDocument {
                    rkey: format!("x.yaml.{i}"),
                    reason: "not a mapping".to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(run(Ok(PassHealth::Clean), 0).exit_code(), EXIT_CLEAN);
        assert_eq!(run(Ok(PassHealth::Degraded), 0).exit_code(), EXIT_DEGRADED);
        let rejected = run(
            Err(PassError::Rejected {
                fatal_errors: 1,
                object_errors: 0,
            }),
            2,
        );
        assert_eq!(rejected.exit_code(), EXIT_REJECTED);
        assert_eq!(rejected.health_label(), "rejected");
    }

    #[test]
    fn test_skipped_documents_degrade_clean_pass() {
        let skipped = run(Ok(PassHealth::Clean), 1);
        assert_eq!(skipped.health(), Some(PassHealth::Degraded));
        assert_eq!(skipped.exit_code(), EXIT_DEGRADED);
    }
}
