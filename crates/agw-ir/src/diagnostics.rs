//! # Diagnostics Ledger
//!
//! Pass-wide record of every error, keyed by the `rkey` of the document it
//! concerns, plus fatal/object counters that gate whether the pass is
//! usable.

use std::collections::BTreeMap;

use agw_core::{ErrorRecord, Severity};
use serde::{Deserialize, Serialize};

/// Health of a pass that was not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassHealth {
    /// No errors at all.
    Clean,
    /// Some resources were unusable; operators must be told.
    Degraded,
}

/// Errors accumulated during one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    errors: BTreeMap<String, Vec<ErrorRecord>>,
    fatal_errors: usize,
    object_errors: usize,
}

impl Diagnostics {
    /// File a record under `rkey`.
    pub fn record(&mut self, rkey: &str, record: ErrorRecord) {
        match record.severity {
            Severity::Fatal => self.fatal_errors += 1,
            Severity::Object => self.object_errors += 1,
        }
        self.errors.entry(rkey.to_string()).or_default().push(record);
    }

    /// The whole ledger.
    pub fn errors(&self) -> &BTreeMap<String, Vec<ErrorRecord>> {
        &self.errors
    }

    /// Records filed under one `rkey`, oldest first.
    pub fn errors_for(&self, rkey: &str) -> &[ErrorRecord] {
        self.errors.get(rkey).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of fatal errors.
    pub fn fatal_errors(&self) -> usize {
        self.fatal_errors
    }

    /// Number of resource-scoped errors.
    pub fn object_errors(&self) -> usize {
        self.object_errors
    }

    /// Whether nothing has been filed.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Health, or `None` if the pass must be rejected.
    pub fn health(&self) -> Option<PassHealth> {
        if self.fatal_errors > 0 {
            None
        } else if self.errors.is_empty() {
            Some(PassHealth::Clean)
        } else {
            Some(PassHealth::Degraded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ledger_is_clean() {
        let d = Diagnostics::default();
        assert!(d.is_empty());
        assert_eq!(d.health(), Some(PassHealth::Clean));
        assert!(d.errors_for("nope").is_empty());
    }

    #[test]
    fn test_object_errors_degrade() {
        let mut d = Diagnostics::default();
        d.record("a.yaml.1", ErrorRecord::new(Severity::Object, "need name"));
        d.record("a.yaml.1", ErrorRecord::new(Severity::Object, "again"));
        assert_eq!(d.object_errors(), 2);
        assert_eq!(d.fatal_errors(), 0);
        assert_eq!(d.errors_for("a.yaml.1").len(), 2);
        assert_eq!(d.errors_for("a.yaml.1")[1].error, "again");
        assert_eq!(d.health(), Some(PassHealth::Degraded));
    }

    #[test]
    fn test_fatal_error_rejects() {
        let mut d = Diagnostics::default();
        d.record("b.yaml.2", ErrorRecord::new(Severity::Fatal, "duplicate"));
        assert_eq!(d.fatal_errors(), 1);
        assert_eq!(d.health(), None);
    }
}
