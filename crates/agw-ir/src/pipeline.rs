//! # Ingestion Pipeline
//!
//! Drives one pass over an ordered sequence of resources:
//!
//! ```text
//! for each resource:
//!     apply location override (if a Pragma recorded one for this rkey)
//!     ownership filter ──▶ skip silently if not ours
//!     process ──▶ Pragma?  record override, done
//!             ──▶ save source, validate, dispatch by kind, store
//!     on failure: post error (resource + ledger)
//! after the sequence:
//!     any fatal error ──▶ PassError::Rejected
//!     any error       ──▶ PassHealth::Degraded
//!     otherwise       ──▶ PassHealth::Clean
//! ```
//!
//! Fatal errors do not stop the loop. The rest of the input is still
//! consumed so the ledger names every broken document, and the pass is
//! rejected at the end.

use agw_core::{Ownership, Resource};
use agw_schema::validate_resource;
use serde_json::Value;

use crate::diagnostics::PassHealth;
use crate::error::{PassError, ProcessError};
use crate::handlers::Handler;
use crate::ir::{Ir, LocationOverride};
use crate::settings::PragmaOrdering;

/// Kind of directive resources that rewrite provenance.
pub const PRAGMA_KIND: &str = "Pragma";

impl Ir {
    /// Load and process every resource, in order.
    ///
    /// It is the caller's responsibility to order the input sensibly; with
    /// [`PragmaOrdering::InputOrder`] a Pragma only affects resources that
    /// come after it.
    ///
    /// # Errors
    ///
    /// Returns [`PassError::Rejected`] if any fatal error occurred. The
    /// aggregate must then not be published.
    pub fn load_all<I>(&mut self, resources: I) -> Result<PassHealth, PassError>
    where
        I: IntoIterator<Item = Resource>,
    {
        let resources: Vec<Resource> = resources.into_iter().collect();
        let hoisted = self.settings.pragma_ordering == PragmaOrdering::Hoisted;

        if hoisted {
            for resource in resources.iter().filter(|r| is_pragma(r)) {
                self.load_one(resource.clone());
            }
        }

        for resource in resources {
            if hoisted && is_pragma(&resource) {
                continue;
            }
            self.load_one(resource);
        }

        self.finish()
    }

    fn load_one(&mut self, mut resource: Resource) {
        if let Some(location) = self
            .location_overrides
            .get(resource.rkey())
            .map(|o| o.source.clone())
        {
            resource.override_location(location);
        }

        let ownership = Ownership::of(&resource);
        if !ownership.admits(&self.settings.instance_id) {
            tracing::debug!(
                resource = %resource,
                instance_id = %self.settings.instance_id,
                allowed = %ownership,
                "skipping, not ours"
            );
            return;
        }

        tracing::debug!(resource = %resource, location = resource.location(), "loading");

        if let Err(e) = self.process(&resource) {
            self.post_error(resource, &e);
        }
    }

    fn finish(&self) -> Result<PassHealth, PassError> {
        match self.diagnostics.health() {
            None => Err(PassError::Rejected {
                fatal_errors: self.diagnostics.fatal_errors(),
                object_errors: self.diagnostics.object_errors(),
            }),
            Some(PassHealth::Degraded) => {
                tracing::error!(
                    object_errors = self.diagnostics.object_errors(),
                    "starting with configuration errors"
                );
                Ok(PassHealth::Degraded)
            }
            Some(PassHealth::Clean) => Ok(PassHealth::Clean),
        }
    }

    /// Process a single resource.
    ///
    /// # Errors
    ///
    /// Any [`ProcessError`]; its severity decides what it means for the
    /// pass. The caller is responsible for posting it.
    pub fn process(&mut self, resource: &Resource) -> Result<(), ProcessError> {
        if resource.api_version().is_none() {
            return Err(ProcessError::MissingApiVersion);
        }
        let Some(kind) = resource.kind() else {
            return Err(ProcessError::MissingKind);
        };

        if kind == PRAGMA_KIND {
            self.handle_pragma(resource);
            return Ok(());
        }

        if resource.name().is_none() {
            return Err(ProcessError::MissingName);
        }

        // Recorded before validation so a rejected document stays traceable.
        self.save_source(resource.clone());

        validate_resource(&mut self.schemas, resource)?;

        match Handler::for_kind(kind) {
            Some(handler) => {
                tracing::debug!(resource = %resource, ?handler, "handling");
                handler.apply(self, resource)
            }
            None => {
                tracing::warn!(resource = %resource, kind, "no handler, just saving");
                self.save_object(resource.clone())
            }
        }
    }

    /// Record the provenance override carried by a Pragma.
    ///
    /// Only `source` has an effect; other keys are logged.
    pub fn handle_pragma(&mut self, resource: &Resource) {
        let rkey = resource.rkey();
        let mut keys: Vec<&str> = resource
            .keys()
            .filter(|k| *k != "apiVersion" && *k != "kind")
            .collect();
        keys.sort_unstable();

        tracing::debug!(rkey, ?keys, "pragma");

        if let Some(source) = resource.get("source") {
            let source = match source {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            tracing::debug!(rkey, source = %source, "pragma: override location");
            self.location_overrides
                .insert(rkey.to_string(), LocationOverride { source });
        }
    }
}

fn is_pragma(resource: &Resource) -> bool {
    resource.kind() == Some(PRAGMA_KIND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::PassSettings;
    use agw_core::{InstanceId, Severity};
    use serde_json::json;

    fn ir() -> Ir {
        Ir::new(PassSettings::new("/nonexistent"))
    }

    fn resource(rkey: &str, doc: serde_json::Value) -> Resource {
        Resource::from_value(rkey, rkey, doc).unwrap()
    }

    #[test]
    fn test_missing_api_version() {
        let mut ir = ir();
        let r = resource("a.1", json!({"kind": "Mapping", "name": "m"}));
        assert!(matches!(ir.process(&r), Err(ProcessError::MissingApiVersion)));
    }

    #[test]
    fn test_missing_kind() {
        let mut ir = ir();
        let r = resource("a.1", json!({"apiVersion": "ambassador/v0", "name": "m"}));
        assert!(matches!(ir.process(&r), Err(ProcessError::MissingKind)));
    }

    #[test]
    fn test_missing_name_is_not_stored() {
        let mut ir = ir();
        let r = resource("a.1", json!({"apiVersion": "ambassador/v0", "kind": "Mapping"}));
        ir.load_all([r]).unwrap();
        assert!(ir.sources().contains_key("a.1"));
        assert!(ir.buckets().is_empty());
        assert_eq!(ir.diagnostics().errors_for("a.1")[0].error, "need name");
    }

    #[test]
    fn test_pragma_is_not_stored_and_needs_no_name() {
        let mut ir = ir();
        let p = resource(
            "a.1",
            json!({"apiVersion": "ambassador/v0", "kind": "Pragma", "source": "foo", "other": 1}),
        );
        ir.process(&p).unwrap();
        assert!(ir.buckets().is_empty());
        assert!(!ir.sources().contains_key("a.1"));
        assert_eq!(ir.location_overrides()["a.1"].source, "foo");
    }

    #[test]
    fn test_pragma_without_source_records_nothing() {
        let mut ir = ir();
        let p = resource("a.1", json!({"apiVersion": "ambassador/v0", "kind": "Pragma"}));
        ir.process(&p).unwrap();
        assert!(ir.location_overrides().is_empty());
    }

    #[test]
    fn test_pragma_overrides_later_resource() {
        let mut ir = ir();
        let pragma = resource(
            "R",
            json!({"apiVersion": "ambassador/v0", "kind": "Pragma", "source": "foo"}),
        );
        let mapping = resource(
            "R",
            json!({"apiVersion": "ambassador/v0", "kind": "Mapping", "name": "m"}),
        );
        ir.load_all([pragma, mapping]).unwrap();
        assert_eq!(ir.get_config("mappings").unwrap()["m"].location(), "foo");
        assert_eq!(ir.sources()["R"].location(), "foo");
    }

    #[test]
    fn test_pragma_after_resource_needs_hoisting() {
        let docs = || {
            [
                resource(
                    "R",
                    json!({"apiVersion": "ambassador/v0", "kind": "Mapping", "name": "m"}),
                ),
                resource(
                    "R",
                    json!({"apiVersion": "ambassador/v0", "kind": "Pragma", "source": "foo"}),
                ),
            ]
        };

        let mut in_order = ir();
        in_order.load_all(docs()).unwrap();
        assert_eq!(in_order.get_config("mappings").unwrap()["m"].location(), "R");

        let mut hoisted = Ir::new(
            PassSettings::new("/nonexistent").with_pragma_ordering(PragmaOrdering::Hoisted),
        );
        hoisted.load_all(docs()).unwrap();
        assert_eq!(hoisted.get_config("mappings").unwrap()["m"].location(), "foo");
    }

    #[test]
    fn test_foreign_resource_is_invisible_and_batch_continues() {
        let mut ir = ir();
        let foreign = resource(
            "a.1",
            json!({"apiVersion": "ambassador/v0", "kind": "Mapping", "name": "x", "ambassador_id": "other"}),
        );
        let ours = resource(
            "a.2",
            json!({"apiVersion": "ambassador/v0", "kind": "Mapping", "name": "y"}),
        );
        assert_eq!(ir.load_all([foreign, ours]).unwrap(), PassHealth::Clean);
        assert!(!ir.sources().contains_key("a.1"));
        assert!(ir.sources().contains_key("a.2"));
        let mappings = ir.get_config("mappings").unwrap();
        assert!(!mappings.contains_key("x"));
        assert!(mappings.contains_key("y"));
        assert!(ir.diagnostics().is_empty());
    }

    #[test]
    fn test_configured_identity_selects_resources() {
        let settings =
            PassSettings::new("/nonexistent").with_instance_id(InstanceId::new("canary"));
        let mut ir = Ir::new(settings);
        let default_owned = resource(
            "a.1",
            json!({"apiVersion": "ambassador/v0", "kind": "Mapping", "name": "x"}),
        );
        let canary_owned = resource(
            "a.2",
            json!({"apiVersion": "ambassador/v0", "kind": "Mapping", "name": "y", "ambassador_id": ["canary", "blue"]}),
        );
        ir.load_all([default_owned, canary_owned]).unwrap();
        let names: Vec<&str> = ir.each("mappings").filter_map(Resource::name).collect();
        assert_eq!(names, ["y"]);
    }

    #[test]
    fn test_unknown_kind_falls_back_to_kind_bucket() {
        let mut ir = ir();
        let r = resource(
            "a.1",
            json!({"apiVersion": "ambassador/v0", "kind": "Widget", "name": "w"}),
        );
        ir.load_all([r]).unwrap();
        assert!(ir.get_config("Widget").unwrap().contains_key("w"));
    }

    #[test]
    fn test_duplicate_rejects_pass_but_drains_input() {
        let mut ir = ir();
        let docs = [
            resource("a.1", json!({"apiVersion": "ambassador/v0", "kind": "Mapping", "name": "m"})),
            resource("a.2", json!({"apiVersion": "ambassador/v0", "kind": "Mapping", "name": "m"})),
            resource("a.3", json!({"apiVersion": "ambassador/v0", "kind": "Mapping"})),
        ];
        let err = ir.load_all(docs).unwrap_err();
        assert!(matches!(
            err,
            PassError::Rejected {
                fatal_errors: 1,
                object_errors: 1
            }
        ));
        assert_eq!(ir.diagnostics().errors_for("a.2")[0].severity, Severity::Fatal);
        assert_eq!(ir.diagnostics().errors_for("a.3")[0].severity, Severity::Object);
    }

    #[test]
    fn test_unsupported_api_version_is_recoverable() {
        let mut ir = ir();
        let r = resource(
            "a.1",
            json!({"apiVersion": "example.com/v1", "kind": "Mapping", "name": "m"}),
        );
        assert_eq!(ir.load_all([r]).unwrap(), PassHealth::Degraded);
        assert_eq!(
            ir.diagnostics().errors_for("a.1")[0].error,
            "apiVersion example.com/v1 unsupported"
        );
        assert!(ir.sources().contains_key("a.1"));
        assert!(ir.get_config("mappings").is_none());
    }
}
