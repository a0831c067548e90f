//! # Intermediate Representation
//!
//! The aggregate one compilation pass builds. It is created empty (apart
//! from the two bootstrap sources and the probe templates), filled
//! monotonically by the pipeline, and then either published whole or
//! thrown away whole.
//!
//! ## Invariants
//!
//! - Within a bucket, names are unique. A second resource with the same
//!   name is a fatal error; the first definition is never overwritten.
//! - `sources` always contains the `--internal--` and `--diagnostics--`
//!   bootstrap sources.
//! - `sources` records every processed document, including the ones that
//!   failed, so "which document" is always answerable.

use std::collections::BTreeMap;
use std::fmt;

use agw_core::{sha256_digest, CanonicalBytes, ContentDigest, DigestError, ErrorRecord, Resource};
use agw_schema::SchemaCache;
use serde::Serialize;
use serde_json::Value;

use crate::diagnostics::Diagnostics;
use crate::error::ProcessError;
use crate::settings::{PassSettings, ProbeDefaults};

/// Resources in one bucket, keyed by name.
pub type Bucket = BTreeMap<String, Resource>;

/// Bucket holding unwrapped Module configuration.
pub const MODULES_BUCKET: &str = "modules";

/// A provenance override recorded by a Pragma.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationOverride {
    /// Replacement `location` for resources with the Pragma's `rkey`.
    pub source: String,
}

/// The aggregate of one compilation pass.
#[derive(Debug)]
pub struct Ir {
    pub(crate) settings: PassSettings,
    pub(crate) config: BTreeMap<String, Bucket>,
    pub(crate) sources: BTreeMap<String, Resource>,
    pub(crate) location_overrides: BTreeMap<String, LocationOverride>,
    pub(crate) schemas: SchemaCache,
    pub(crate) defaults: ProbeDefaults,
    pub(crate) diagnostics: Diagnostics,
}

impl Ir {
    /// A fresh, empty aggregate for one pass.
    pub fn new(settings: PassSettings) -> Self {
        tracing::debug!(
            runtime = %settings.runtime,
            namespace = %settings.namespace,
            instance_id = %settings.instance_id,
            schema_root = %settings.schema_root.display(),
            "new compilation pass"
        );

        let schemas = SchemaCache::new(&settings.schema_root);
        let mut ir = Self {
            settings,
            config: BTreeMap::new(),
            sources: BTreeMap::new(),
            location_overrides: BTreeMap::new(),
            schemas,
            defaults: ProbeDefaults::default(),
            diagnostics: Diagnostics::default(),
        };
        ir.save_source(Resource::internal());
        ir.save_source(Resource::diagnostics());
        ir
    }

    /// Settings this pass runs with.
    pub fn settings(&self) -> &PassSettings {
        &self.settings
    }

    /// Probe and diagnostics route templates.
    pub fn defaults(&self) -> &ProbeDefaults {
        &self.defaults
    }

    /// Schemas loaded so far.
    pub fn schemas(&self) -> &SchemaCache {
        &self.schemas
    }

    /// The error ledger and counters.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Every bucket.
    pub fn buckets(&self) -> &BTreeMap<String, Bucket> {
        &self.config
    }

    /// Every recorded source, keyed by `rkey`.
    pub fn sources(&self) -> &BTreeMap<String, Resource> {
        &self.sources
    }

    /// Every Pragma-recorded override, keyed by `rkey`.
    pub fn location_overrides(&self) -> &BTreeMap<String, LocationOverride> {
        &self.location_overrides
    }

    /// Record a resource as a source of configuration.
    pub fn save_source(&mut self, resource: Resource) {
        self.sources.insert(resource.rkey().to_string(), resource);
    }

    /// Attach an error to a resource and to the ledger.
    ///
    /// The resource, with the error attached, replaces any earlier copy in
    /// `sources`.
    pub fn post_error(&mut self, mut resource: Resource, error: &ProcessError) {
        let record = ErrorRecord::new(error.severity(), error);
        tracing::error!(
            resource = %resource,
            location = resource.location(),
            severity = %record.severity,
            "{error}"
        );
        resource.post_error(record.clone());
        self.diagnostics.record(resource.rkey(), record);
        self.save_source(resource);
    }

    /// Store a resource in `bucket` under its name.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::DuplicateName`] if the bucket already holds
    /// that name, and [`ProcessError::MissingName`] if the resource has none.
    pub fn safe_store(&mut self, bucket: &str, resource: Resource) -> Result<(), ProcessError> {
        let name = resource.name().ok_or(ProcessError::MissingName)?.to_string();
        let storage = self.config.entry(bucket.to_string()).or_default();

        if storage.contains_key(&name) {
            return Err(ProcessError::DuplicateName {
                resource: resource.to_string(),
                kind: resource.kind().unwrap_or_default().to_string(),
                name,
                bucket: bucket.to_string(),
            });
        }

        tracing::debug!(resource = %resource, bucket, name = %name, "saving");
        storage.insert(name, resource);
        Ok(())
    }

    /// Store a resource in the bucket named after its own kind.
    ///
    /// # Errors
    ///
    /// As [`safe_store`](Self::safe_store); also [`ProcessError::MissingKind`].
    pub fn save_object(&mut self, resource: Resource) -> Result<(), ProcessError> {
        let bucket = resource.kind().ok_or(ProcessError::MissingKind)?.to_string();
        self.safe_store(&bucket, resource)
    }

    /// A whole bucket.
    pub fn get_config(&self, bucket: &str) -> Option<&Bucket> {
        self.config.get(bucket)
    }

    /// Resources of a bucket in name order. Empty if the bucket is absent.
    pub fn each(&self, bucket: &str) -> impl Iterator<Item = &Resource> {
        self.config.get(bucket).into_iter().flat_map(|b| b.values())
    }

    /// A named module.
    pub fn get_module(&self, name: &str) -> Option<&Resource> {
        self.get_config(MODULES_BUCKET)?.get(name)
    }

    /// One key of a named module, or `default` if the module or the key is
    /// absent.
    pub fn module_lookup<'a>(&'a self, module: &str, key: &str, default: &'a Value) -> &'a Value {
        self.get_module(module)
            .and_then(|m| m.get(key))
            .unwrap_or(default)
    }

    /// Serializable view for downstream consumers.
    pub fn snapshot(&self) -> IrSnapshot<'_> {
        IrSnapshot {
            config: &self.config,
            sources: &self.sources,
            errors: self.diagnostics.errors(),
            fatal_errors: self.diagnostics.fatal_errors(),
            object_errors: self.diagnostics.object_errors(),
        }
    }
}

impl fmt::Display for Ir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<Config:")?;
        for (bucket, resources) in &self.config {
            writeln!(f, "  {bucket}:")?;
            for resource in resources.values() {
                writeln!(f, "    {resource}")?;
            }
        }
        write!(f, ">")
    }
}

/// What the downstream generator consumes.
#[derive(Debug, Serialize)]
pub struct IrSnapshot<'a> {
    /// Buckets of stored resources.
    pub config: &'a BTreeMap<String, Bucket>,
    /// Provenance ledger.
    pub sources: &'a BTreeMap<String, Resource>,
    /// Error ledger keyed by `rkey`.
    pub errors: &'a BTreeMap<String, Vec<ErrorRecord>>,
    /// Number of fatal errors.
    pub fatal_errors: usize,
    /// Number of resource-scoped errors.
    pub object_errors: usize,
}

impl IrSnapshot<'_> {
    /// SHA-256 over the canonical JSON of the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError`] if the snapshot cannot be serialized.
    pub fn digest(&self) -> Result<ContentDigest, DigestError> {
        Ok(sha256_digest(&CanonicalBytes::new(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agw_core::{Severity, DIAGNOSTICS_RKEY, INTERNAL_RKEY};
    use serde_json::json;

    fn ir() -> Ir {
        Ir::new(PassSettings::new("/nonexistent"))
    }

    fn resource(rkey: &str, doc: Value) -> Resource {
        Resource::from_value(rkey, rkey, doc).unwrap()
    }

    #[test]
    fn test_new_has_bootstrap_sources() {
        let ir = ir();
        assert_eq!(ir.sources().len(), 2);
        assert!(ir.sources().contains_key(INTERNAL_RKEY));
        assert!(ir.sources().contains_key(DIAGNOSTICS_RKEY));
        assert!(ir.buckets().is_empty());
        assert!(ir.defaults().readiness.enabled);
    }

    #[test]
    fn test_safe_store_rejects_duplicate_name() {
        let mut ir = ir();
        let first = resource("a.yaml.1", json!({"kind": "Mapping", "name": "qotm", "n": 1}));
        let second = resource("b.yaml.1", json!({"kind": "Mapping", "name": "qotm", "n": 2}));
        ir.safe_store("mappings", first).unwrap();
        let err = ir.safe_store("mappings", second).unwrap_err();
        assert_eq!(err.severity(), Severity::Fatal);
        // The first definition survives.
        let stored = &ir.get_config("mappings").unwrap()["qotm"];
        assert_eq!(stored.get("n"), Some(&json!(1)));
    }

    #[test]
    fn test_same_name_in_different_buckets() {
        let mut ir = ir();
        ir.save_object(resource("a.yaml.1", json!({"kind": "Foo", "name": "x"})))
            .unwrap();
        ir.save_object(resource("a.yaml.2", json!({"kind": "Bar", "name": "x"})))
            .unwrap();
        assert_eq!(ir.get_config("Foo").unwrap().len(), 1);
        assert_eq!(ir.get_config("Bar").unwrap().len(), 1);
    }

    #[test]
    fn test_module_lookup_defaults() {
        let mut ir = ir();
        let module = resource(
            "m.yaml.1",
            json!({"kind": "Module", "name": "tls", "enabled": true}),
        );
        ir.safe_store(MODULES_BUCKET, module).unwrap();

        let fallback = json!("fallback");
        assert_eq!(ir.module_lookup("tls", "enabled", &fallback), &json!(true));
        assert_eq!(ir.module_lookup("tls", "missing", &fallback), &fallback);
        assert_eq!(ir.module_lookup("nope", "enabled", &fallback), &fallback);
        assert!(ir.get_module("nope").is_none());
    }

    #[test]
    fn test_each_iterates_in_name_order() {
        let mut ir = ir();
        for name in ["c", "a", "b"] {
            ir.save_object(resource(
                &format!("{name}.yaml.1"),
                json!({"kind": "Thing", "name": name}),
            ))
            .unwrap();
        }
        let names: Vec<&str> = ir.each("Thing").filter_map(Resource::name).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(ir.each("Absent").count(), 0);
    }

    #[test]
    fn test_post_error_attaches_everywhere() {
        let mut ir = ir();
        let r = resource("bad.yaml.1", json!({"kind": "Mapping"}));
        ir.post_error(r, &ProcessError::MissingName);

        let source = &ir.sources()["bad.yaml.1"];
        assert_eq!(source.errors().len(), 1);
        assert_eq!(source.errors()[0].error, "need name");
        assert_eq!(ir.diagnostics().errors_for("bad.yaml.1").len(), 1);
        assert_eq!(ir.diagnostics().object_errors(), 1);
    }

    #[test]
    fn test_display_lists_buckets() {
        let mut ir = ir();
        ir.safe_store("mappings", resource("a.yaml.1", json!({"kind": "Mapping", "name": "q"})))
            .unwrap();
        assert_eq!(ir.to_string(), "<Config:\n  mappings:\n    <Mapping a.yaml.1>\n>");
    }

    #[test]
    fn test_snapshot_digest_is_stable() {
        let a = ir();
        let b = ir();
        assert_eq!(
            a.snapshot().digest().unwrap(),
            b.snapshot().digest().unwrap()
        );
    }
}
