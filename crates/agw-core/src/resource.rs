//! # Resource: One Input Document Plus Provenance
//!
//! A `Resource` wraps a single parsed declarative document together with
//! where it came from:
//!
//! - `rkey`: unique, stable key of the originating document. Callers
//!   guarantee uniqueness across a pass.
//! - `location`: human-readable origin. Starts equal to whatever the
//!   loader supplied; a Pragma may replace it.
//! - `payload`: the document body, an ordered string-keyed mapping. It
//!   includes `apiVersion`, `kind`, and `name` when the document has them.
//! - `errors`: every error posted against this document during a pass.
//!
//! Resources are produced by an external loader already parsed. This
//! module only interprets them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ErrorRecord, ResourceError};

/// `rkey` of the synthetic source for objects the compiler creates itself.
pub const INTERNAL_RKEY: &str = "--internal--";

/// `rkey` of the synthetic source for diagnostics endpoints.
pub const DIAGNOSTICS_RKEY: &str = "--diagnostics--";

const BOOTSTRAP_API_VERSION: &str = "ambassador/v0";

/// One parsed declarative document plus provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    rkey: String,
    location: String,
    payload: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    errors: Vec<ErrorRecord>,
}

impl Resource {
    /// Create a resource from an already-parsed mapping.
    pub fn new(
        rkey: impl Into<String>,
        location: impl Into<String>,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            rkey: rkey.into(),
            location: location.into(),
            payload,
            errors: Vec::new(),
        }
    }

    /// Create a resource from an arbitrary parsed value.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::NotAMapping`] unless `document` is an object.
    pub fn from_value(
        rkey: impl Into<String>,
        location: impl Into<String>,
        document: Value,
    ) -> Result<Self, ResourceError> {
        let rkey = rkey.into();
        match document {
            Value::Object(payload) => Ok(Self::new(rkey, location, payload)),
            other => Err(ResourceError::NotAMapping {
                rkey,
                found: json_type_name(&other),
            }),
        }
    }

    /// Derive a new resource from an existing one.
    ///
    /// The derived resource keeps the provenance (`rkey`, `location`) and
    /// the identifying fields (`apiVersion`, `name`) of `source`, takes the
    /// given `kind`, and carries `fields` as the rest of its payload. The
    /// source's other payload keys are not copied.
    pub fn from_resource(source: &Resource, kind: &str, fields: &Map<String, Value>) -> Self {
        let mut payload = Map::new();
        if let Some(api_version) = source.payload.get("apiVersion") {
            payload.insert("apiVersion".to_string(), api_version.clone());
        }
        payload.insert("kind".to_string(), Value::String(kind.to_string()));
        if let Some(name) = source.payload.get("name") {
            payload.insert("name".to_string(), name.clone());
        }
        for (key, value) in fields {
            if !payload.contains_key(key) {
                payload.insert(key.clone(), value.clone());
            }
        }
        Self::new(source.rkey.clone(), source.location.clone(), payload)
    }

    /// The synthetic source for objects created by the compiler itself.
    pub fn internal() -> Self {
        Self::bootstrap(
            INTERNAL_RKEY,
            "Internal",
            "Gateway Internals",
            "The '--internal--' source marks objects created by the compiler's internal logic.",
        )
    }

    /// The synthetic source for diagnostics endpoints.
    pub fn diagnostics() -> Self {
        Self::bootstrap(
            DIAGNOSTICS_RKEY,
            "Diagnostics",
            "Gateway Diagnostics",
            "The '--diagnostics--' source marks objects created to assist with diagnostic output.",
        )
    }

    fn bootstrap(rkey: &str, kind: &str, name: &str, description: &str) -> Self {
        let mut payload = Map::new();
        payload.insert("apiVersion".into(), Value::String(BOOTSTRAP_API_VERSION.into()));
        payload.insert("kind".into(), Value::String(kind.into()));
        payload.insert("name".into(), Value::String(name.into()));
        payload.insert("description".into(), Value::String(description.into()));
        Self::new(rkey, rkey, payload)
    }

    /// Unique key of the originating document.
    pub fn rkey(&self) -> &str {
        &self.rkey
    }

    /// Human-readable origin.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Replace the human-readable origin.
    pub fn override_location(&mut self, location: impl Into<String>) {
        self.location = location.into();
    }

    /// The `apiVersion` field, if present as a string.
    pub fn api_version(&self) -> Option<&str> {
        self.str_field("apiVersion")
    }

    /// The `kind` field, if present as a string.
    pub fn kind(&self) -> Option<&str> {
        self.str_field("kind")
    }

    /// The `name` field, if present as a string.
    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.payload
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Look up a payload key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Whether the payload has the given key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.payload.contains_key(key)
    }

    /// Payload keys in document order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.payload.keys().map(String::as_str)
    }

    /// The document body.
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// The document body as a JSON value, for schema validation.
    pub fn to_value(&self) -> Value {
        Value::Object(self.payload.clone())
    }

    /// Errors posted against this document.
    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// Attach an error to this document.
    pub fn post_error(&mut self, record: ErrorRecord) {
        self.errors.push(record);
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{} {}>", self.kind().unwrap_or("?"), self.rkey)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Severity;
    use serde_json::json;

    fn mapping() -> Resource {
        Resource::from_value(
            "mappings.yaml.1",
            "mappings.yaml.1",
            json!({
                "apiVersion": "ambassador/v0",
                "kind": "Mapping",
                "name": "qotm",
                "prefix": "/qotm/",
                "service": "qotm"
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_identifying_fields() {
        let r = mapping();
        assert_eq!(r.api_version(), Some("ambassador/v0"));
        assert_eq!(r.kind(), Some("Mapping"));
        assert_eq!(r.name(), Some("qotm"));
        assert_eq!(r.rkey(), "mappings.yaml.1");
        assert_eq!(r.location(), "mappings.yaml.1");
    }

    #[test]
    fn test_payload_preserves_document_order() {
        let r = mapping();
        let keys: Vec<&str> = r.keys().collect();
        assert_eq!(keys, ["apiVersion", "kind", "name", "prefix", "service"]);
    }

    #[test]
    fn test_non_string_name_is_absent() {
        let r = Resource::from_value("r", "r", json!({"kind": "Mapping", "name": 7})).unwrap();
        assert_eq!(r.name(), None);
        assert!(r.contains_key("name"));
    }

    #[test]
    fn test_from_value_rejects_non_mapping() {
        let err = Resource::from_value("r.1", "r.1", json!(["a"])).unwrap_err();
        assert!(err.to_string().contains("array"));
        assert!(err.to_string().contains("r.1"));
    }

    #[test]
    fn test_from_resource_promotes_fields() {
        let module = Resource::from_value(
            "m.yaml.1",
            "somewhere",
            json!({
                "apiVersion": "ambassador/v0",
                "kind": "Module",
                "name": "ambassador",
                "config": {"foo": "bar"}
            }),
        )
        .unwrap();
        let config = module.get("config").and_then(Value::as_object).unwrap().clone();
        let derived = Resource::from_resource(&module, "Module", &config);
        assert_eq!(derived.get("foo"), Some(&json!("bar")));
        assert!(!derived.contains_key("config"));
        assert_eq!(derived.name(), Some("ambassador"));
        assert_eq!(derived.rkey(), "m.yaml.1");
        assert_eq!(derived.location(), "somewhere");
    }

    #[test]
    fn test_override_location() {
        let mut r = mapping();
        r.override_location("annotations on svc/qotm");
        assert_eq!(r.location(), "annotations on svc/qotm");
        assert_eq!(r.rkey(), "mappings.yaml.1");
    }

    #[test]
    fn test_post_error() {
        let mut r = mapping();
        r.post_error(ErrorRecord::new(Severity::Object, "bad"));
        assert_eq!(r.errors().len(), 1);
        assert_eq!(r.errors()[0].error, "bad");
    }

    #[test]
    fn test_bootstrap_sources() {
        let internal = Resource::internal();
        let diag = Resource::diagnostics();
        assert_eq!(internal.rkey(), INTERNAL_RKEY);
        assert_eq!(diag.rkey(), DIAGNOSTICS_RKEY);
        assert_eq!(internal.kind(), Some("Internal"));
        assert_eq!(diag.kind(), Some("Diagnostics"));
        assert_eq!(internal.to_string(), "<Internal --internal-->");
    }
}
