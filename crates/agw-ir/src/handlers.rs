//! # Kind Handlers
//!
//! Closed set of specialized handlers, one per kind that needs more than
//! "store it under its kind". Lookup is by lowercased kind through the
//! static [`HANDLERS`] table; a kind absent from the table has no
//! specialized handler and the pipeline falls back to
//! [`Ir::save_object`](crate::Ir::save_object).
//!
//! | kind               | bucket              | stored shape                 |
//! |--------------------|---------------------|------------------------------|
//! | `Module`           | `modules`           | the `config` mapping, promoted |
//! | `RateLimitService` | `ratelimit_configs` | verbatim                     |
//! | `TracingService`   | `tracing_configs`   | verbatim                     |
//! | `AuthService`      | `auth_configs`      | verbatim                     |
//! | `Mapping`          | `mappings`          | verbatim                     |

use agw_core::Resource;
use serde_json::Value;

use crate::error::ProcessError;
use crate::ir::{Ir, MODULES_BUCKET};

/// A specialized handler for one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handler {
    /// Unwraps `config` into a synthetic resource under `modules`.
    Module,
    /// Stores under `ratelimit_configs`.
    RateLimitService,
    /// Stores under `tracing_configs`.
    TracingService,
    /// Stores under `auth_configs`.
    AuthService,
    /// Stores under `mappings`.
    Mapping,
}

/// Lowercased kind to handler.
pub const HANDLERS: &[(&str, Handler)] = &[
    ("module", Handler::Module),
    ("ratelimitservice", Handler::RateLimitService),
    ("tracingservice", Handler::TracingService),
    ("authservice", Handler::AuthService),
    ("mapping", Handler::Mapping),
];

impl Handler {
    /// The specialized handler for `kind`, if any. Case-insensitive.
    pub fn for_kind(kind: &str) -> Option<Handler> {
        let key = kind.to_ascii_lowercase();
        HANDLERS
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, handler)| *handler)
    }

    /// The bucket this handler stores into.
    pub fn bucket(self) -> &'static str {
        match self {
            Self::Module => MODULES_BUCKET,
            Self::RateLimitService => "ratelimit_configs",
            Self::TracingService => "tracing_configs",
            Self::AuthService => "auth_configs",
            Self::Mapping => "mappings",
        }
    }

    /// Store `resource` in `ir`.
    ///
    /// # Errors
    ///
    /// [`ProcessError::DuplicateName`] on a name clash within the bucket;
    /// [`ProcessError::Handler`] when a Module has no `config` mapping.
    pub fn apply(self, ir: &mut Ir, resource: &Resource) -> Result<(), ProcessError> {
        match self {
            Self::Module => {
                let config = match resource.get("config") {
                    Some(Value::Object(config)) => config,
                    Some(_) => return Err(handler_error(resource, "config is not a mapping")),
                    None => return Err(handler_error(resource, "config is missing")),
                };
                let module = Resource::from_resource(resource, "Module", config);
                ir.safe_store(self.bucket(), module)
            }
            Self::RateLimitService | Self::TracingService | Self::AuthService | Self::Mapping => {
                ir.safe_store(self.bucket(), resource.clone())
            }
        }
    }
}

fn handler_error(resource: &Resource, reason: &str) -> ProcessError {
    ProcessError::Handler {
        resource: resource.to_string(),
        kind: resource.kind().unwrap_or_default().to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::PassSettings;
    use agw_core::Severity;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_table_keys_are_unique_lowercase_and_cover_every_handler() {
        let keys: HashSet<&str> = HANDLERS.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys.len(), HANDLERS.len());
        for (key, handler) in HANDLERS {
            assert_eq!(*key, key.to_ascii_lowercase());
            assert_eq!(Handler::for_kind(key), Some(*handler));
        }
        let handlers: HashSet<Handler> = HANDLERS.iter().map(|(_, h)| *h).collect();
        for handler in [
            Handler::Module,
            Handler::RateLimitService,
            Handler::TracingService,
            Handler::AuthService,
            Handler::Mapping,
        ] {
            assert!(handlers.contains(&handler), "{handler:?} missing from table");
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(Handler::for_kind("AuthService"), Some(Handler::AuthService));
        assert_eq!(Handler::for_kind("MAPPING"), Some(Handler::Mapping));
        assert_eq!(Handler::for_kind("Widget"), None);
        assert_eq!(Handler::for_kind("Pragma"), None);
    }

    #[test]
    fn test_module_without_config_is_fatal() {
        let mut ir = Ir::new(PassSettings::new("/nonexistent"));
        let r = Resource::from_value(
            "m.yaml.1",
            "m.yaml.1",
            json!({"apiVersion": "ambassador/v0", "kind": "Module", "name": "tls"}),
        )
        .unwrap();
        let err = Handler::Module.apply(&mut ir, &r).unwrap_err();
        assert_eq!(err.severity(), Severity::Fatal);
        assert!(err.to_string().contains("config is missing"));
        assert!(ir.get_config(MODULES_BUCKET).is_none());
    }

    #[test]
    fn test_verbatim_handlers_use_fixed_buckets() {
        let mut ir = Ir::new(PassSettings::new("/nonexistent"));
        for (kind, bucket) in [
            ("RateLimitService", "ratelimit_configs"),
            ("TracingService", "tracing_configs"),
            ("AuthService", "auth_configs"),
            ("Mapping", "mappings"),
        ] {
            let r = Resource::from_value(
                format!("{kind}.yaml.1"),
                "here",
                json!({"apiVersion": "ambassador/v0", "kind": kind, "name": "x"}),
            )
            .unwrap();
            Handler::for_kind(kind).unwrap().apply(&mut ir, &r).unwrap();
            assert_eq!(ir.get_config(bucket).unwrap()["x"], r);
        }
    }
}
