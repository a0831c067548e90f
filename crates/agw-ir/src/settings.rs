//! # Pass Settings
//!
//! Everything a compilation pass needs to know about its environment,
//! built once per pass and threaded through explicitly. Nothing here is a
//! process-wide mutable global.

use std::path::{Path, PathBuf};

use agw_core::InstanceId;
use serde::{Deserialize, Serialize};

/// Environment variable naming this instance's ownership identity.
pub const ENV_INSTANCE_ID: &str = "AMBASSADOR_ID";

/// Environment variable naming the namespace this instance runs in.
pub const ENV_NAMESPACE: &str = "AMBASSADOR_NAMESPACE";

/// Set when running inside a Kubernetes cluster.
pub const ENV_KUBERNETES_HOST: &str = "KUBERNETES_SERVICE_HOST";

const DEFAULT_NAMESPACE: &str = "default";

/// When Pragma overrides take effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PragmaOrdering {
    /// A Pragma only affects resources that come after it in the input.
    #[default]
    InputOrder,
    /// All Pragmas are applied before any other resource is processed.
    Hoisted,
}

/// Where the gateway is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    /// Inside a Kubernetes cluster.
    Kubernetes,
    /// Anywhere else.
    Docker,
}

impl std::fmt::Display for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kubernetes => f.write_str("kubernetes"),
            Self::Docker => f.write_str("docker"),
        }
    }
}

/// Configuration for one compilation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSettings {
    /// Ownership identity; resources owned by other identities are skipped.
    pub instance_id: InstanceId,
    /// Root of the `<version>/<Kind>.schema` tree.
    pub schema_root: PathBuf,
    /// When Pragma overrides take effect.
    pub pragma_ordering: PragmaOrdering,
    /// Namespace the gateway runs in.
    pub namespace: String,
    /// Where the gateway is running.
    pub runtime: Runtime,
}

impl PassSettings {
    /// Default settings reading schemas from `schema_root`.
    pub fn new(schema_root: impl AsRef<Path>) -> Self {
        Self {
            instance_id: InstanceId::default(),
            schema_root: schema_root.as_ref().to_path_buf(),
            pragma_ordering: PragmaOrdering::default(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            runtime: Runtime::Docker,
        }
    }

    /// Settings from the process environment.
    pub fn from_env(schema_root: impl AsRef<Path>) -> Self {
        Self::from_lookup(schema_root, |name| std::env::var(name).ok())
    }

    /// Settings from an arbitrary variable lookup.
    pub fn from_lookup(
        schema_root: impl AsRef<Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut settings = Self::new(schema_root);
        if let Some(id) = lookup(ENV_INSTANCE_ID).filter(|v| !v.is_empty()) {
            settings.instance_id = InstanceId::new(id);
        }
        if let Some(ns) = lookup(ENV_NAMESPACE).filter(|v| !v.is_empty()) {
            settings.namespace = ns;
        }
        if lookup(ENV_KUBERNETES_HOST).is_some_and(|v| !v.is_empty()) {
            settings.runtime = Runtime::Kubernetes;
        }
        settings
    }

    /// Replace the ownership identity.
    pub fn with_instance_id(mut self, id: InstanceId) -> Self {
        self.instance_id = id;
        self
    }

    /// Replace the Pragma ordering.
    pub fn with_pragma_ordering(mut self, ordering: PragmaOrdering) -> Self {
        self.pragma_ordering = ordering;
        self
    }
}

/// Template for a probe or diagnostics route.
///
/// The downstream generator completes it with a service reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTemplate {
    /// Whether the route is generated at all.
    pub enabled: bool,
    /// Path prefix matched on incoming requests.
    pub prefix: String,
    /// Path the prefix is rewritten to.
    pub rewrite: String,
}

impl ProbeTemplate {
    fn enabled_at(path: &str) -> Self {
        Self {
            enabled: true,
            prefix: path.to_string(),
            rewrite: path.to_string(),
        }
    }
}

/// Built-in liveness, readiness, and diagnostics route templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeDefaults {
    /// Liveness probe route.
    pub liveness: ProbeTemplate,
    /// Readiness probe route.
    pub readiness: ProbeTemplate,
    /// Diagnostics UI route.
    pub diagnostics: ProbeTemplate,
}

impl Default for ProbeDefaults {
    fn default() -> Self {
        Self {
            liveness: ProbeTemplate::enabled_at("/ambassador/v0/check_alive"),
            readiness: ProbeTemplate::enabled_at("/ambassador/v0/check_ready"),
            diagnostics: ProbeTemplate::enabled_at("/ambassador/v0/"),
        }
    }
}
