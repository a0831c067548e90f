//! # Schema Cache
//!
//! Lazy, memoizing loader from `(version, kind)` to a compiled JSON Schema.
//!
//! ## Layout
//!
//! Schemas live at `<schema_root>/<version>/<Kind>.schema`, one JSON Schema
//! document per file. `version` is the part of a resource's `apiVersion`
//! after the namespace prefix, so `ambassador/v0` + `Mapping` resolves to
//! `<schema_root>/v0/Mapping.schema`.
//!
//! ## Outcomes of a lookup
//!
//! - File absent: no schema, validation is skipped. Nothing is cached, so a
//!   schema added to disk later in the pass is picked up.
//! - File present but unreadable, not JSON, or not a compilable schema:
//!   logged and treated as absent. A broken entry is never cached.
//! - File present and well formed: compiled and cached for the rest of the
//!   pass.
//!
//! Cross-file `$ref`s are resolved from the same version directory by file
//! name. Nothing is ever fetched over the network.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use jsonschema::{Retrieve, Uri, ValidationOptions, Validator};
use serde_json::Value;

/// Suffix of schema file names.
pub const SCHEMA_FILE_SUFFIX: &str = ".schema";

/// Identifies one schema revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaKey {
    /// Schema version, e.g. `v0`.
    pub version: String,
    /// Resource kind, case preserved, e.g. `Mapping`.
    pub kind: String,
}

impl SchemaKey {
    /// Build a key from a version and a kind.
    pub fn new(version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.version, self.kind)
    }
}

/// Resolves `$ref`s to sibling files in one version directory.
struct LocalSchemaRetriever {
    version_dir: PathBuf,
}

impl Retrieve for LocalSchemaRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let uri_str = uri.as_str();
        let filename = uri_str
            .split('#')
            .next()
            .unwrap_or(uri_str)
            .rsplit('/')
            .next()
            .unwrap_or(uri_str);

        let path = self.version_dir.join(filename);
        if path.is_file() {
            let content = std::fs::read_to_string(&path)?;
            return Ok(serde_json::from_str(&content)?);
        }

        // Metaschemas and anything not on disk: accept anything rather than
        // reach for the network.
        tracing::debug!(uri = uri_str, "unresolved schema reference, using permissive schema");
        Ok(serde_json::json!({}))
    }
}

struct CachedSchema {
    document: Value,
    validator: Validator,
}

/// Per-pass cache of compiled schemas.
pub struct SchemaCache {
    root: PathBuf,
    schemas: HashMap<SchemaKey, CachedSchema>,
}

impl SchemaCache {
    /// Create an empty cache reading from `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            schemas: HashMap::new(),
        }
    }

    /// Root directory of the schema tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the schema for `key` lives on disk.
    pub fn schema_path(&self, key: &SchemaKey) -> PathBuf {
        self.root
            .join(&key.version)
            .join(format!("{}{SCHEMA_FILE_SUFFIX}", key.kind))
    }

    /// Number of cached schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Whether `key` is cached.
    pub fn contains(&self, key: &SchemaKey) -> bool {
        self.schemas.contains_key(key)
    }

    /// Cached keys, sorted.
    pub fn keys(&self) -> Vec<&SchemaKey> {
        let mut keys: Vec<&SchemaKey> = self.schemas.keys().collect();
        keys.sort();
        keys
    }

    /// The raw schema document for a cached key.
    pub fn document(&self, key: &SchemaKey) -> Option<&Value> {
        self.schemas.get(key).map(|c| &c.document)
    }

    /// Resolve the compiled schema for `key`, loading it on first use.
    ///
    /// Returns `None` when no usable schema exists for `key`.
    pub fn resolve(&mut self, key: &SchemaKey) -> Option<&Validator> {
        if !self.schemas.contains_key(key) {
            let loaded = self.load(key)?;
            self.schemas.insert(key.clone(), loaded);
        }
        self.schemas.get(key).map(|c| &c.validator)
    }

    fn load(&self, key: &SchemaKey) -> Option<CachedSchema> {
        let path = self.schema_path(key);

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no schema, skipping");
                return None;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable schema, skipping");
                return None;
            }
        };

        let document: Value = match serde_json::from_str(&content) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt schema, skipping");
                return None;
            }
        };

        let validator = match self.build_options(key).build(&document) {
            Ok(validator) => validator,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "uncompilable schema, skipping");
                return None;
            }
        };

        tracing::debug!(schema = %key, path = %path.display(), "loaded schema");
        Some(CachedSchema {
            document,
            validator,
        })
    }

    fn build_options(&self, key: &SchemaKey) -> ValidationOptions {
        let mut opts = jsonschema::options();
        opts.with_retriever(LocalSchemaRetriever {
            version_dir: self.root.join(&key.version),
        });
        opts
    }
}

impl fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaCache")
            .field("root", &self.root)
            .field("schemas", &self.keys())
            .finish()
    }
}
