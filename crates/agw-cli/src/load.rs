//! # Document Loading
//!
//! Turns multi-document YAML files into resources. Each document gets
//! `rkey = location = "<source>.<n>"`, with `n` counting documents from 1
//! in file order (empty documents included, so keys stay stable when a
//! document is blanked out).
//!
//! `<source>` is the file name, unless two inputs share a file name; those
//! inputs use their path as given instead, so rkeys stay unique per pass.
//!
//! Empty documents are skipped. Documents that are not mappings are
//! skipped and reported back as [`SkippedDocument`]s.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use agw_core::Resource;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A document that could not become a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDocument {
    /// Key the document would have had.
    pub rkey: String,
    /// Why it was skipped.
    pub reason: String,
}

/// Everything read from a set of inputs.
#[derive(Debug, Default)]
pub struct LoadedDocuments {
    /// Resources, in input order.
    pub resources: Vec<Resource>,
    /// Documents that were not mappings.
    pub skipped: Vec<SkippedDocument>,
}

impl LoadedDocuments {
    /// Append another load, keeping order.
    pub fn extend(&mut self, other: LoadedDocuments) {
        self.resources.extend(other.resources);
        self.skipped.extend(other.skipped);
    }
}

/// The rkey prefix for each input path.
///
/// # Errors
///
/// Fails if the same path is given twice.
pub fn source_names(paths: &[PathBuf]) -> anyhow::Result<Vec<String>> {
    let file_name = |path: &Path| {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    };

    let mut counts: HashMap<String, usize> = HashMap::new();
    for path in paths {
        *counts.entry(file_name(path)).or_default() += 1;
    }

    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(paths.len());
    for path in paths {
        let short = file_name(path);
        let name = if counts[&short] > 1 {
            path.display().to_string()
        } else {
            short
        };
        if !seen.insert(name.clone()) {
            anyhow::bail!("{} is listed more than once", path.display());
        }
        names.push(name);
    }
    Ok(names)
}

/// Load every document in one YAML file, keyed under `source_name`.
///
/// # Errors
///
/// Fails if the file cannot be read or is not valid YAML.
pub fn load_file(path: &Path, source_name: &str) -> anyhow::Result<LoadedDocuments> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    parse_documents(source_name, &content)
        .with_context(|| format!("cannot parse {}", path.display()))
}

/// Parse a multi-document YAML string into resources.
///
/// # Errors
///
/// Fails on invalid YAML or on YAML that has no JSON equivalent.
pub fn parse_documents(source_name: &str, text: &str) -> anyhow::Result<LoadedDocuments> {
    let mut loaded = LoadedDocuments::default();

    for (index, document) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let rkey = format!("{source_name}.{}", index + 1);
        let yaml = serde_yaml::Value::deserialize(document)
            .with_context(|| format!("{rkey}: invalid YAML"))?;
        let value =
            yaml_to_json_value(&yaml).map_err(|e| anyhow::anyhow!("{rkey}: {e}"))?;

        if value.is_null() {
            continue;
        }

        match Resource::from_value(rkey.clone(), rkey.clone(), value) {
            Ok(resource) => loaded.resources.push(resource),
            Err(e) => {
                tracing::warn!("{e}, skipping");
                loaded.skipped.push(SkippedDocument {
                    rkey,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(loaded)
}

/// Convert a `serde_yaml::Value` to a `serde_json::Value`.
///
/// Resource documents use only the JSON-compatible subset of YAML. Tags are
/// dropped; scalar map keys are stringified.
fn yaml_to_json_value(yaml: &serde_yaml::Value) -> Result<Value, String> {
    match yaml {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Number(serde_json::Number::from(i)))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::Number(serde_json::Number::from(u)))
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| format!("cannot represent float {f} in JSON"))
            } else {
                Err(format!("unsupported YAML number: {n:?}"))
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s.clone())),
        serde_yaml::Value::Sequence(seq) => {
            let items: Result<Vec<Value>, String> = seq.iter().map(yaml_to_json_value).collect();
            Ok(Value::Array(items?))
        }
        serde_yaml::Value::Mapping(map) => {
            let mut json_map = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    other => return Err(format!("unsupported YAML map key type: {other:?}")),
                };
                json_map.insert(key, yaml_to_json_value(v)?);
            }
            Ok(Value::Object(json_map))
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json_value(&tagged.value),
    }
}
