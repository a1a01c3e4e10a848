use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("descriptor is not a mapping")]
    Parse,
    #[error("descriptor has no name field")]
    MissingName,
}

/// Canonical record for one package, normalized from a raw descriptor
/// document. Dependency tokens are bare names: version qualifiers are
/// stripped during normalization and never evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    pub name: String,
    pub version: Option<String>,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub build_depends: BTreeSet<String>,
    #[serde(default)]
    pub runtime_depends: BTreeSet<String>,
    #[serde(default)]
    pub optional_depends: Vec<String>,
}

impl PackageDescriptor {
    /// Normalizes a decoded descriptor document. The document must be a
    /// mapping with a name under `name`, `package`, or `pkgname`; build
    /// dependencies live under `build.depends` (or `build.depends_on`),
    /// optional candidates under `build.optional`, runtime dependencies
    /// under `runtime.depends`.
    pub fn from_document(doc: &Value) -> Result<Self, DescriptorError> {
        let map = doc.as_object().ok_or(DescriptorError::Parse)?;

        let name = ["name", "package", "pkgname"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .filter(|value| !value.is_empty())
            .ok_or(DescriptorError::MissingName)?
            .to_string();

        let version = map
            .get("version")
            .and_then(value_as_string)
            .filter(|value| !value.is_empty());
        let origin = map
            .get("origin")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let provides = dedup_preserving_order(string_list(map.get("provides")));

        let build = map.get("build").and_then(Value::as_object);
        let build_raw = build
            .and_then(|b| b.get("depends").or_else(|| b.get("depends_on")))
            .cloned();
        let optional_raw = build.and_then(|b| b.get("optional")).cloned();
        let runtime_raw = map
            .get("runtime")
            .and_then(Value::as_object)
            .and_then(|r| r.get("depends"))
            .cloned();

        Ok(Self {
            name,
            version,
            origin,
            provides,
            build_depends: normalize_dep_list(build_raw.as_ref()).into_iter().collect(),
            runtime_depends: normalize_dep_list(runtime_raw.as_ref()).into_iter().collect(),
            optional_depends: dedup_preserving_order(normalize_dep_list(optional_raw.as_ref())),
        })
    }

    /// Union of build and runtime dependencies with the package's own name
    /// removed. This is the edge set `add_package` installs.
    pub fn dependencies(&self) -> BTreeSet<String> {
        self.build_depends
            .union(&self.runtime_depends)
            .filter(|dep| **dep != self.name)
            .cloned()
            .collect()
    }
}

/// Normalizes one raw dependency token: the substring before the first
/// whitespace, truncated at the first `>`, `<`, or `==` occurrence. A lone
/// `=` is not an operator and survives.
pub fn normalize_dep_token(token: &str) -> String {
    let head = token.split_whitespace().next().unwrap_or_default();
    let cut = [head.find('>'), head.find('<'), head.find("==")]
        .into_iter()
        .flatten()
        .min();
    match cut {
        Some(index) => head[..index].to_string(),
        None => head.to_string(),
    }
}

fn normalize_dep_list(raw: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(entries)) = raw else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for entry in entries {
        let name = match entry {
            Value::String(token) => normalize_dep_token(token),
            // A structured entry carries its name verbatim, no stripping.
            Value::Object(fields) => match fields.get("name").and_then(Value::as_str) {
                Some(name) => name.to_string(),
                None => continue,
            },
            _ => continue,
        };
        if name.is_empty() {
            debug!(token = %entry, "discarding dependency token with empty normalized name");
            continue;
        }
        out.push(name);
    }
    out
}

fn string_list(raw: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(entries)) = raw else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

fn dedup_preserving_order(entries: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    entries
        .into_iter()
        .filter(|entry| seen.insert(entry.clone()))
        .collect()
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        // Versions like `1.0` decode as numbers from YAML; keep them opaque.
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
