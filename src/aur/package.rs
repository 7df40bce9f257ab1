// src/aur/package.rs

//! Package records decoded from RPC responses

use chrono::DateTime;
use serde_json::{Map, Value};
use tracing::debug;

/// Name suffixes marking a VCS package
pub const VCS_SUFFIXES: &[&str] = &["-git", "-svn", "-hg", "-bzr", "-cvs", "-darcs"];

/// Version shown for VCS packages, whose real version is only known after a build
pub const VCS_VERSION: &str = "latest (vcs version)";

/// Is `name` a VCS package?
pub fn is_vcs(name: &str) -> bool {
    VCS_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Keep printable ASCII only
///
/// Dropped characters are logged at debug level with both lengths; this
/// never fails.
pub fn printable(value: &str, field: &str) -> String {
    let filtered: String = value.chars().filter(|c| (' '..='~').contains(c)).collect();
    if filtered.len() != value.len() {
        debug!(
            "non-printable characters dropped from {} ({} -> {} bytes)",
            field,
            value.len(),
            filtered.len()
        );
    }
    filtered
}

/// String value of `key`, filtered; null or missing is empty
pub fn field_str(result: &Map<String, Value>, key: &str) -> String {
    match result.get(key) {
        Some(Value::String(s)) => printable(s, key),
        Some(Value::Null) | None => String::new(),
        Some(other) => printable(&other.to_string(), key),
    }
}

fn field_list(result: &Map<String, Value>, key: &str) -> Vec<String> {
    match result.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| printable(s, key))
            .collect(),
        _ => Vec::new(),
    }
}

/// A package found in the AUR
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemotePackage {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Base recipe this package is built from
    pub package_base: String,
    /// Snapshot archive path relative to the AUR root
    pub url_path: String,
    pub depends: Vec<String>,
    pub make_depends: Vec<String>,
}

impl RemotePackage {
    /// Decode one `results` entry
    pub fn from_result(result: &Map<String, Value>) -> Self {
        Self {
            name: field_str(result, "Name"),
            version: field_str(result, "Version"),
            description: field_str(result, "Description"),
            package_base: field_str(result, "PackageBase"),
            url_path: field_str(result, "URLPath"),
            depends: field_list(result, "Depends"),
            make_depends: field_list(result, "MakeDepends"),
        }
    }

    /// Raw dependency strings, optionally including make dependencies
    pub fn dependencies(&self, include_make: bool) -> Vec<String> {
        let mut deps = self.depends.clone();
        if include_make {
            deps.extend(self.make_depends.iter().cloned());
        }
        deps
    }

    pub fn is_vcs(&self) -> bool {
        is_vcs(&self.name)
    }

    /// Version to show the operator
    pub fn display_version(&self) -> &str {
        if self.is_vcs() { VCS_VERSION } else { &self.version }
    }
}

/// A fuzzy search hit, with every field kept for `--info` output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRecord {
    pub name: String,
    pub version: String,
    pub description: String,
    /// (key, rendered value) for every field, sorted by key
    pub fields: Vec<(String, String)>,
}

/// Fields holding UNIX timestamps
const TIMESTAMP_FIELDS: &[&str] = &["FirstSubmitted", "LastModified", "OutOfDate"];

impl SummaryRecord {
    pub fn from_result(result: &Map<String, Value>) -> Self {
        let fields = result
            .iter()
            .map(|(key, value)| (key.clone(), render_field(key, value)))
            .collect();

        Self {
            name: field_str(result, "Name"),
            version: field_str(result, "Version"),
            description: field_str(result, "Description"),
            fields,
        }
    }
}

fn render_field(key: &str, value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => printable(s, key),
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => printable(s, key),
                other => printable(&other.to_string(), key),
            })
            .collect::<Vec<_>>()
            .join("  "),
        Value::Number(n) if TIMESTAMP_FIELDS.contains(&key) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| n.to_string()),
        other => printable(&other.to_string(), key),
    }
}
