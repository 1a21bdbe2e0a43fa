//! The apriori manifest: module path → version → artifact locations.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::RevInfo;

/// Errors that can occur loading or serializing a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse manifest: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-version manifest entry: revision metadata plus artifact locations.
///
/// JSON field names match the files the original apriori tool wrote, so
/// previously generated manifests stay loadable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Revision descriptor, flattened into the entry.
    #[serde(flatten)]
    pub rev_info: RevInfo,

    /// Where the go.mod file was materialized.
    #[serde(rename = "GoModPath")]
    pub gomod_path: PathBuf,

    /// Where the source archive was materialized.
    #[serde(rename = "ArchivePath")]
    pub archive_path: PathBuf,
}

/// The manifest mapping accumulated over one generation run.
///
/// The single piece of cross-call mutable state in the pipeline: created
/// empty, threaded through the whole recursive walk, serialized once at the
/// end. `BTreeMap`s keep the serialized form stable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mapping(BTreeMap<String, BTreeMap<String, ModuleInfo>>);

impl Mapping {
    /// Create an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `path@version` has already been recorded.
    #[must_use]
    pub fn has(&self, path: &str, version: &str) -> bool {
        self.0
            .get(path)
            .is_some_and(|versions| versions.contains_key(version))
    }

    /// Record the entry for `path@version`.
    ///
    /// # Panics
    ///
    /// Panics if the pair is already present. Callers must check [`has`]
    /// first; re-recording means the dedup check was skipped.
    ///
    /// [`has`]: Mapping::has
    pub fn record(&mut self, path: &str, version: &str, info: ModuleInfo) {
        let previous = self
            .0
            .entry(path.to_string())
            .or_default()
            .insert(version.to_string(), info);
        assert!(
            previous.is_none(),
            "manifest entry for {path}@{version} recorded twice"
        );
    }

    /// Look up the entry for `path@version`.
    #[must_use]
    pub fn get(&self, path: &str, version: &str) -> Option<&ModuleInfo> {
        self.0.get(path).and_then(|versions| versions.get(version))
    }

    /// All recorded versions for `path`, in semver-string order as stored.
    #[must_use]
    pub fn versions(&self, path: &str) -> Option<Vec<&str>> {
        self.0
            .get(path)
            .map(|versions| versions.keys().map(String::as_str).collect())
    }

    /// Number of recorded (path, version) pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    /// Whether no pair has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialize to the pretty-printed manifest document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a previously generated manifest document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read or parsed.
    pub fn from_reader(reader: impl Read) -> Result<Self, ManifestError> {
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_info(version: &str) -> ModuleInfo {
        ModuleInfo {
            rev_info: RevInfo {
                version: version.to_string(),
                time: "2024-03-01T12:00:00Z".parse().unwrap(),
            },
            gomod_path: PathBuf::from(format!("gomod/example.com/foo/{version}.mod")),
            archive_path: PathBuf::from(format!("src/example.com/foo/{version}.zip")),
        }
    }

    #[test]
    fn test_has_and_record() {
        let mut mapping = Mapping::new();
        assert!(!mapping.has("example.com/foo", "v1.2.0"));

        mapping.record("example.com/foo", "v1.2.0", sample_info("v1.2.0"));
        assert!(mapping.has("example.com/foo", "v1.2.0"));
        assert!(!mapping.has("example.com/foo", "v1.3.0"));
        assert!(!mapping.has("example.com/bar", "v1.2.0"));
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    #[should_panic(expected = "recorded twice")]
    fn test_double_record_panics() {
        let mut mapping = Mapping::new();
        mapping.record("example.com/foo", "v1.2.0", sample_info("v1.2.0"));
        mapping.record("example.com/foo", "v1.2.0", sample_info("v1.2.0"));
    }

    #[test]
    fn test_json_shape() {
        let mut mapping = Mapping::new();
        mapping.record("example.com/foo", "v1.2.0", sample_info("v1.2.0"));

        let json: serde_json::Value = serde_json::from_str(&mapping.to_json().unwrap()).unwrap();
        let entry = &json["example.com/foo"]["v1.2.0"];
        assert_eq!(entry["Version"], "v1.2.0");
        assert_eq!(entry["GoModPath"], "gomod/example.com/foo/v1.2.0.mod");
        assert_eq!(entry["ArchivePath"], "src/example.com/foo/v1.2.0.zip");
        assert!(entry["Time"].is_string());
    }

    #[test]
    fn test_roundtrip_through_reader() {
        let mut mapping = Mapping::new();
        mapping.record("example.com/foo", "v1.2.0", sample_info("v1.2.0"));
        mapping.record("example.com/foo", "v1.3.0", sample_info("v1.3.0"));

        let json = mapping.to_json().unwrap();
        let loaded = Mapping::from_reader(json.as_bytes()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(
            loaded.get("example.com/foo", "v1.3.0"),
            mapping.get("example.com/foo", "v1.3.0")
        );
    }

    #[test]
    fn test_versions_listing() {
        let mut mapping = Mapping::new();
        mapping.record("example.com/foo", "v1.2.0", sample_info("v1.2.0"));
        mapping.record("example.com/foo", "v1.3.0", sample_info("v1.3.0"));
        assert_eq!(
            mapping.versions("example.com/foo").unwrap(),
            vec!["v1.2.0", "v1.3.0"]
        );
        assert!(mapping.versions("example.com/bar").is_none());
    }
}
