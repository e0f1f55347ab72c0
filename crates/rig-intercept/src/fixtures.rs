//! Fixture store: named datasets
//!
//! Pure data, no logic. Datasets are either structured JSON or literal text
//! (for example a line-delimited snapshot stream, which must reach the client
//! exactly as written).

use crate::error::FixtureError;
use crate::payload::{Payload, NDJSON_CONTENT_TYPE, TEXT_CONTENT_TYPE};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Named fixture datasets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixtureStore {
    datasets: BTreeMap<String, Payload>,
}

impl FixtureStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a JSON dataset, replacing any previous one
    pub fn insert_json(&mut self, name: impl Into<String>, value: Value) {
        self.datasets.insert(name.into(), Payload::Json(value));
    }

    /// Insert a text dataset, replacing any previous one
    pub fn insert_text(
        &mut self,
        name: impl Into<String>,
        body: impl Into<String>,
        content_type: impl Into<String>,
    ) {
        self.datasets.insert(
            name.into(),
            Payload::Text {
                body: body.into(),
                content_type: content_type.into(),
            },
        );
    }

    /// Look up a dataset
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Payload> {
        self.datasets.get(name)
    }

    /// Look up a dataset that must exist
    ///
    /// # Errors
    /// `FixtureError::Missing` if the dataset was never loaded
    pub fn require(&self, name: &str) -> Result<&Payload, FixtureError> {
        self.get(name)
            .ok_or_else(|| FixtureError::Missing(name.to_string()))
    }

    /// Dataset names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    /// Number of datasets
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    /// Check if store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Overlay another store; datasets in `other` win
    pub fn merge(&mut self, other: FixtureStore) {
        self.datasets.extend(other.datasets);
    }

    /// Load every regular file in a directory
    ///
    /// `*.json` files are parsed as JSON; every other file is kept as text,
    /// typed `application/x-ndjson` for `.jsonl`/`.ndjson` and `text/plain`
    /// otherwise. The dataset name is the file stem.
    ///
    /// # Errors
    /// `FixtureError::Io` or `FixtureError::Json` for the first file that
    /// cannot be read or parsed
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let dir = dir.as_ref();
        let io_err = |path: &Path, source| FixtureError::Io {
            path: path.display().to_string(),
            source,
        };

        let mut store = Self::new();
        let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| io_err(dir, e))?.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;

            match path.extension().and_then(|e| e.to_str()) {
                Some("json") => {
                    let value = serde_json::from_str(&text).map_err(|source| FixtureError::Json {
                        path: path.display().to_string(),
                        source,
                    })?;
                    store.insert_json(name, value);
                }
                Some("jsonl" | "ndjson") => store.insert_text(name, text, NDJSON_CONTENT_TYPE),
                _ => store.insert_text(name, text, TEXT_CONTENT_TYPE),
            }
            tracing::debug!(dataset = name, path = %path.display(), "loaded fixture");
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn require_reports_missing_dataset() {
        let mut store = FixtureStore::new();
        store.insert_json("meta", json!({"id": "1"}));
        assert!(store.require("meta").is_ok());
        assert!(matches!(
            store.require("events"),
            Err(FixtureError::Missing(name)) if name == "events"
        ));
    }

    #[test]
    fn load_dir_types_files_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("meta.json"), r#"{"id": "abc"}"#).unwrap();
        std::fs::write(dir.path().join("snapshots.jsonl"), "{\"a\":1}\n{\"a\":2}\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let store = FixtureStore::load_dir(dir.path()).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.get("meta"), Some(&Payload::Json(json!({"id": "abc"}))));
        assert_eq!(
            store.get("snapshots"),
            Some(&Payload::Text {
                body: "{\"a\":1}\n{\"a\":2}\n".to_string(),
                content_type: NDJSON_CONTENT_TYPE.to_string(),
            })
        );
        assert_eq!(store.get("notes").unwrap().content_type(), TEXT_CONTENT_TYPE);
    }

    #[test]
    fn load_dir_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        assert!(matches!(
            FixtureStore::load_dir(dir.path()),
            Err(FixtureError::Json { .. })
        ));
    }

    #[test]
    fn merge_overrides() {
        let mut base = FixtureStore::new();
        base.insert_json("meta", json!(1));
        let mut overlay = FixtureStore::new();
        overlay.insert_json("meta", json!(2));
        base.merge(overlay);
        assert_eq!(base.get("meta"), Some(&Payload::Json(json!(2))));
    }
}
