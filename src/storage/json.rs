//! JSON file-based persistence backend.
//!
//! Sessions are stored as one human-readable JSON document, items with their
//! own `jsonpath` as one document each. All writes are atomic
//! (write-to-temp + rename) so a crash never leaves a half-written file.
//!
//! # Performance Characteristics
//!
//! - **Read**: loads the whole document once at session construction
//! - **Write**: O(n), serializes and writes the entire session document
//! - **Best for**: collections up to tens of thousands of items

use crate::domain::error::{LabelerError, Result};
use crate::domain::Item;
use crate::storage::backend::SessionBackend;
use crate::storage::models::SessionDocument;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// JSON file persistence backend.
///
/// The session document location is optional; without one only per-item
/// documents are written.
#[derive(Debug, Clone, Default)]
pub struct JsonFileBackend {
    /// Path to the whole-session document.
    session_path: Option<PathBuf>,
}

impl JsonFileBackend {
    /// Creates a backend that persists the whole session to `session_path`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use batchlabel::storage::{JsonFileBackend, SessionBackend};
    ///
    /// let backend = JsonFileBackend::new("/tmp/session.json");
    /// let existing = backend.load_session()?;
    /// # Ok::<(), batchlabel::LabelerError>(())
    /// ```
    pub fn new(session_path: impl Into<PathBuf>) -> Self {
        Self {
            session_path: Some(session_path.into()),
        }
    }

    /// Creates a backend that only writes per-item documents.
    #[must_use]
    pub const fn items_only() -> Self {
        Self { session_path: None }
    }

    #[must_use]
    pub fn session_path(&self) -> Option<&Path> {
        self.session_path.as_deref()
    }

    /// Serializes `value` and writes it atomically to `path`.
    ///
    /// Parent directories are created as needed. The temporary file lives next
    /// to the target so the final rename never crosses filesystems.
    fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LabelerError::persistence(path, e))?;
        }

        let tmp_path = path.with_extension("json.tmp");
        tracing::trace!(tmp_path = ?tmp_path, "writing to temporary file");
        std::fs::write(&tmp_path, json).map_err(|e| LabelerError::persistence(path, e))?;

        tracing::trace!("renaming temporary file to final location");
        std::fs::rename(&tmp_path, path).map_err(|e| LabelerError::persistence(path, e))?;
        Ok(())
    }
}

impl SessionBackend for JsonFileBackend {
    fn has_session_location(&self) -> bool {
        self.session_path.is_some()
    }

    fn load_session(&self) -> Result<Option<SessionDocument>> {
        let Some(path) = &self.session_path else {
            return Ok(None);
        };
        let _span = tracing::debug_span!("json_load_session", path = ?path).entered();

        if !path.is_file() {
            tracing::debug!("no existing session document");
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path)?;
        let document: SessionDocument = serde_json::from_str(&contents)?;

        tracing::debug!(
            version = document.version,
            items = document.items.len(),
            "loaded session document"
        );
        Ok(Some(document))
    }

    fn persist_session(&mut self, document: &SessionDocument) -> Result<()> {
        let Some(path) = &self.session_path else {
            return Ok(());
        };
        let _span = tracing::debug_span!("json_persist_session",
            path = ?path,
            items = document.items.len()
        )
        .entered();

        Self::write_atomic(path, document)?;
        tracing::debug!("session document saved");
        Ok(())
    }

    fn load_item(&self, location: &Path) -> Result<Option<Item>> {
        if !location.is_file() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(location)?;
        match serde_json::from_str(&contents) {
            Ok(item) => Ok(Some(item)),
            Err(e) => {
                tracing::warn!(path = ?location, error = %e, "ignoring unreadable item document");
                Ok(None)
            }
        }
    }

    fn persist_item(&mut self, item: &Item, location: &Path) -> Result<()> {
        let _span = tracing::debug_span!("json_persist_item", path = ?location).entered();
        Self::write_atomic(location, item)
    }

    fn remove_item(&mut self, location: &Path) -> Result<()> {
        if !location.exists() {
            return Ok(());
        }
        tracing::debug!(path = ?location, "removing item document");
        std::fs::remove_file(location).map_err(|e| LabelerError::persistence(location, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use serde_json::json;

    #[test]
    fn missing_session_document_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("session.json"));
        assert!(backend.load_session().unwrap().is_none());
    }

    #[test]
    fn session_document_survives_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let mut backend = JsonFileBackend::new(&path);

        let items = vec![Item::new("a.jpg").with_labels(json!({"image": {}}))];
        let document = SessionDocument::snapshot(&items, &Config::default(), 2);
        backend.persist_session(&document).unwrap();

        let loaded = backend.load_session().unwrap().unwrap();
        assert_eq!(loaded.items, items);
        assert_eq!(loaded.batch_size, Some(2));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_session_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        let backend = JsonFileBackend::new(&path);
        assert!(matches!(backend.load_session(), Err(LabelerError::Json(_))));
    }

    #[test]
    fn corrupt_item_document_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        std::fs::write(&path, "garbage").unwrap();
        let backend = JsonFileBackend::items_only();
        assert!(backend.load_item(&path).unwrap().is_none());
    }

    #[test]
    fn item_documents_are_written_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels").join("a.json");
        let mut backend = JsonFileBackend::items_only();

        let item = Item::new("a.jpg").with_labels(json!({"image": {"kind": ["cat"]}}));
        backend.persist_item(&item, &path).unwrap();
        assert_eq!(backend.load_item(&path).unwrap(), Some(item));

        backend.remove_item(&path).unwrap();
        assert!(!path.exists());
        backend.remove_item(&path).unwrap();
    }

    #[test]
    fn items_only_backend_skips_session_writes() {
        let mut backend = JsonFileBackend::items_only();
        let document = SessionDocument::snapshot(&[], &Config::default(), 1);
        backend.persist_session(&document).unwrap();
        assert!(!backend.has_session_location());
    }
}
