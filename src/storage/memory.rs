//! In-process persistence backend.
//!
//! Keeps the session document and per-item documents in memory. Useful when
//! the embedding application reads labels straight from the session, and for
//! exercising write-through failure paths.

use crate::domain::error::{LabelerError, Result};
use crate::domain::Item;
use crate::storage::backend::SessionBackend;
use crate::storage::models::SessionDocument;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Memory-backed [`SessionBackend`].
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    session_enabled: bool,
    session: Option<SessionDocument>,
    items: HashMap<PathBuf, Item>,
    fail_writes: bool,
    session_writes: usize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Creates a backend with a (memory) session document location.
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_enabled: true,
            session: None,
            items: HashMap::new(),
            fail_writes: false,
            session_writes: 0,
        }
    }

    /// Creates a backend that only stores per-item documents.
    #[must_use]
    pub fn items_only() -> Self {
        Self {
            session_enabled: false,
            ..Self::new()
        }
    }

    /// Seeds a previously persisted session document.
    #[must_use]
    pub fn with_session(mut self, document: SessionDocument) -> Self {
        self.session = Some(document);
        self
    }

    /// Seeds a previously persisted per-item document.
    #[must_use]
    pub fn with_item(mut self, location: impl Into<PathBuf>, item: Item) -> Self {
        self.items.insert(location.into(), item);
        self
    }

    /// Makes every subsequent write fail with a persistence error.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    #[must_use]
    pub const fn session(&self) -> Option<&SessionDocument> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn item(&self, location: &Path) -> Option<&Item> {
        self.items.get(location)
    }

    /// Number of successful whole-session writes.
    #[must_use]
    pub const fn session_writes(&self) -> usize {
        self.session_writes
    }

    fn check_writable(&self, location: &Path) -> Result<()> {
        if self.fail_writes {
            return Err(LabelerError::persistence(
                location,
                std::io::Error::new(std::io::ErrorKind::Other, "writes disabled"),
            ));
        }
        Ok(())
    }
}

impl SessionBackend for MemoryBackend {
    fn has_session_location(&self) -> bool {
        self.session_enabled
    }

    fn load_session(&self) -> Result<Option<SessionDocument>> {
        Ok(self.session.clone())
    }

    fn persist_session(&mut self, document: &SessionDocument) -> Result<()> {
        if !self.session_enabled {
            return Ok(());
        }
        self.check_writable(Path::new("<memory session>"))?;
        self.session = Some(document.clone());
        self.session_writes += 1;
        Ok(())
    }

    fn load_item(&self, location: &Path) -> Result<Option<Item>> {
        Ok(self.items.get(location).cloned())
    }

    fn persist_item(&mut self, item: &Item, location: &Path) -> Result<()> {
        self.check_writable(location)?;
        self.items.insert(location.to_path_buf(), item.clone());
        Ok(())
    }

    fn remove_item(&mut self, location: &Path) -> Result<()> {
        self.check_writable(location)?;
        self.items.remove(location);
        Ok(())
    }
}
