//! Persistence backend abstraction.
//!
//! This module defines the [`SessionBackend`] trait the session controller
//! writes through. Each method maps directly to one persistence hook the
//! controller needs; there is no query layer.

use crate::domain::error::Result;
use crate::domain::Item;
use crate::storage::models::SessionDocument;
use std::path::Path;

/// Write-through target for a labeling session.
///
/// Implementations must be idempotent (writing the same document twice leaves
/// the same state) and must fail loudly: an `Err` is returned for every write
/// that did not land, never swallowed.
///
/// # Implementations
///
/// - [`JsonFileBackend`](crate::storage::JsonFileBackend): JSON files with atomic writes
/// - [`MemoryBackend`](crate::storage::MemoryBackend): in-process maps
pub trait SessionBackend: Send {
    /// Whether a whole-session document location is configured.
    fn has_session_location(&self) -> bool;

    /// Loads the previously persisted session document, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if a document exists but cannot be read or parsed.
    fn load_session(&self) -> Result<Option<SessionDocument>>;

    /// Writes the whole-session document. A no-op without a session location.
    ///
    /// # Errors
    ///
    /// Returns [`LabelerError::Persistence`](crate::LabelerError::Persistence)
    /// if the write fails.
    fn persist_session(&mut self, document: &SessionDocument) -> Result<()>;

    /// Loads a per-item document. Unreadable documents are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns an error only if the location exists but cannot be accessed.
    fn load_item(&self, location: &Path) -> Result<Option<Item>>;

    /// Writes a single item to its own location.
    ///
    /// # Errors
    ///
    /// Returns [`LabelerError::Persistence`](crate::LabelerError::Persistence)
    /// if the write fails.
    fn persist_item(&mut self, item: &Item, location: &Path) -> Result<()>;

    /// Removes a per-item document. Missing documents are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`LabelerError::Persistence`](crate::LabelerError::Persistence)
    /// if the document exists but cannot be removed.
    fn remove_item(&mut self, location: &Path) -> Result<()>;
}
