//! Canonical item collection.
//!
//! [`ItemStore`] exclusively owns the items of a session and is the only place
//! `labels` and `ignored` are mutated. Mutators are idempotent: setting a value
//! equal to the current one changes nothing and schedules no write.
//!
//! Every effective change schedules a write-through for the item's own
//! `jsonpath` (if any) and marks the whole-session document dirty. Pending
//! writes are performed by [`ItemStore::flush`].

use crate::domain::error::{LabelerError, Result};
use crate::domain::Item;
use crate::storage::backend::SessionBackend;
use crate::storage::models::SessionDocument;
use serde_json::Value;
use std::collections::BTreeMap;

/// Pending write-through for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteThrough {
    /// Write the item document.
    Write,
    /// Remove the item document (labels were deleted).
    Remove,
}

/// Owner of the session's items.
#[derive(Debug, Clone, Default)]
pub struct ItemStore {
    items: Vec<Item>,
    pending: BTreeMap<usize, WriteThrough>,
    dirty: bool,
    revision: u64,
}

impl ItemStore {
    #[must_use]
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items,
            pending: BTreeMap::new(),
            dirty: false,
            revision: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&Item> {
        self.items.get(idx)
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Consumes the store, returning the items.
    #[must_use]
    pub fn into_items(self) -> Vec<Item> {
        self.items
    }

    /// Whether the whole-session document needs writing.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Counter bumped by every effective mutation.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of items with a pending per-item write or removal.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Sets the labels of an item. Returns whether anything changed.
    pub fn set_labels(&mut self, idx: usize, payload: Value) -> bool {
        let Some(item) = self.items.get_mut(idx) else {
            return false;
        };
        if item.labels.as_ref() == Some(&payload) {
            return false;
        }
        item.labels = Some(payload);
        self.schedule(idx, WriteThrough::Write);
        true
    }

    /// Removes the labels of an item. Returns whether anything changed.
    pub fn clear_labels(&mut self, idx: usize) -> bool {
        let Some(item) = self.items.get_mut(idx) else {
            return false;
        };
        if item.labels.take().is_none() {
            return false;
        }
        self.schedule(idx, WriteThrough::Remove);
        true
    }

    /// Sets or clears the ignore flag. Returns whether anything changed.
    pub fn set_ignored(&mut self, idx: usize, ignored: bool) -> bool {
        let Some(item) = self.items.get_mut(idx) else {
            return false;
        };
        if item.is_ignored() == ignored {
            return false;
        }
        item.ignored = Some(ignored);
        self.schedule(idx, WriteThrough::Write);
        true
    }

    /// Number of labeled or ignored items.
    #[must_use]
    pub fn done_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_done()).count()
    }

    /// Percentage of labeled or ignored items, `0.0..=100.0`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.items.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.done_count() as f64 / self.items.len() as f64;
        100.0 * ratio
    }

    /// Records a write-through. A later write supersedes an earlier removal,
    /// a removal never downgrades a pending write.
    fn schedule(&mut self, idx: usize, write: WriteThrough) {
        self.dirty = true;
        self.revision += 1;
        if self.items[idx].jsonpath.is_none() {
            return;
        }
        match write {
            WriteThrough::Write => {
                self.pending.insert(idx, WriteThrough::Write);
            }
            WriteThrough::Remove => {
                self.pending.entry(idx).or_insert(WriteThrough::Remove);
            }
        }
    }

    /// Performs all pending write-throughs.
    ///
    /// Every pending write is attempted even if an earlier one fails; failed
    /// writes stay pending so a later flush retries them. The whole-session
    /// document is built by `document` only when it is dirty.
    ///
    /// # Errors
    ///
    /// Returns the first [`LabelerError::Persistence`] encountered. In-memory
    /// state is never rolled back.
    pub fn flush<F>(&mut self, backend: &mut dyn SessionBackend, document: F) -> Result<()>
    where
        F: FnOnce(&[Item]) -> SessionDocument,
    {
        let _span = tracing::debug_span!("flush",
            pending = self.pending.len(),
            dirty = self.dirty
        )
        .entered();

        let mut first_error: Option<LabelerError> = None;
        let mut record = |error: LabelerError| {
            tracing::error!(error = %error, "write-through failed");
            first_error.get_or_insert(error);
        };

        let pending = std::mem::take(&mut self.pending);
        for (idx, write) in pending {
            let item = &self.items[idx];
            let Some(location) = item.jsonpath.as_deref() else {
                continue;
            };
            let result = match write {
                WriteThrough::Write => backend.persist_item(item, location),
                WriteThrough::Remove => backend.remove_item(location),
            };
            if let Err(error) = result {
                self.pending.insert(idx, write);
                record(error);
            }
        }

        if self.dirty && backend.has_session_location() {
            match backend.persist_session(&document(&self.items)) {
                Ok(()) => self.dirty = false,
                Err(error) => record(error),
            }
        } else {
            self.dirty = false;
        }

        first_error.map_or(Ok(()), Err)
    }
}
