//! Storage layer: the item store, item merging and persistence backends.
//!
//! The [`ItemStore`] owns the session's items and schedules write-throughs;
//! a [`SessionBackend`] performs them. Sessions resumed from disk are
//! reconciled with freshly supplied items by [`merge_items`].
//!
//! # Modules
//!
//! - `backend`: Persistence trait implemented by every backend
//! - `json`: JSON file backend with atomic writes
//! - `memory`: In-process backend
//! - `merge`: Fingerprint-keyed merge of two item lists
//! - `models`: Persisted session document
//! - `store`: Canonical item collection and write-through scheduling

pub mod backend;
pub mod json;
pub mod memory;
pub mod merge;
pub mod models;
pub mod store;

pub use backend::SessionBackend;
pub use json::JsonFileBackend;
pub use memory::MemoryBackend;
pub use merge::{merge_item, merge_items};
pub use models::{SessionDocument, DOCUMENT_VERSION};
pub use store::ItemStore;
