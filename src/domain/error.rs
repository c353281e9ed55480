//! Error types for labeling sessions.
//!
//! This module defines the centralized error type [`LabelerError`] and a type alias
//! [`Result`] used throughout the crate. Variants fall into four families:
//! configuration problems, merge failures, persistence failures and construction
//! failures. All are implemented with `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for labeling session operations.
///
/// Configuration and merge errors are fatal to the requested operation and are
/// never retried. Persistence errors are raised *after* the in-memory mutation
/// has been applied, so the caller may surface them and decide whether to retry
/// the write.
///
/// # Examples
///
/// ```
/// use batchlabel::LabelerError;
///
/// let err = LabelerError::ReservedField("labeled".to_string());
/// assert!(err.is_configuration());
/// ```
#[derive(Debug, Error)]
pub enum LabelerError {
    /// A metadata key shadows one of the synthetic columns.
    ///
    /// The reserved names are `target`, `labeled`, `ignored` and `labels`.
    #[error("metadata key `{0}` is reserved")]
    ReservedField(String),

    /// A batch would contain more than one kind of media.
    #[error("only one type of media is permitted in each batch (found {found})")]
    HeterogeneousBatch {
        /// Comma-separated list of the media types found in the batch.
        found: String,
    },

    /// A non-image item was requested in a batch larger than one.
    #[error("only images can be batch labeled ({media_type} requested with batch of {batch_len})")]
    NonImageBatch {
        /// Media type of the offending item.
        media_type: String,
        /// Number of items in the rejected batch.
        batch_len: usize,
    },

    /// Configuration is invalid or inconsistent.
    #[error("configuration error: {0}")]
    InvalidConfig(String),

    /// An item could not be fingerprinted for merging.
    ///
    /// Metadata must be a map of primitive values and targets must be strings
    /// or structured documents.
    #[error("cannot fingerprint item: {0}")]
    UnhashableKey(String),

    /// Two item lists could not be merged unambiguously.
    #[error("merge conflict: {0}")]
    MergeConflict(String),

    /// A write-through to disk failed.
    ///
    /// The in-memory state already reflects the mutation when this is returned.
    #[error("failed to persist {}: {source}", path.display())]
    Persistence {
        /// Location that could not be written.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A session was constructed without any items.
    #[error("there must be at least one labeling target")]
    EmptyCollection,

    /// Filesystem or I/O operation failed outside of a write-through.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON could not be parsed or produced.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A TOML configuration file could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl LabelerError {
    /// Returns `true` for errors caused by invalid configuration or item setup.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ReservedField(_)
                | Self::HeterogeneousBatch { .. }
                | Self::NonImageBatch { .. }
                | Self::InvalidConfig(_)
        )
    }

    /// Builds a [`LabelerError::Persistence`] for a failed write at `path`.
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}

/// A specialized `Result` type for labeling operations.
pub type Result<T> = std::result::Result<T, LabelerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_configuration_errors() {
        assert!(LabelerError::InvalidConfig("x".into()).is_configuration());
        assert!(LabelerError::HeterogeneousBatch { found: "image, video".into() }.is_configuration());
        assert!(!LabelerError::EmptyCollection.is_configuration());
        assert!(!LabelerError::UnhashableKey("x".into()).is_configuration());
    }

    #[test]
    fn persistence_error_names_the_path() {
        let err = LabelerError::persistence(
            "/tmp/labels.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/labels.json"));
    }
}
