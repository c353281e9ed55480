//! Persisted document models.
//!
//! The whole-session document is the single JSON file a session is saved to
//! and resumed from. Field names are camelCase to stay compatible with label
//! files written by the widget front-ends.

use crate::domain::Item;
use crate::Config;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current version of the session document format.
pub const DOCUMENT_VERSION: u32 = 1;

const fn default_version() -> u32 {
    DOCUMENT_VERSION
}

/// Whole-session document written on every mutating transition.
///
/// # File Format
///
/// ```json
/// {
///   "version": 1,
///   "savedAt": "2026-01-01T12:00:00+00:00",
///   "items": [{"target": "a.jpg", "type": "image", "labels": {"image": {}}}],
///   "config": {"image": [], "regions": []},
///   "maxCanvasSize": 512,
///   "maxViewHeight": 512,
///   "mode": "light",
///   "batchSize": 1,
///   "allowConfigChange": true,
///   "advanceOnSave": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDocument {
    /// Format version for future migrations.
    #[serde(default = "default_version")]
    pub version: u32,

    /// RFC 3339 timestamp of the last write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,

    #[serde(default)]
    pub items: Vec<Item>,

    /// Task configuration (label classes, region options).
    #[serde(default)]
    pub config: Value,

    #[serde(default)]
    pub max_canvas_size: Option<u32>,

    #[serde(default)]
    pub max_view_height: Option<u32>,

    #[serde(default)]
    pub mode: Option<String>,

    #[serde(default)]
    pub batch_size: Option<usize>,

    #[serde(default)]
    pub allow_config_change: Option<bool>,

    #[serde(default)]
    pub advance_on_save: Option<bool>,
}

impl SessionDocument {
    /// Captures the current items and session settings, stamped with the
    /// current time.
    #[must_use]
    pub fn snapshot(items: &[Item], config: &Config, batch_size: usize) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            saved_at: Some(chrono::Utc::now().to_rfc3339()),
            items: items.to_vec(),
            config: config.label_config.clone(),
            max_canvas_size: Some(config.max_canvas_size),
            max_view_height: Some(config.max_view_height),
            mode: Some(config.mode.clone()),
            batch_size: Some(batch_size),
            allow_config_change: Some(config.allow_config_change),
            advance_on_save: Some(config.advance_on_save),
        }
    }

    /// Overlays the persisted settings onto `config`.
    ///
    /// Persisted settings win, except `batch_size`: an explicitly configured
    /// batch size takes precedence over the stored one.
    pub fn apply_to(&self, config: &mut Config) {
        if !self.config.is_null() {
            config.label_config = self.config.clone();
        }
        if let Some(mode) = &self.mode {
            config.mode.clone_from(mode);
        }
        if let Some(size) = self.max_canvas_size {
            config.max_canvas_size = size;
        }
        if let Some(height) = self.max_view_height {
            config.max_view_height = height;
        }
        if let Some(allow) = self.allow_config_change {
            config.allow_config_change = allow;
        }
        if let Some(advance) = self.advance_on_save {
            config.advance_on_save = advance;
        }
        if config.batch_size.is_none() {
            config.batch_size = self.batch_size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loads_minimal_document() {
        let document: SessionDocument =
            serde_json::from_value(json!({"items": [{"target": "a.jpg"}], "config": {}})).unwrap();
        assert_eq!(document.version, DOCUMENT_VERSION);
        assert_eq!(document.items.len(), 1);
        assert!(document.batch_size.is_none());
    }

    #[test]
    fn persisted_settings_override_except_explicit_batch_size() {
        let document = SessionDocument {
            batch_size: Some(4),
            advance_on_save: Some(false),
            mode: Some("dark".to_string()),
            ..serde_json::from_value::<SessionDocument>(json!({})).unwrap()
        };

        let mut config = Config::default();
        document.apply_to(&mut config);
        assert_eq!(config.batch_size, Some(4));
        assert!(!config.advance_on_save);
        assert_eq!(config.mode, "dark");

        let mut explicit = Config {
            batch_size: Some(2),
            ..Config::default()
        };
        document.apply_to(&mut explicit);
        assert_eq!(explicit.batch_size, Some(2));
    }

    #[test]
    fn snapshot_round_trips_settings() {
        let config = Config::default();
        let document = SessionDocument::snapshot(&[Item::new("a.jpg")], &config, 3);
        let text = serde_json::to_string(&document).unwrap();
        assert!(text.contains("\"batchSize\":3"));
        assert!(text.contains("\"advanceOnSave\":true"));
        assert!(document.saved_at.is_some());
    }
}
