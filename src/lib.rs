//! batchlabel: a session controller for batched media labeling.
//!
//! batchlabel drives an interactive labeling session over a collection of
//! media items (images, videos, time series, image groups, segment pairs):
//! - Batches of images labeled together, other media one at a time
//! - Save, delete, ignore and unignore with write-through persistence
//! - Resumable sessions merged with previously saved labels
//! - Sortable, filterable, paginated index of the whole collection
//! - Fuzzy search over targets and metadata
//! - Preload hints for upcoming media

#![allow(clippy::multiple_crate_versions)]

//!
//! # Architecture
//!
//! The crate follows a layered architecture pattern:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Front-end (widget, web UI, CLI)                    │  ← Not in this crate
//! └─────────────────────────────────────────────────────┘
//!               │ action strings       ▲ view models + diffs
//! ┌─────────────────────────────────────────────────────┐
//! │  Application Layer (app/)                           │  ← State machine
//! │  - Action dispatch                                  │
//! │  - Cursor, batch and view state                     │
//! │  - Sort/filter order, preload, search               │
//! └─────────────────────────────────────────────────────┘
//!         │                    │                    │
//! ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//! │ UI Layer      │   │ Storage Layer │   │ Infrastructure│
//! │ (ui/)         │   │ (storage/)    │   │ (infra../)    │
//! │ - Snapshots   │   │ - Item store  │   │ - Media URLs  │
//! │ - Index pages │   │ - Merging     │   │ - Type guess  │
//! │               │   │ - JSON files  │   │ - Paths       │
//! └───────────────┘   └───────────────┘   └───────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────┐
//! │  Domain (domain/)                                   │
//! │  - Item, Target, MediaType                          │
//! │  - Error types                                      │
//! └─────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────┐
//! │  Observability (observability/)                     │  ← Optional
//! │  - Rotating file log                                │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`app`]: Session state machine and action dispatch
//! - [`domain`]: Core domain types (items, targets, errors)
//! - [`infrastructure`]: Media reference resolution and path helpers
//! - [`storage`]: Item store, merging and persistence backends
//! - [`ui`]: View models for front-ends
//! - [`observability`]: Tracing subscriber setup
//!
//! # Configuration
//!
//! Sessions are configured with [`Config`], built in code, from a TOML file,
//! or from a flat string map:
//!
//! ```toml
//! batch_size = 4
//! advance_on_save = true
//! max_preload = 3
//! jsonpath = "labels/session.json"
//! trace_level = "debug"
//!
//! [base]
//! url = "http://localhost:8080"
//! server_root = "/srv/media"
//! ```
//!
//! # Examples
//!
//! ## Basic Usage
//!
//! ```
//! use batchlabel::{dispatch, Config, Item, LabelingSession};
//! use serde_json::json;
//!
//! let items = vec![Item::new("a.jpg"), Item::new("b.jpg"), Item::new("c.jpg")];
//! let config = Config {
//!     batch_size: Some(2),
//!     ..Default::default()
//! };
//! let mut session = LabelingSession::open_local(items, config)?;
//! assert_eq!(session.batch(), [0, 1]);
//!
//! session.edit_labels(json!({"image": {"kind": ["cat"]}}));
//! let diff = dispatch(&mut session, "save")?;
//! assert!(diff.items && diff.cursor);
//! assert_eq!(session.batch(), [2]);
//! # Ok::<(), batchlabel::LabelerError>(())
//! ```
//!
//! ## Resuming a Session
//!
//! ```no_run
//! use batchlabel::{Config, Item, LabelingSession};
//!
//! let config = Config {
//!     jsonpath: Some("labels/session.json".into()),
//!     ..Default::default()
//! };
//! let items = vec![Item::new("a.jpg"), Item::new("b.jpg")];
//! // Labels saved by an earlier session are merged back in, and the cursor
//! // starts at the first item still awaiting a label.
//! let session = LabelingSession::open_local(items, config)?;
//! println!("{:.0}% done", session.progress());
//! # Ok::<(), batchlabel::LabelerError>(())
//! ```
//!
//! # Key Design Decisions
//!
//! ## Stable Item Positions
//!
//! Items never move once loaded. Sorting and filtering produce a separate
//! order of positions, so the cursor, batch members and persisted documents
//! all refer to items by the same index.
//!
//! ## Write-Through, No Rollback
//!
//! Each mutation is persisted before it returns. A failed write leaves the
//! in-memory state as mutated and is retried on the next mutation.
//!
//! ## Change Reports
//!
//! Every transition returns a [`SessionDiff`] so a front-end pushes only the
//! fields that changed.

pub mod app;
pub mod domain;
pub mod infrastructure;
pub mod storage;

pub mod ui;

pub mod observability;

pub use app::{
    dispatch, receive_action, Action, FilterSpec, LabelingSession, SessionDiff, SortDirection,
    SortSpec, ViewState,
};
pub use domain::{Item, LabelerError, MediaType, Metadata, Result, Target};
pub use infrastructure::{BaseUrl, LocalResolver, MediaResolver};
pub use storage::{JsonFileBackend, MemoryBackend, SessionBackend, SessionDocument};

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Session configuration.
///
/// Fields missing from a TOML file or string map take their defaults. When a
/// persisted session document is resumed, its stored settings override these
/// (except an explicitly set `batch_size`).
///
/// # Example
///
/// ```toml
/// batch_size = 4
/// mode = "dark"
/// label_config = { image = [], regions = [] }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Items per image batch. `None` defers to a resumed session document,
    /// then to 1.
    pub batch_size: Option<usize>,

    /// Move to the next batch once every member has been saved.
    /// Default: `true`
    pub advance_on_save: bool,

    /// References to prefetch after the current batch. Default: 3
    pub max_preload: usize,

    /// Height budget of the view in pixels; also sizes index pages.
    /// Default: 512
    pub max_view_height: u32,

    /// Default: 512
    pub max_canvas_size: u32,

    /// Front-end color mode. Default: `"light"`
    pub mode: String,

    /// Whether the task configuration may be edited. Default: `true`
    pub allow_config_change: bool,

    /// Whole-session document location.
    pub jsonpath: Option<PathBuf>,

    /// Where local media is served from.
    pub base: Option<BaseUrl>,

    /// Opaque task configuration (label classes, region options).
    pub label_config: Value,

    /// Tracing filter directive.
    ///
    /// Options: `trace`, `debug`, `info`, `warn`, `error`, or any
    /// `EnvFilter` directive. Default: `"info"`
    pub trace_level: Option<String>,

    /// Log file for [`observability::init_tracing`].
    pub log_file: Option<PathBuf>,
}

fn default_label_config() -> Value {
    serde_json::json!({"image": [], "regions": []})
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: None,
            advance_on_save: true,
            max_preload: 3,
            max_view_height: 512,
            max_canvas_size: 512,
            mode: "light".to_string(),
            allow_config_change: true,
            jsonpath: None,
            base: None,
            label_config: default_label_config(),
            trace_level: None,
            log_file: None,
        }
    }
}

impl Config {
    /// Parses configuration from a flat string map (CLI flags, environment,
    /// widget attributes).
    ///
    /// # Parsing Rules
    ///
    /// - numbers and booleans fall back to their defaults on parse errors
    /// - booleans accept `true`/`false`, `yes`/`no`, `1`/`0`
    /// - `base_url` and `server_root` together set [`Config::base`]
    /// - `label_config` is a JSON document; invalid JSON keeps the default
    /// - empty values are treated as absent
    ///
    /// # Example
    ///
    /// ```
    /// use std::collections::BTreeMap;
    /// use batchlabel::Config;
    ///
    /// let mut map = BTreeMap::new();
    /// map.insert("batch_size".to_string(), "4".to_string());
    /// map.insert("advance_on_save".to_string(), "no".to_string());
    /// map.insert("max_preload".to_string(), "lots".to_string());
    ///
    /// let config = Config::from_map(&map);
    /// assert_eq!(config.batch_size, Some(4));
    /// assert!(!config.advance_on_save);
    /// assert_eq!(config.max_preload, 3);
    /// ```
    #[must_use]
    pub fn from_map(map: &BTreeMap<String, String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| map.get(key).map(|s| s.trim()).filter(|s| !s.is_empty());
        let flag = |key: &str, default: bool| {
            get(key)
                .and_then(|s| match s.to_ascii_lowercase().as_str() {
                    "true" | "yes" | "1" => Some(true),
                    "false" | "no" | "0" => Some(false),
                    _ => None,
                })
                .unwrap_or(default)
        };

        let base = match (get("base_url"), get("server_root")) {
            (Some(url), Some(server_root)) => Some(BaseUrl {
                url: url.to_string(),
                server_root: server_root.to_string(),
            }),
            _ => None,
        };

        let label_config = get("label_config").map_or_else(default_label_config, |raw| {
            serde_json::from_str(raw).unwrap_or_else(|e| {
                tracing::debug!(error = %e, "invalid label_config, using default");
                default_label_config()
            })
        });

        Self {
            batch_size: get("batch_size").and_then(|s| s.parse().ok()),
            advance_on_save: flag("advance_on_save", defaults.advance_on_save),
            max_preload: get("max_preload")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_preload),
            max_view_height: get("max_view_height")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_view_height),
            max_canvas_size: get("max_canvas_size")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_canvas_size),
            mode: get("mode").map_or(defaults.mode, String::from),
            allow_config_change: flag("allow_config_change", defaults.allow_config_change),
            jsonpath: get("jsonpath").map(infrastructure::expand_tilde),
            base,
            label_config,
            trace_level: get("trace_level").map(String::from),
            log_file: get("log_file").map(infrastructure::expand_tilde),
        }
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`LabelerError::Io`] if the file cannot be read and
    /// [`LabelerError::Toml`] if it is not valid configuration.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Rows per index page for the configured view height.
    #[must_use]
    pub const fn rows_per_page(&self) -> usize {
        ui::index::rows_per_page(self.max_view_height)
    }
}
