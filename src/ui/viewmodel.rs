//! View model types handed to the UI layer.
//!
//! View models are immutable snapshots computed from a
//! [`LabelingSession`](crate::app::LabelingSession). They carry no behavior,
//! only display-ready data, and serialize to camelCase JSON so a widget or
//! HTTP front-end can forward them unchanged.
//!
//! # Example
//!
//! ```
//! use batchlabel::ui::Buttons;
//!
//! let buttons = Buttons::default();
//! assert!(!buttons.save);
//! ```

use crate::app::modes::ViewState;
use crate::app::order::{FilterSpec, SortSpec};
use crate::domain::{MediaType, Metadata, Target};
use serde::Serialize;
use serde_json::Value;

/// Everything the labeling view needs to render the current batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSnapshot {
    /// Batch members in order.
    pub entries: Vec<BatchEntry>,

    /// Shared media type of the batch.
    pub media_type: MediaType,

    /// Viewable references built when the batch was entered, one per member
    /// (or one structured reference for grouped types).
    pub references: Vec<Value>,

    /// Label payload currently being edited.
    pub labels: Value,

    pub buttons: Buttons,

    pub view_state: ViewState,

    /// Percentage of labeled or ignored items.
    pub progress: f64,

    /// Advisory or completion message, if any.
    pub message: Option<String>,

    /// References worth prefetching.
    pub preload: Vec<String>,

    /// Opaque task configuration (label classes, region options).
    pub config: Value,
}

/// One member of the current batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntry {
    /// Stable position of the item in the collection.
    pub idx: usize,
    pub target: Option<Target>,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub metadata: Metadata,
    /// Participates in the next save/delete/ignore.
    pub selected: bool,
    /// Still awaiting input in this batch.
    pub visible: bool,
    pub labeled: bool,
    pub ignored: bool,
    pub labels: Option<Value>,
}

/// Which controls are currently enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Buttons {
    pub prev: bool,
    pub next: bool,
    pub save: bool,
    pub config: bool,
    pub delete: bool,
    pub ignore: bool,
    pub unignore: bool,
}

/// One page of the index (browse) table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexPage {
    pub rows: Vec<IndexRow>,
    pub columns: Vec<Column>,
    /// Zero-based page number.
    pub page: usize,
    pub rows_per_page: usize,
    /// Rows across all pages.
    pub row_count: usize,
    pub sort: Option<SortSpec>,
    pub filter: Option<FilterSpec>,
}

impl IndexPage {
    /// Number of pages, at least one.
    #[must_use]
    pub fn page_count(&self) -> usize {
        let per_page = self.rows_per_page.max(1);
        ((self.row_count + per_page - 1) / per_page).max(1)
    }
}

/// One row of the index table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexRow {
    /// Stable position of the item; used to jump to it.
    pub idx: usize,
    pub target: String,
    /// `Yes` if labeled or ignored.
    pub labeled: String,
    pub ignored: String,
    pub labels: String,
    /// Metadata values for the metadata columns.
    #[serde(flatten)]
    pub metadata: Metadata,
}

/// Column description for the index table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub field: String,
    #[serde(rename = "type")]
    pub kind: ColumnKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_name: Option<String>,
}

/// Value kind of a column, for client-side formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    String,
    Number,
}

/// One fuzzy search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub idx: usize,
    pub score: i64,
    /// Field the best match was found in (`target` or a metadata key).
    pub field: String,
    /// The matched text.
    pub text: String,
    /// `(start, end)` character ranges to highlight, end exclusive.
    pub highlight_ranges: Vec<(usize, usize)>,
}
