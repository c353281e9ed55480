//! View models for the UI layer.
//!
//! The crate does not render anything itself. This layer turns session state
//! into serializable snapshots a front-end can draw: the current batch with
//! its controls, and paged index tables over the current order.
//!
//! # Architecture
//!
//! ```text
//! LabelingSession → current_batch_view / index_view → view model → front-end
//! ```
//!
//! # Modules
//!
//! - [`viewmodel`]: View model types (batch snapshot, index page, search hits)
//! - [`index`]: Index table paging and column selection
//!
//! # Example
//!
//! ```
//! use batchlabel::{Config, Item, LabelingSession};
//!
//! let items = vec![Item::new("a.jpg"), Item::new("b.jpg")];
//! let session = LabelingSession::open_local(items, Config::default())?;
//! let page = session.index_view(0);
//! assert_eq!(page.row_count, 2);
//! assert_eq!(page.columns[0].field, "target");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod index;
pub mod viewmodel;

pub use viewmodel::{
    BatchEntry, BatchSnapshot, Buttons, Column, ColumnKind, IndexPage, IndexRow, SearchHit,
};
