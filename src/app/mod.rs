//! Application layer: the labeling session controller.
//!
//! This module holds the session logic proper, sitting between the UI layer
//! (which renders view models and forwards action strings) and the
//! domain/storage layers (items, merging, persistence).
//!
//! # Architecture
//!
//! ```text
//! UI action → dispatch → LabelingSession transition → SessionDiff → UI
//!                               │
//!                               ├─ OrderIndex (sort/filter)
//!                               ├─ batch selection + validation
//!                               ├─ preload planning
//!                               └─ ItemStore write-through
//! ```
//!
//! # Modules
//!
//! - [`actions`]: Action names a UI layer can request
//! - [`batch`]: Forward/backward batch selection and homogeneity checks
//! - [`diff`]: Change reports returned by every transition
//! - [`handler`]: Action dispatch and re-delivery suppression
//! - [`modes`]: View state machine
//! - [`order`]: Sort/filter order index
//! - [`preload`]: Prefetch planning
//! - [`search`]: Fuzzy search over targets and metadata
//! - [`state`]: The session itself
//!
//! # Example
//!
//! ```
//! use batchlabel::app::{dispatch, ViewState};
//! use batchlabel::{Config, Item, LabelingSession};
//!
//! let items = vec![Item::new("a.jpg"), Item::new("b.jpg")];
//! let mut session = LabelingSession::open_local(items, Config::default())?;
//! dispatch(&mut session, "index")?;
//! assert_eq!(session.view_state(), ViewState::Index);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod actions;
pub mod batch;
pub mod diff;
pub mod handler;
pub mod modes;
pub mod order;
pub mod preload;
pub mod search;
pub mod state;

pub use actions::Action;
pub use diff::SessionDiff;
pub use handler::{dispatch, receive_action};
pub use modes::ViewState;
pub use order::{FilterSpec, OrderIndex, SortDirection, SortSpec};
pub use state::{BatchMember, LabelingSession, COMPLETION_MESSAGE, RESTART_MESSAGE};
