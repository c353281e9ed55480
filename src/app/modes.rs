//! View state machine for a labeling session.
//!
//! A session is in exactly one of three states:
//! - **Labeling**: the current batch is shown and accepts label edits
//! - **Transitioning**: the cursor is moving and the batch is being rebuilt
//! - **Index**: the paginated browse table is shown instead of the batch
//!
//! `Transitioning` is only ever observed inside a reset update; every public
//! operation returns with the session in `Labeling` or `Index`.
//!
//! # Example
//!
//! ```
//! use batchlabel::app::ViewState;
//!
//! let state = ViewState::default();
//! assert_eq!(state, ViewState::Labeling);
//! assert_eq!(state.as_str(), "labeling");
//! ```

use serde::{Deserialize, Serialize};

/// Which view the session is presenting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewState {
    /// The current batch is shown for labeling.
    #[default]
    Labeling,

    /// The batch is being rebuilt after a cursor move.
    Transitioning,

    /// The paginated index table is shown.
    Index,
}

impl ViewState {
    /// Wire name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Labeling => "labeling",
            Self::Transitioning => "transitioning",
            Self::Index => "index",
        }
    }
}
