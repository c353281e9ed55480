//! Change reports returned by session mutators.
//!
//! Every operation on a [`LabelingSession`](crate::app::LabelingSession)
//! returns a [`SessionDiff`] naming exactly which derived fields changed, so a
//! UI layer can push only what it needs to.

use serde::Serialize;

/// Which parts of the session changed during one operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct SessionDiff {
    /// The cursor moved.
    pub cursor: bool,
    /// Batch membership changed.
    pub batch: bool,
    /// A member's `selected`/`visible`/`labeled`/`ignored` flag changed.
    pub view_flags: bool,
    /// The active label payload changed.
    pub labels: bool,
    pub view_state: bool,
    pub progress: bool,
    pub preload: bool,
    /// The order or the index page changed.
    pub index: bool,
    pub message: bool,
    pub buttons: bool,
    /// The last received action token changed.
    pub action: bool,
    /// Item labels or ignore flags changed.
    pub items: bool,
}

impl SessionDiff {
    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Field-wise union of two diffs.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self {
            cursor: self.cursor || other.cursor,
            batch: self.batch || other.batch,
            view_flags: self.view_flags || other.view_flags,
            labels: self.labels || other.labels,
            view_state: self.view_state || other.view_state,
            progress: self.progress || other.progress,
            preload: self.preload || other.preload,
            index: self.index || other.index,
            message: self.message || other.message,
            buttons: self.buttons || other.buttons,
            action: self.action || other.action,
            items: self.items || other.items,
        }
    }

    /// Names of the changed fields, in declaration order.
    #[must_use]
    pub fn changed(&self) -> Vec<&'static str> {
        [
            ("cursor", self.cursor),
            ("batch", self.batch),
            ("view_flags", self.view_flags),
            ("labels", self.labels),
            ("view_state", self.view_state),
            ("progress", self.progress),
            ("preload", self.preload),
            ("index", self.index),
            ("message", self.message),
            ("buttons", self.buttons),
            ("action", self.action),
            ("items", self.items),
        ]
        .into_iter()
        .filter_map(|(name, changed)| changed.then_some(name))
        .collect()
    }
}
