//! Discrete actions a UI layer can request.
//!
//! Actions arrive as plain strings from whatever transport the embedding
//! application uses. [`Action::parse`] maps a string to a variant; unknown and
//! empty strings map to `None` and are treated as no-ops by the dispatcher.
//!
//! # Example
//!
//! ```
//! use batchlabel::app::Action;
//!
//! assert_eq!(Action::parse("save"), Some(Action::Save));
//! assert_eq!(Action::parse("explode"), None);
//! assert_eq!(Action::Unignore.to_string(), "unignore");
//! ```

use std::fmt;

/// A state transition requested by the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Move to the batch after the current one.
    Next,

    /// Move to the batch before the current one.
    Prev,

    /// Write the active label payload onto every selected, visible member.
    Save,

    /// Remove the labels of every selected, visible, labeled member.
    Delete,

    /// Mark every selected, visible member as ignored.
    Ignore,

    /// Clear the ignore flag of every selected, visible member.
    Unignore,

    /// Return to the labeling view.
    Label,

    /// Enter the index (browse) view.
    Index,
}

impl Action {
    /// Every action, in dispatch-table order.
    pub const ALL: [Self; 8] = [
        Self::Next,
        Self::Prev,
        Self::Save,
        Self::Delete,
        Self::Ignore,
        Self::Unignore,
        Self::Label,
        Self::Index,
    ];

    /// Parses an action name. Returns `None` for unknown or empty names.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == name)
    }

    /// Wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Prev => "prev",
            Self::Save => "save",
            Self::Delete => "delete",
            Self::Ignore => "ignore",
            Self::Unignore => "unignore",
            Self::Label => "label",
            Self::Index => "index",
        }
    }

    /// Whether the action mutates items (and therefore writes through).
    #[must_use]
    pub const fn is_mutating(self) -> bool {
        matches!(self, Self::Save | Self::Delete | Self::Ignore | Self::Unignore)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_exact() {
        for action in Action::ALL {
            assert_eq!(Action::parse(action.as_str()), Some(action));
        }
        assert_eq!(Action::parse(""), None);
        assert_eq!(Action::parse("Save"), None);
        assert_eq!(Action::parse(" next"), None);
    }

    #[test]
    fn only_item_transitions_are_mutating() {
        assert!(Action::Ignore.is_mutating());
        assert!(!Action::Next.is_mutating());
        assert!(!Action::Index.is_mutating());
    }
}
