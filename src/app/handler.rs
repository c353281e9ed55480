//! Action dispatch.
//!
//! This module maps action names received from a UI layer onto session
//! transitions. It is the only place that knows the mapping, so a transport
//! (a widget's synced `action` field, an HTTP endpoint, a key binding) only
//! has to forward strings.
//!
//! # Architecture
//!
//! The handler follows a unidirectional data flow pattern:
//! 1. An action string arrives from the UI layer
//! 2. [`dispatch`] parses it into an [`Action`]
//! 3. The matching [`LabelingSession`] transition runs
//! 4. The resulting [`SessionDiff`] goes back to the caller
//!
//! Unknown and empty action names are no-ops that yield an empty diff.
//!
//! # Action Tokens
//!
//! Synced-field transports re-deliver the last value whenever anything
//! changes. [`receive_action`] remembers the last token it dispatched and
//! ignores a repeat of it; the front-end clears the field (sends an empty
//! value) once it has observed the result, which re-arms the token.
//!
//! # Example
//!
//! ```
//! use batchlabel::app::handler::dispatch;
//! use batchlabel::{Config, Item, LabelingSession};
//!
//! let items = vec![Item::new("a.jpg"), Item::new("b.jpg")];
//! let mut session = LabelingSession::open_local(items, Config::default())?;
//! let diff = dispatch(&mut session, "next")?;
//! assert!(diff.cursor);
//! assert_eq!(session.cursor(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::app::actions::Action;
use crate::app::diff::SessionDiff;
use crate::app::state::LabelingSession;
use crate::domain::error::Result;

/// Runs the transition named by `action`.
///
/// # Errors
///
/// Propagates the transition's error: a configuration error when the new
/// batch fails validation, or [`LabelerError::Persistence`] when a
/// write-through failed (the transition itself still completed).
///
/// [`LabelerError::Persistence`]: crate::domain::error::LabelerError::Persistence
pub fn dispatch(session: &mut LabelingSession, action: &str) -> Result<SessionDiff> {
    let _span = tracing::debug_span!("dispatch", action).entered();

    let Some(parsed) = Action::parse(action) else {
        if !action.is_empty() {
            tracing::debug!(action, "ignoring unknown action");
        }
        return Ok(SessionDiff::default());
    };

    if parsed.is_mutating() {
        tracing::info!(action = %parsed, cursor = session.cursor(), batch = ?session.batch(), "applying action");
    }

    match parsed {
        Action::Next => session.next(),
        Action::Prev => session.prev(),
        Action::Save => session.save(),
        Action::Delete => session.delete(),
        Action::Ignore => session.ignore(),
        Action::Unignore => session.unignore(),
        Action::Label => session.enter_labeling_view(),
        Action::Index => session.enter_index_view(),
    }
}

/// Handles a value written to a synced action field.
///
/// - an empty value clears the remembered token
/// - a repeat of the remembered token is ignored
/// - anything else is remembered and dispatched
///
/// # Errors
///
/// See [`dispatch`]. The token is remembered even if the transition fails,
/// so a re-delivery does not retry it.
pub fn receive_action(session: &mut LabelingSession, value: &str) -> Result<SessionDiff> {
    if value.is_empty() {
        let cleared = session.set_action_token(None);
        return Ok(SessionDiff {
            action: cleared,
            ..SessionDiff::default()
        });
    }

    if session.action_token() == Some(value) {
        tracing::debug!(action = value, "ignoring re-delivered action");
        return Ok(SessionDiff::default());
    }

    let stored = session.set_action_token(Some(value.to_string()));
    let diff = dispatch(session, value)?;
    Ok(diff.union(SessionDiff {
        action: stored,
        ..SessionDiff::default()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::modes::ViewState;
    use crate::domain::Item;
    use crate::infrastructure::LocalResolver;
    use crate::storage::MemoryBackend;
    use crate::Config;

    fn session(n: usize) -> LabelingSession {
        let items = (0..n).map(|i| Item::new(format!("{i}.jpg"))).collect();
        LabelingSession::open(
            items,
            Config::default(),
            Box::new(MemoryBackend::items_only()),
            Box::new(LocalResolver::default()),
        )
        .unwrap()
    }

    #[test]
    fn dispatches_every_action() {
        let mut session = session(3);
        assert!(dispatch(&mut session, "next").unwrap().cursor);
        assert_eq!(session.cursor(), 1);
        assert!(dispatch(&mut session, "prev").unwrap().cursor);
        assert_eq!(session.cursor(), 0);

        dispatch(&mut session, "save").unwrap();
        assert!(session.items()[0].is_labeled());
        assert_eq!(session.cursor(), 1);

        dispatch(&mut session, "ignore").unwrap();
        assert!(session.items()[1].is_ignored());
        dispatch(&mut session, "prev").unwrap();
        dispatch(&mut session, "unignore").unwrap();
        assert!(!session.items()[1].is_ignored());

        dispatch(&mut session, "prev").unwrap();
        dispatch(&mut session, "delete").unwrap();
        assert!(!session.items()[0].is_labeled());

        dispatch(&mut session, "index").unwrap();
        assert_eq!(session.view_state(), ViewState::Index);
        dispatch(&mut session, "label").unwrap();
        assert_eq!(session.view_state(), ViewState::Labeling);
    }

    #[test]
    fn unknown_and_empty_actions_are_no_ops() {
        let mut session = session(2);
        assert!(dispatch(&mut session, "explode").unwrap().is_empty());
        assert!(dispatch(&mut session, "").unwrap().is_empty());
        assert!(dispatch(&mut session, "Next").unwrap().is_empty());
        assert_eq!(session.cursor(), 0);
    }

    #[test]
    fn re_delivered_tokens_are_ignored_until_cleared() {
        let mut session = session(4);

        let diff = receive_action(&mut session, "next").unwrap();
        assert!(diff.cursor && diff.action);
        assert_eq!(session.cursor(), 1);

        assert!(receive_action(&mut session, "next").unwrap().is_empty());
        assert_eq!(session.cursor(), 1);

        let cleared = receive_action(&mut session, "").unwrap();
        assert_eq!(cleared.changed(), ["action"]);
        assert!(session.action_token().is_none());

        receive_action(&mut session, "next").unwrap();
        assert_eq!(session.cursor(), 2);
    }

    #[test]
    fn clearing_without_a_token_changes_nothing() {
        let mut session = session(1);
        assert!(receive_action(&mut session, "").unwrap().is_empty());
    }
}
