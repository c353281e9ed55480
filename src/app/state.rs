//! Labeling session state and transitions.
//!
//! [`LabelingSession`] owns the item store, the order index and the transient
//! view state of the current batch. It is the single source of truth the UI
//! layer reads from and the only path through which items are mutated.
//!
//! # Updates
//!
//! Two kinds of refresh keep derived state consistent:
//!
//! - a **reset** update runs whenever the cursor moves. It rebuilds the batch
//!   from scratch (every member selected and visible), re-resolves media
//!   references and picks the active label payload from the first member.
//! - a **soft** update runs after an in-place mutation. Member flags survive;
//!   only label state, progress and preload are recomputed.
//!
//! Toggling a flag or editing the payload touches nothing else.
//!
//! # Persistence
//!
//! Mutating transitions write through the configured [`SessionBackend`]. A
//! failed write never rolls back memory: the transition completes, the view is
//! refreshed, and only then is the [`LabelerError::Persistence`] returned.
//! Failed writes stay pending and are retried by the next mutation or by
//! [`LabelingSession::persist_pending`].

use crate::app::batch::{select_batch, select_batch_backward, validate_batch};
use crate::app::diff::SessionDiff;
use crate::app::modes::ViewState;
use crate::app::order::{check_reserved_fields, FilterSpec, OrderIndex, SortSpec};
use crate::app::{preload, search};
use crate::domain::error::{LabelerError, Result};
use crate::domain::{Item, MediaType, Target};
use crate::infrastructure::{batch_references, LocalResolver, MediaResolver};
use crate::storage::{
    merge_item, merge_items, ItemStore, JsonFileBackend, SessionBackend, SessionDocument,
};
use crate::ui::index;
use crate::ui::viewmodel::{BatchEntry, BatchSnapshot, Buttons, IndexPage, SearchHit};
use crate::Config;
use serde_json::Value;

/// Message shown once every item is labeled or ignored.
pub const COMPLETION_MESSAGE: &str = "All items have been labeled.";

/// Message shown when a session opens with nothing left to label.
pub const RESTART_MESSAGE: &str = "All items have already been labeled. Starting from the beginning.";

/// View state of one member of the current batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchMember {
    /// Stable position of the item.
    pub idx: usize,
    pub media_type: MediaType,
    /// Participates in the next save/delete/ignore.
    pub selected: bool,
    /// Still awaiting input.
    pub visible: bool,
    pub labeled: bool,
    pub ignored: bool,
}

impl BatchMember {
    const fn is_active(&self) -> bool {
        self.selected && self.visible
    }
}

/// A labeling session over one item collection.
pub struct LabelingSession {
    store: ItemStore,
    order: OrderIndex,
    config: Config,
    batch_size: usize,
    backend: Box<dyn SessionBackend>,
    resolver: Box<dyn MediaResolver>,

    /// Item index of the first batch member.
    cursor: usize,
    members: Vec<BatchMember>,
    media_type: MediaType,
    references: Vec<Value>,
    labels: Value,
    view_state: ViewState,
    message: Option<String>,
    progress: f64,
    preload: Vec<String>,
    index_page: usize,
    action_token: Option<String>,
}

impl std::fmt::Debug for LabelingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelingSession")
            .field("items", &self.store.len())
            .field("cursor", &self.cursor)
            .field("members", &self.members)
            .field("view_state", &self.view_state)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

impl LabelingSession {
    /// Opens a session.
    ///
    /// Construction reconciles the supplied items with whatever the backend
    /// already holds:
    ///
    /// 1. items carrying their own `jsonpath` are merged with their persisted
    ///    copy (all items must have one, or none)
    /// 2. with a session location, the persisted document is merged with the
    ///    supplied items and its settings override `config`
    /// 3. items without a type get one from the resolver
    ///
    /// The cursor starts at the first unlabeled, non-ignored item in order.
    ///
    /// # Errors
    ///
    /// - [`LabelerError::EmptyCollection`] if there are no items
    /// - [`LabelerError::ReservedField`] if metadata shadows a synthetic column
    /// - [`LabelerError::InvalidConfig`] for inconsistent persistence locations,
    ///   raw targets with a session location, or a zero batch size
    /// - [`LabelerError::UnhashableKey`] / [`LabelerError::MergeConflict`] if
    ///   persisted and supplied items cannot be merged
    pub fn open(
        items: Vec<Item>,
        mut config: Config,
        backend: Box<dyn SessionBackend>,
        resolver: Box<dyn MediaResolver>,
    ) -> Result<Self> {
        let _span = tracing::info_span!("open_session",
            items = items.len(),
            session_location = backend.has_session_location()
        )
        .entered();

        let mut items = reconcile(items, &mut config, backend.as_ref())?;
        if items.is_empty() {
            return Err(LabelerError::EmptyCollection);
        }
        check_reserved_fields(&items)?;

        for item in &mut items {
            if item.media_type.is_none() {
                let guessed = item
                    .target
                    .as_ref()
                    .map_or(MediaType::Image, |target| resolver.guess_type(target));
                item.media_type = Some(guessed);
            }
        }

        let batch_size = config.batch_size.unwrap_or(1);
        if batch_size == 0 {
            return Err(LabelerError::InvalidConfig("batch size must be at least 1".to_string()));
        }

        let store = ItemStore::new(items);
        let progress = store.progress();
        let mut session = Self {
            order: OrderIndex::new(store.len()),
            store,
            config,
            batch_size,
            backend,
            resolver,
            cursor: 0,
            members: Vec::new(),
            media_type: MediaType::Image,
            references: Vec::new(),
            labels: Value::Null,
            view_state: ViewState::Labeling,
            message: None,
            progress,
            preload: Vec::new(),
            index_page: 0,
            action_token: None,
        };
        session.go_to_unlabeled()?;

        tracing::info!(
            items = session.store.len(),
            batch_size,
            cursor = session.cursor,
            progress = session.progress,
            "session opened"
        );
        Ok(session)
    }

    /// Opens a session persisted to JSON files, resolving media locally.
    ///
    /// The session document goes to `config.jsonpath` when set; viewable URLs
    /// are built from `config.base`.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_local(items: Vec<Item>, config: Config) -> Result<Self> {
        let backend = config
            .jsonpath
            .clone()
            .map_or_else(JsonFileBackend::items_only, JsonFileBackend::new);
        let resolver = LocalResolver::new(config.base.clone());
        Self::open(items, config, Box::new(backend), Box::new(resolver))
    }

    // ---- transitions --------------------------------------------------------

    /// Moves to the batch after the current one.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the new batch fails validation.
    pub fn next(&mut self) -> Result<SessionDiff> {
        self.observe("next", Self::go_next)
    }

    /// Moves to the batch before the current one.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the new batch fails validation.
    pub fn prev(&mut self) -> Result<SessionDiff> {
        self.observe("prev", Self::go_prev)
    }

    /// Moves the cursor to the first unlabeled, non-ignored item in order.
    ///
    /// When every item is done the cursor goes to the first item and an
    /// advisory message is set.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the new batch fails validation.
    pub fn advance_to_unlabeled(&mut self) -> Result<SessionDiff> {
        self.observe("advance_to_unlabeled", Self::go_to_unlabeled)
    }

    /// Writes the active label payload onto every selected, visible member.
    ///
    /// Saved members are hidden unless video-like. With `advance_on_save` the
    /// session moves on once nothing in the batch awaits input.
    ///
    /// # Errors
    ///
    /// [`LabelerError::Persistence`] if a write-through failed; the labels are
    /// applied in memory regardless.
    pub fn save(&mut self) -> Result<SessionDiff> {
        self.observe("save", Self::apply_save)
    }

    /// Removes the labels of every selected, visible member.
    ///
    /// # Errors
    ///
    /// [`LabelerError::Persistence`] if a write-through failed.
    pub fn delete(&mut self) -> Result<SessionDiff> {
        self.observe("delete", Self::apply_delete)
    }

    /// Ignores every selected, visible member, clearing its labels.
    ///
    /// Always moves on once nothing in the batch awaits input.
    ///
    /// # Errors
    ///
    /// [`LabelerError::Persistence`] if a write-through failed.
    pub fn ignore(&mut self) -> Result<SessionDiff> {
        self.observe("ignore", Self::apply_ignore)
    }

    /// Clears the ignore flag of every selected, visible member.
    ///
    /// # Errors
    ///
    /// [`LabelerError::Persistence`] if a write-through failed.
    pub fn unignore(&mut self) -> Result<SessionDiff> {
        self.observe("unignore", Self::apply_unignore)
    }

    /// Returns to the labeling view, rebuilding the current batch.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the batch fails validation.
    pub fn enter_labeling_view(&mut self) -> Result<SessionDiff> {
        self.observe("label", |session| {
            session.update(true)?;
            session.view_state = ViewState::Labeling;
            Ok(())
        })
    }

    /// Switches to the index view.
    ///
    /// Coming from another view, the page is reset to the one holding the
    /// cursor.
    ///
    /// # Errors
    ///
    /// Never fails; the `Result` keeps the transition signatures uniform.
    pub fn enter_index_view(&mut self) -> Result<SessionDiff> {
        self.observe("index", |session| {
            session.refresh_order();
            if session.view_state != ViewState::Index {
                session.index_page = index::page_of(session.cursor_pos(), session.rows_per_page());
            }
            session.view_state = ViewState::Index;
            Ok(())
        })
    }

    /// Moves the cursor to an item and labels it (an index row was picked).
    ///
    /// Items outside the current order are ignored.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the new batch fails validation.
    pub fn jump_to(&mut self, idx: usize) -> Result<SessionDiff> {
        self.observe("jump_to", |session| {
            session.refresh_order();
            if session.order.position_of(idx).is_none() {
                tracing::warn!(idx, "jump target is not in the current order");
                return Ok(());
            }
            session.cursor = idx;
            session.update(true)?;
            session.view_state = ViewState::Labeling;
            Ok(())
        })
    }

    /// Replaces the sort; `None` restores collection order.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the batch had to be rebuilt and the
    /// new one fails validation.
    pub fn set_sort(&mut self, sort: Option<SortSpec>) -> Result<SessionDiff> {
        self.observe("set_sort", |session| {
            session.order.set_sort(sort);
            session.reorder()
        })
    }

    /// Replaces the filter; `None` (or an empty value) removes it.
    ///
    /// A filter that matches nothing is not applied and sets an advisory
    /// message instead. If the cursor falls outside the filtered set it moves
    /// to the first filtered item.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the batch had to be rebuilt and the
    /// new one fails validation.
    pub fn set_filter(&mut self, filter: Option<FilterSpec>) -> Result<SessionDiff> {
        self.observe("set_filter", |session| {
            session.order.set_filter(filter);
            session.reorder()
        })
    }

    /// Shows another index page, clamped to the last one.
    pub fn set_page(&mut self, page: usize) -> SessionDiff {
        self.observe_infallible("set_page", |session| {
            let last = session.order.len().saturating_sub(1) / session.rows_per_page();
            session.index_page = page.min(last);
        })
    }

    /// Replaces the active label payload without moving the cursor.
    pub fn edit_labels(&mut self, payload: Value) -> SessionDiff {
        self.observe_infallible("edit_labels", |session| session.labels = payload)
    }

    /// Sets whether a batch member takes part in the next transition.
    ///
    /// Items that are not in the current batch are ignored.
    pub fn set_selected(&mut self, idx: usize, selected: bool) -> SessionDiff {
        self.observe_infallible("set_selected", |session| {
            if let Some(member) = session.members.iter_mut().find(|member| member.idx == idx) {
                member.selected = selected;
            }
        })
    }

    /// Sets whether a batch member still awaits input.
    pub fn set_visible(&mut self, idx: usize, visible: bool) -> SessionDiff {
        self.observe_infallible("set_visible", |session| {
            if let Some(member) = session.members.iter_mut().find(|member| member.idx == idx) {
                member.visible = visible;
            }
        })
    }

    /// Enables or disables task configuration changes.
    pub fn set_allow_config_change(&mut self, allow: bool) -> SessionDiff {
        self.observe_infallible("set_allow_config_change", |session| {
            session.config.allow_config_change = allow;
        })
    }

    /// Clears the advisory message.
    pub fn dismiss_message(&mut self) -> SessionDiff {
        self.observe_infallible("dismiss_message", |session| session.message = None)
    }

    /// Retries write-throughs that failed earlier.
    ///
    /// # Errors
    ///
    /// [`LabelerError::Persistence`] if a write still fails.
    pub fn persist_pending(&mut self) -> Result<()> {
        self.flush()
    }

    // ---- queries -------------------------------------------------------------

    /// Item index of the first member of the current batch.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Item indices of the current batch.
    #[must_use]
    pub fn batch(&self) -> Vec<usize> {
        self.members.iter().map(|member| member.idx).collect()
    }

    #[must_use]
    pub fn members(&self) -> &[BatchMember] {
        &self.members
    }

    /// The label payload being edited.
    #[must_use]
    pub const fn labels(&self) -> &Value {
        &self.labels
    }

    #[must_use]
    pub const fn view_state(&self) -> ViewState {
        self.view_state
    }

    /// Percentage of labeled or ignored items.
    #[must_use]
    pub const fn progress(&self) -> f64 {
        self.progress
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    #[must_use]
    pub fn preload(&self) -> &[String] {
        &self.preload
    }

    #[must_use]
    pub const fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// Viewable references of the current batch.
    #[must_use]
    pub fn references(&self) -> &[Value] {
        &self.references
    }

    /// The current order of item indices.
    #[must_use]
    pub fn order(&self) -> &[usize] {
        self.order.positions()
    }

    #[must_use]
    pub const fn sort(&self) -> Option<&SortSpec> {
        self.order.sort()
    }

    #[must_use]
    pub const fn filter(&self) -> Option<&FilterSpec> {
        self.order.filter()
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        self.store.items()
    }

    #[must_use]
    pub fn item(&self, idx: usize) -> Option<&Item> {
        self.store.get(idx)
    }

    /// Ends the session, returning the items with their labels.
    #[must_use]
    pub fn into_items(self) -> Vec<Item> {
        self.store.into_items()
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of item documents with a pending write-through.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.store.pending_writes()
    }

    /// The last received, uncleared action token.
    #[must_use]
    pub fn action_token(&self) -> Option<&str> {
        self.action_token.as_deref()
    }

    pub(crate) fn set_action_token(&mut self, token: Option<String>) -> bool {
        let changed = self.action_token != token;
        self.action_token = token;
        changed
    }

    /// Which controls are enabled.
    #[must_use]
    pub fn buttons(&self) -> Buttons {
        let active = || self.members.iter().filter(|member| member.is_active());
        Buttons {
            prev: self.order.first().is_some_and(|first| first != self.cursor),
            next: self.members.last().map(|member| member.idx) != self.order.last(),
            save: self.members.iter().any(|member| member.selected),
            config: self.config.allow_config_change,
            delete: active().any(|member| member.labeled),
            ignore: active().all(|member| !(member.ignored || member.labeled)),
            unignore: active().any(|member| member.ignored),
        }
    }

    /// Snapshot of the current batch for rendering.
    #[must_use]
    pub fn current_batch_view(&self) -> BatchSnapshot {
        let entries = self
            .members
            .iter()
            .map(|member| {
                let item = &self.store.items()[member.idx];
                BatchEntry {
                    idx: member.idx,
                    target: item.target.clone(),
                    media_type: member.media_type,
                    metadata: item.metadata.clone(),
                    selected: member.selected,
                    visible: member.visible,
                    labeled: member.labeled,
                    ignored: member.ignored,
                    labels: item.labels.clone(),
                }
            })
            .collect();

        BatchSnapshot {
            entries,
            media_type: self.media_type,
            references: self.references.clone(),
            labels: self.labels.clone(),
            buttons: self.buttons(),
            view_state: self.view_state,
            progress: self.progress,
            message: self.message.clone(),
            preload: self.preload.clone(),
            config: self.config.label_config.clone(),
        }
    }

    /// One page of the index table over the current order.
    #[must_use]
    pub fn index_view(&self, page: usize) -> IndexPage {
        index::build_page(
            self.store.items(),
            self.order.positions(),
            page,
            self.rows_per_page(),
            self.order.sort(),
            self.order.filter(),
        )
    }

    /// The index page last selected with [`set_page`](Self::set_page) or on
    /// entering the index view.
    #[must_use]
    pub fn current_index(&self) -> IndexPage {
        self.index_view(self.index_page)
    }

    /// Fuzzy-ranks items by target and metadata. Does not change the order.
    #[must_use]
    pub fn search(&self, query: &str, limit: Option<usize>) -> Vec<SearchHit> {
        search::search(self.store.items(), query, limit)
    }

    // ---- internals -----------------------------------------------------------

    fn rows_per_page(&self) -> usize {
        index::rows_per_page(self.config.max_view_height)
    }

    fn cursor_pos(&self) -> usize {
        self.order.position_of(self.cursor).unwrap_or(0)
    }

    /// Whether anything in the batch still awaits input.
    fn batch_pending(&self) -> bool {
        self.members
            .iter()
            .any(|member| member.visible || member.media_type.is_video_like())
    }

    /// Runs a transition and reports what it changed.
    ///
    /// The diff is computed even when the transition fails, but only returned
    /// on success; on failure the state is still fully updated.
    fn observe<F>(&mut self, operation: &'static str, transition: F) -> Result<SessionDiff>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let _span = tracing::debug_span!("transition", operation, cursor = self.cursor).entered();
        let before = Snapshot::of(self);
        let outcome = transition(self);
        let diff = before.diff(&Snapshot::of(self));

        match &outcome {
            Ok(()) => tracing::debug!(changed = ?diff.changed(), "transition complete"),
            Err(e) => tracing::error!(error = %e, changed = ?diff.changed(), "transition failed"),
        }
        outcome.map(|()| diff)
    }

    fn observe_infallible<F>(&mut self, operation: &'static str, edit: F) -> SessionDiff
    where
        F: FnOnce(&mut Self),
    {
        let _span = tracing::trace_span!("edit", operation).entered();
        let before = Snapshot::of(self);
        edit(self);
        before.diff(&Snapshot::of(self))
    }

    /// Re-applies pending sort/filter changes and keeps the cursor inside the
    /// order. Returns whether the order was recomputed.
    fn refresh_order(&mut self) -> bool {
        let refresh = self.order.refresh(self.store.items());
        if let Some(advisory) = refresh.advisory {
            self.message = Some(advisory);
        }
        if !refresh.recomputed {
            return false;
        }
        self.index_page = 0;
        if self.order.position_of(self.cursor).is_none() {
            if let Some(first) = self.order.first() {
                tracing::debug!(from = self.cursor, to = first, "cursor left the order");
                self.cursor = first;
            }
        }
        true
    }

    /// Applies an order change. The batch is rebuilt from the cursor whenever
    /// it no longer matches the new order.
    fn reorder(&mut self) -> Result<()> {
        let view_state = self.view_state;
        if !self.refresh_order() {
            return Ok(());
        }
        let expected = select_batch(
            self.order.positions(),
            self.store.items(),
            self.cursor_pos(),
            self.batch_size,
        );
        if expected == self.batch() {
            self.replan_preload();
        } else {
            tracing::debug!(from = ?self.batch(), to = ?expected, "rebuilding batch for new order");
            self.update(true)?;
            self.view_state = view_state;
        }
        Ok(())
    }

    /// Recomputes the batch and everything derived from it.
    fn update(&mut self, reset: bool) -> Result<()> {
        self.refresh_order();
        let cursor_pos = self.cursor_pos();
        let batch = select_batch(self.order.positions(), self.store.items(), cursor_pos, self.batch_size);
        let media_type = validate_batch(self.store.items(), &batch)?;

        if reset {
            self.view_state = ViewState::Transitioning;
        }

        let previous = std::mem::take(&mut self.members);
        let items = self.store.items();
        self.members = batch
            .iter()
            .map(|&idx| {
                let item = &items[idx];
                let kept = if reset {
                    None
                } else {
                    previous.iter().find(|member| member.idx == idx)
                };
                BatchMember {
                    idx,
                    media_type: item.media_type(),
                    selected: kept.map_or(true, |member| member.selected),
                    visible: kept.map_or(true, |member| member.visible),
                    labeled: item.is_labeled(),
                    ignored: item.is_ignored(),
                }
            })
            .collect();
        self.media_type = media_type;

        if reset {
            let targets: Vec<Option<&Target>> = batch.iter().map(|&idx| items[idx].target.as_ref()).collect();
            self.references = batch_references(self.resolver.as_ref(), media_type, &targets);
        }

        self.labels = self.active_payload();
        self.replan_preload();
        self.update_progress();

        if reset {
            self.view_state = ViewState::Labeling;
        }
        Ok(())
    }

    /// Labels of the first visible member, else its defaults, else an empty
    /// payload shaped for its type.
    fn active_payload(&self) -> Value {
        let Some(member) = self
            .members
            .iter()
            .find(|member| member.visible)
            .or_else(|| self.members.first())
        else {
            return MediaType::Image.empty_payload();
        };
        let item = &self.store.items()[member.idx];
        item.labels
            .clone()
            .or_else(|| item.defaults.clone())
            .unwrap_or_else(|| member.media_type.empty_payload())
    }

    fn replan_preload(&mut self) {
        let last_pos = self
            .members
            .last()
            .and_then(|member| self.order.position_of(member.idx))
            .unwrap_or_else(|| self.cursor_pos());
        self.preload = preload::plan(
            self.order.positions(),
            self.store.items(),
            last_pos,
            self.config.max_preload,
            self.resolver.as_ref(),
        );
    }

    fn update_progress(&mut self) {
        let before = self.progress;
        let after = self.store.progress();
        if after >= 100.0 && before < 100.0 {
            tracing::info!("all items labeled");
            self.message = Some(COMPLETION_MESSAGE.to_string());
        }
        self.progress = after;
    }

    fn flush(&mut self) -> Result<()> {
        let config = &self.config;
        let batch_size = self.batch_size;
        self.store.flush(self.backend.as_mut(), |items| {
            SessionDocument::snapshot(items, config, batch_size)
        })
    }

    fn go_next(&mut self) -> Result<()> {
        self.refresh_order();
        let last = self.members.last().map_or(self.cursor, |member| member.idx);
        if let Some(pos) = self.order.position_of(last) {
            if let Some(&next) = self.order.positions().get(pos + 1) {
                self.cursor = next;
            }
        }
        self.update(true)
    }

    fn go_prev(&mut self) -> Result<()> {
        self.refresh_order();
        let pos = self.cursor_pos();
        if pos > 0 {
            let landing = select_batch_backward(self.order.positions(), self.store.items(), pos, self.batch_size);
            self.cursor = self.order.positions()[landing];
        }
        self.update(true)
    }

    fn go_to_unlabeled(&mut self) -> Result<()> {
        self.refresh_order();
        let items = self.store.items();
        let unlabeled = self
            .order
            .positions()
            .iter()
            .copied()
            .find(|&idx| !items[idx].is_done());

        match unlabeled {
            Some(idx) => self.cursor = idx,
            None => {
                tracing::warn!("all items have already been labeled, starting from the beginning");
                self.message = Some(RESTART_MESSAGE.to_string());
                self.cursor = self.order.first().unwrap_or(0);
            }
        }
        self.update(true)
    }

    fn apply_save(&mut self) -> Result<()> {
        let payload = self.labels.clone();
        let mut saved = 0usize;
        for member in &mut self.members {
            if !member.is_active() {
                continue;
            }
            self.store.set_labels(member.idx, payload.clone());
            self.store.set_ignored(member.idx, false);
            if !member.media_type.is_video_like() {
                member.visible = false;
            }
            saved += 1;
        }
        tracing::info!(saved, "labels saved");

        let persisted = self.flush();
        if self.config.advance_on_save && !self.batch_pending() {
            self.go_next()?;
        } else {
            self.update(false)?;
        }
        persisted
    }

    fn apply_delete(&mut self) -> Result<()> {
        let mut deleted = 0usize;
        for member in &self.members {
            if member.is_active() && self.store.clear_labels(member.idx) {
                deleted += 1;
            }
        }
        tracing::info!(deleted, "labels deleted");

        let persisted = self.flush();
        self.update(false)?;
        persisted
    }

    fn apply_ignore(&mut self) -> Result<()> {
        let mut ignored = 0usize;
        for member in &mut self.members {
            if !member.is_active() {
                continue;
            }
            self.store.set_ignored(member.idx, true);
            self.store.clear_labels(member.idx);
            member.visible = false;
            ignored += 1;
        }
        tracing::info!(ignored, "items ignored");

        let persisted = self.flush();
        if self.batch_pending() {
            self.update(false)?;
        } else {
            self.go_next()?;
        }
        persisted
    }

    fn apply_unignore(&mut self) -> Result<()> {
        for member in &self.members {
            if member.is_active() {
                self.store.set_ignored(member.idx, false);
            }
        }
        let persisted = self.flush();
        self.update(false)?;
        persisted
    }
}

/// Reconciles supplied items with persisted ones and applies persisted
/// settings to `config`.
fn reconcile(items: Vec<Item>, config: &mut Config, backend: &dyn SessionBackend) -> Result<Vec<Item>> {
    let with_location = items.iter().filter(|item| item.jsonpath.is_some()).count();
    let mut items = items;

    if with_location > 0 {
        if with_location != items.len() {
            return Err(LabelerError::InvalidConfig(
                "either all items must have a jsonpath or none of them can".to_string(),
            ));
        }
        if backend.has_session_location() {
            return Err(LabelerError::InvalidConfig(
                "item-level and session-level locations cannot be combined".to_string(),
            ));
        }
        items = items
            .into_iter()
            .map(|item| {
                let persisted = match item.jsonpath.as_deref() {
                    Some(location) => backend.load_item(location)?,
                    None => None,
                };
                Ok(merge_item(persisted.as_ref().unwrap_or(&item), &item))
            })
            .collect::<Result<Vec<_>>>()?;
    }

    if backend.has_session_location() {
        if items
            .iter()
            .any(|item| item.target.as_ref().is_some_and(Target::is_raw))
        {
            return Err(LabelerError::InvalidConfig(
                "raw in-memory targets cannot be persisted to a session document".to_string(),
            ));
        }
        if let Some(mut document) = backend.load_session()? {
            tracing::info!(persisted = document.items.len(), "resuming persisted session");
            let persisted = std::mem::take(&mut document.items);
            items = merge_items(persisted, items)?;
            document.apply_to(config);
        }
    }
    Ok(items)
}

/// Values compared before and after a transition.
#[derive(Debug, Clone, PartialEq)]
struct Snapshot {
    cursor: usize,
    batch: Vec<usize>,
    flags: Vec<(bool, bool, bool, bool)>,
    labels: Value,
    view_state: ViewState,
    progress: f64,
    preload: Vec<String>,
    order: Vec<usize>,
    page: usize,
    message: Option<String>,
    buttons: Buttons,
    action_token: Option<String>,
    revision: u64,
}

impl Snapshot {
    fn of(session: &LabelingSession) -> Self {
        Self {
            cursor: session.cursor,
            batch: session.batch(),
            flags: session
                .members
                .iter()
                .map(|member| (member.selected, member.visible, member.labeled, member.ignored))
                .collect(),
            labels: session.labels.clone(),
            view_state: session.view_state,
            progress: session.progress,
            preload: session.preload.clone(),
            order: session.order.positions().to_vec(),
            page: session.index_page,
            message: session.message.clone(),
            buttons: session.buttons(),
            action_token: session.action_token.clone(),
            revision: session.store.revision(),
        }
    }

    fn diff(&self, after: &Self) -> SessionDiff {
        SessionDiff {
            cursor: self.cursor != after.cursor,
            batch: self.batch != after.batch,
            view_flags: self.flags != after.flags,
            labels: self.labels != after.labels,
            view_state: self.view_state != after.view_state,
            progress: self.progress.to_bits() != after.progress.to_bits(),
            preload: self.preload != after.preload,
            index: self.order != after.order || self.page != after.page,
            message: self.message != after.message,
            buttons: self.buttons != after.buttons,
            action: self.action_token != after.action_token,
            items: self.revision != after.revision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::order::SortDirection;
    use crate::storage::MemoryBackend;
    use serde_json::json;
    use std::path::Path;

    fn config(batch_size: usize) -> Config {
        Config {
            batch_size: Some(batch_size),
            ..Config::default()
        }
    }

    fn open(items: Vec<Item>, config: Config) -> LabelingSession {
        LabelingSession::open(
            items,
            config,
            Box::new(MemoryBackend::items_only()),
            Box::new(LocalResolver::default()),
        )
        .unwrap()
    }

    fn images(n: usize) -> Vec<Item> {
        (0..n).map(|i| Item::new(format!("{i}.jpg"))).collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn opens_at_first_unlabeled_item() {
        let mut items = images(4);
        items[0].labels = Some(json!({}));
        items[1].ignored = Some(true);
        let session = open(items, config(1));
        assert_eq!(session.cursor(), 2);
        assert_eq!(session.batch(), [2]);
        assert_eq!(session.view_state(), ViewState::Labeling);
        assert!(approx(session.progress(), 50.0));
        assert!(session.message().is_none());
    }

    #[test]
    fn fully_labeled_collection_starts_at_first_item_with_advisory() {
        let items: Vec<Item> = images(3).into_iter().map(|item| item.with_labels(json!({}))).collect();
        let session = open(items, config(1));
        assert_eq!(session.cursor(), 0);
        assert_eq!(session.message(), Some(RESTART_MESSAGE));
    }

    #[test]
    fn types_are_guessed_for_bare_targets() {
        let session = open(vec![Item::new("a.jpg"), Item::new("clip.MOV")], config(2));
        assert_eq!(session.items()[1].media_type, Some(MediaType::Video));
        assert_eq!(session.batch(), [0]);
    }

    #[test]
    fn navigates_images_and_video() {
        let mut items = images(4);
        items.push(Item::new("4.mp4"));
        let mut session = open(items, config(3));
        assert_eq!(session.batch(), [0, 1, 2]);

        session.next().unwrap();
        assert_eq!(session.batch(), [3]);
        session.next().unwrap();
        assert_eq!(session.batch(), [4]);
        assert_eq!(session.labels(), &json!([]));

        let diff = session.next().unwrap();
        assert_eq!(session.batch(), [4]);
        assert!(!diff.cursor);

        session.prev().unwrap();
        assert_eq!(session.batch(), [1, 2, 3]);
        session.prev().unwrap();
        assert_eq!(session.batch(), [0, 1, 2]);
    }

    #[test]
    fn buttons_track_position_and_selection() {
        let mut session = open(images(4), config(2));
        let buttons = session.buttons();
        assert!(!buttons.prev);
        assert!(buttons.next);
        assert!(buttons.save);
        assert!(buttons.ignore);
        assert!(!buttons.delete);
        assert!(buttons.config);

        session.next().unwrap();
        let buttons = session.buttons();
        assert!(buttons.prev);
        assert!(!buttons.next);

        session.set_selected(2, false);
        session.set_selected(3, false);
        assert!(!session.buttons().save);
    }

    #[test]
    fn save_labels_the_batch_and_advances() {
        let mut session = open(images(4), config(2));
        session.edit_labels(json!({"image": {"kind": ["cat"]}}));
        let diff = session.save().unwrap();

        assert!(session.items()[0].is_labeled());
        assert!(session.items()[1].is_labeled());
        assert_eq!(session.batch(), [2, 3]);
        assert!(approx(session.progress(), 50.0));
        assert!(diff.cursor && diff.items && diff.progress);
        assert_eq!(session.labels(), &json!({}));
    }

    #[test]
    fn save_without_advance_hides_saved_members() {
        let config = Config {
            advance_on_save: false,
            ..config(2)
        };
        let mut session = open(images(4), config);
        session.edit_labels(json!({"x": 1}));
        session.save().unwrap();

        assert_eq!(session.cursor(), 0);
        assert!(session.members().iter().all(|member| !member.visible && member.labeled));
    }

    #[test]
    fn partial_selection_keeps_unselected_members_pending() {
        let mut session = open(images(3), config(3));
        session.set_selected(1, false);
        session.edit_labels(json!({"x": 1}));
        session.save().unwrap();

        assert_eq!(session.cursor(), 0);
        assert!(session.items()[0].is_labeled());
        assert!(!session.items()[1].is_labeled());
        assert!(session.items()[2].is_labeled());
        let member = session.members()[1];
        assert!(member.visible && !member.selected);
        assert_eq!(session.labels(), &json!({}));
    }

    #[test]
    fn videos_stay_visible_after_save() {
        let mut session = open(vec![Item::new("a.mp4"), Item::new("b.mp4")], config(1));
        session.edit_labels(json!([{"timestamp": 1.5}]));
        session.save().unwrap();

        assert_eq!(session.cursor(), 0);
        assert!(session.members()[0].visible);
        assert_eq!(session.labels(), &json!([{"timestamp": 1.5}]));
    }

    #[test]
    fn defaults_seed_the_payload_without_labeling() {
        let items = vec![Item::new("a.jpg").with_defaults(json!({"image": {"kind": ["dog"]}}))];
        let session = open(items, config(1));
        assert_eq!(session.labels(), &json!({"image": {"kind": ["dog"]}}));
        assert!(!session.items()[0].is_labeled());
    }

    #[test]
    fn ignore_always_advances() {
        let config = Config {
            advance_on_save: false,
            ..config(1)
        };
        let items = vec![Item::new("a.jpg").with_labels(json!({})), Item::new("b.jpg")];
        let mut session = open(items, config);
        session.jump_to(0).unwrap();
        session.ignore().unwrap();

        let item = &session.items()[0];
        assert!(item.is_ignored() && !item.is_labeled());
        assert_eq!(session.cursor(), 1);
    }

    #[test]
    fn delete_and_unignore_keep_the_cursor() {
        let mut items = images(2);
        items[0].labels = Some(json!({"x": 1}));
        items[1].ignored = Some(true);
        let mut session = open(items, config(2));
        assert!(session.buttons().delete);
        assert!(session.buttons().unignore);
        assert!(!session.buttons().ignore);

        session.delete().unwrap();
        assert!(!session.items()[0].is_labeled());
        session.unignore().unwrap();
        assert!(!session.items()[1].is_ignored());
        assert_eq!(session.cursor(), 0);
        assert!(approx(session.progress(), 0.0));
    }

    #[test]
    fn progress_is_monotonic_under_save() {
        let mut session = open(images(5), config(2));
        let mut last = session.progress();
        for _ in 0..5 {
            session.save().unwrap();
            assert!(session.progress() >= last);
            last = session.progress();
        }
        assert!(approx(last, 100.0));
        assert_eq!(session.message(), Some(COMPLETION_MESSAGE));
    }

    #[test]
    fn unmatched_filter_keeps_order_and_sets_advisory() {
        let items: Vec<Item> = images(3)
            .into_iter()
            .map(|item| item.with_metadata("color", "blue"))
            .collect();
        let mut session = open(items, config(1));
        let diff = session.set_filter(Some(FilterSpec::new("color", "red"))).unwrap();

        assert_eq!(session.order(), [0, 1, 2]);
        assert_eq!(
            session.message(),
            Some("No rows matched the filter criteria (color: red).")
        );
        assert!(diff.message);
    }

    #[test]
    fn filter_moves_cursor_into_filtered_set() {
        let items: Vec<Item> = images(4)
            .into_iter()
            .enumerate()
            .map(|(i, item)| item.with_metadata("site", if i < 2 { "north" } else { "south" }))
            .collect();
        let mut session = open(items, config(1));
        assert_eq!(session.cursor(), 0);

        let diff = session.set_filter(Some(FilterSpec::new("site", "south"))).unwrap();
        assert_eq!(session.order(), [2, 3]);
        assert_eq!(session.cursor(), 2);
        assert!(diff.cursor && diff.batch && diff.index);

        session.set_filter(None).unwrap();
        assert_eq!(session.order(), [0, 1, 2, 3]);
        assert_eq!(session.cursor(), 2);
    }

    #[test]
    fn repeated_sort_is_a_no_op() {
        let items = vec![Item::new("b.jpg"), Item::new("a.jpg"), Item::new("c.jpg")];
        let mut session = open(items, config(1));
        let spec = SortSpec::new("target", SortDirection::Asc);

        let first = session.set_sort(Some(spec.clone())).unwrap();
        assert!(first.index);
        assert_eq!(session.order(), [1, 0, 2]);

        let second = session.set_sort(Some(spec)).unwrap();
        assert!(second.is_empty());
        assert_eq!(session.order(), [1, 0, 2]);
    }

    #[test]
    fn navigation_follows_the_sorted_order() {
        let items = vec![Item::new("b.jpg"), Item::new("a.jpg"), Item::new("c.jpg")];
        let mut session = open(items, config(1));
        session.set_sort(Some(SortSpec::new("target", SortDirection::Desc))).unwrap();
        assert_eq!(session.order(), [2, 0, 1]);

        session.jump_to(2).unwrap();
        session.next().unwrap();
        assert_eq!(session.cursor(), 0);
        session.next().unwrap();
        assert_eq!(session.cursor(), 1);
        assert!(!session.buttons().next);
    }

    #[test]
    fn sorting_rebuilds_a_stale_batch() {
        let mut session = open(images(4), config(2));
        assert_eq!(session.batch(), [0, 1]);

        session.set_sort(Some(SortSpec::new("target", SortDirection::Desc))).unwrap();
        assert_eq!(session.order(), [3, 2, 1, 0]);
        assert_eq!(session.cursor(), 0);
        assert_eq!(session.batch(), [0]);
        assert!(!session.buttons().next);

        session.prev().unwrap();
        assert_eq!(session.batch(), [2, 1]);
        session.prev().unwrap();
        assert_eq!(session.batch(), [3, 2]);
        session.next().unwrap();
        assert_eq!(session.batch(), [1, 0]);
    }

    #[test]
    fn filtering_drops_excluded_items_from_the_batch() {
        let items: Vec<Item> = images(4)
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let site = if i == 0 || i == 3 { "keep" } else { "skip" };
                item.with_metadata("site", site)
            })
            .collect();
        let mut session = open(items, config(3));
        assert_eq!(session.batch(), [0, 1, 2]);
        session.enter_index_view().unwrap();

        session.set_filter(Some(FilterSpec::new("site", "keep"))).unwrap();
        assert_eq!(session.order(), [0, 3]);
        assert_eq!(session.batch(), [0, 3]);
        assert_eq!(session.view_state(), ViewState::Index);

        session.save().unwrap();
        let labeled: Vec<usize> = (0..4).filter(|&i| session.items()[i].is_labeled()).collect();
        assert_eq!(labeled, [0, 3]);
    }

    #[test]
    fn reordering_keeps_a_batch_that_still_fits() {
        let mut session = open(images(3), config(2));
        session.set_selected(1, false);

        session.set_sort(Some(SortSpec::new("target", SortDirection::Asc))).unwrap();
        assert_eq!(session.batch(), [0, 1]);
        assert!(!session.members()[1].selected);
    }

    #[test]
    fn index_view_pages_around_the_cursor() {
        let config = Config {
            max_view_height: 140,
            ..config(1)
        };
        let mut items = images(10);
        for item in items.iter_mut().take(5) {
            item.labels = Some(json!({}));
        }
        let mut session = open(items, config);
        assert_eq!(session.cursor(), 5);

        session.enter_index_view().unwrap();
        assert_eq!(session.view_state(), ViewState::Index);
        let page = session.current_index();
        assert_eq!(page.page, 2);
        assert_eq!(page.rows_per_page, 2);
        assert_eq!(page.rows[0].idx, 4);

        session.set_page(99);
        assert_eq!(session.current_index().page, 4);

        session.jump_to(7).unwrap();
        assert_eq!(session.view_state(), ViewState::Labeling);
        assert_eq!(session.cursor(), 7);
    }

    #[test]
    fn soft_edits_preserve_member_flags() {
        let mut session = open(images(3), config(3));
        session.set_selected(0, false);
        let diff = session.edit_labels(json!({"x": 2}));
        assert_eq!(diff.changed(), ["labels"]);
        assert!(!session.members()[0].selected);

        session.set_visible(1, false);
        assert!(!session.members()[1].visible);
    }

    #[test]
    fn reset_restores_member_flags() {
        let mut session = open(images(3), config(3));
        session.set_selected(0, false);
        session.enter_labeling_view().unwrap();
        assert!(session.members()[0].selected);
    }

    #[test]
    fn preload_follows_the_batch() {
        let items: Vec<Item> = (0..6)
            .map(|i| Item::new(format!("https://media.example/{i}.jpg")))
            .collect();
        let session = open(items, config(2));
        assert_eq!(
            session.preload(),
            [
                "https://media.example/2.jpg",
                "https://media.example/3.jpg",
                "https://media.example/4.jpg"
            ]
        );
        assert_eq!(session.references()[0], json!("https://media.example/0.jpg"));
    }

    #[test]
    fn persistence_failure_keeps_memory_state() {
        let mut backend = MemoryBackend::new();
        backend.set_fail_writes(true);
        let mut session = LabelingSession::open(
            images(2),
            config(1),
            Box::new(backend),
            Box::new(LocalResolver::default()),
        )
        .unwrap();

        let err = session.save().unwrap_err();
        assert!(matches!(err, LabelerError::Persistence { .. }));
        assert!(session.items()[0].is_labeled());
        assert_eq!(session.cursor(), 1);
    }

    #[test]
    fn item_locations_are_merged_with_persisted_copies() {
        let location = Path::new("/labels/a.json");
        let backend = MemoryBackend::items_only()
            .with_item(location, Item::new("a.jpg").with_labels(json!({"x": 1})));
        let items = vec![
            Item::new("a.jpg").with_jsonpath(location),
            Item::new("b.jpg").with_jsonpath("/labels/b.json"),
        ];
        let session = LabelingSession::open(
            items,
            config(1),
            Box::new(backend),
            Box::new(LocalResolver::default()),
        )
        .unwrap();
        assert_eq!(session.items()[0].labels, Some(json!({"x": 1})));
        assert_eq!(session.cursor(), 1);
    }

    #[test]
    fn resumes_from_a_persisted_session_document() {
        let persisted_config = Config {
            mode: "dark".to_string(),
            ..Config::default()
        };
        let document = SessionDocument::snapshot(
            &[Item::new("a.jpg").with_labels(json!({"x": 1}))],
            &persisted_config,
            2,
        );
        let backend = MemoryBackend::new().with_session(document);
        let session = LabelingSession::open(
            vec![Item::new("a.jpg").with_metadata("site", "north"), Item::new("b.jpg")],
            Config::default(),
            Box::new(backend),
            Box::new(LocalResolver::default()),
        )
        .unwrap();

        assert_eq!(session.items().len(), 2);
        assert!(session.items()[0].is_labeled());
        assert_eq!(session.items()[0].metadata["site"], "north");
        assert_eq!(session.config().mode, "dark");
        assert_eq!(session.batch_size(), 2);
        assert_eq!(session.cursor(), 1);
    }

    #[test]
    fn construction_errors() {
        let open_with = |items: Vec<Item>, backend: MemoryBackend| {
            LabelingSession::open(items, config(1), Box::new(backend), Box::new(LocalResolver::default()))
        };

        assert!(matches!(
            open_with(vec![], MemoryBackend::items_only()),
            Err(LabelerError::EmptyCollection)
        ));
        assert!(matches!(
            open_with(vec![Item::new("a.jpg").with_metadata("labels", "x")], MemoryBackend::items_only()),
            Err(LabelerError::ReservedField(_))
        ));
        assert!(matches!(
            open_with(
                vec![Item::new("a.jpg").with_jsonpath("/a.json"), Item::new("b.jpg")],
                MemoryBackend::items_only()
            ),
            Err(LabelerError::InvalidConfig(_))
        ));
        assert!(matches!(
            open_with(vec![Item::new("a.jpg").with_jsonpath("/a.json")], MemoryBackend::new()),
            Err(LabelerError::InvalidConfig(_))
        ));

        let raw = Item {
            target: Some(Target::Raw(json!([[0, 0], [0, 0]]))),
            ..Item::default()
        };
        assert!(matches!(
            open_with(vec![raw], MemoryBackend::new()),
            Err(LabelerError::InvalidConfig(_))
        ));
        assert!(matches!(
            LabelingSession::open(
                images(1),
                config(0),
                Box::new(MemoryBackend::items_only()),
                Box::new(LocalResolver::default())
            ),
            Err(LabelerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn batch_view_reports_members() {
        let session = open(images(2), config(2));
        let view = session.current_batch_view();
        assert_eq!(view.entries.len(), 2);
        assert_eq!(view.entries[1].idx, 1);
        assert!(view.entries.iter().all(|entry| entry.selected && entry.visible));
        assert_eq!(view.config, json!({"image": [], "regions": []}));
    }

    #[test]
    fn search_does_not_touch_the_order() {
        let items = vec![Item::new("dog.jpg"), Item::new("cat.jpg")];
        let session = open(items, config(1));
        let hits = session.search("cat", None);
        assert_eq!(hits[0].idx, 1);
        assert_eq!(session.order(), [0, 1]);
    }
}
