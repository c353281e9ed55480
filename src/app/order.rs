//! Sort and filter index over the item collection.
//!
//! [`OrderIndex`] derives the navigable permutation of item positions from at
//! most one [`SortSpec`] and at most one [`FilterSpec`]. Specs are stored
//! eagerly but applied lazily: [`OrderIndex::refresh`] compares the stored
//! specs against the last-applied snapshots and only recomputes the stages
//! that changed.
//!
//! # Projection
//!
//! Sorting and filtering read the same synthetic fields the index table shows:
//!
//! | field      | sort key                   | filter text            |
//! |------------|----------------------------|------------------------|
//! | `target`   | target representation      | target representation  |
//! | `labeled`  | labeled or ignored         | `Yes` / `No`           |
//! | `ignored`  | ignore flag                | `Yes` / `No`           |
//! | `labels`   | label summary              | label summary          |
//! | other      | metadata value             | metadata value as text |
//!
//! Missing values sort before everything else.

use crate::domain::error::{LabelerError, Result};
use crate::domain::{display_value, Item};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Synthetic columns that metadata keys may not shadow.
pub const RESERVED_FIELDS: [&str; 4] = ["target", "labeled", "ignored", "labels"];

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Single-column sort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    #[must_use]
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Single-column, case-sensitive substring filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub field: String,
    pub value: String,
}

impl FilterSpec {
    #[must_use]
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// A projected sort key.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Missing,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Projects `field` of `item` into a sort key.
    #[must_use]
    pub fn project(item: &Item, field: &str) -> Self {
        match field {
            "target" => Self::Text(item.target_repr()),
            "labeled" => Self::Bool(item.is_done()),
            "ignored" => Self::Bool(item.is_ignored()),
            "labels" => Self::Text(item.label_summary()),
            key => match item.metadata.get(key) {
                None | Some(Value::Null) => Self::Missing,
                Some(Value::Bool(flag)) => Self::Bool(*flag),
                Some(Value::Number(number)) => number.as_f64().map_or(Self::Missing, Self::Number),
                Some(Value::String(text)) => Self::Text(text.clone()),
                Some(other) => Self::Text(other.to_string()),
            },
        }
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Missing => 0,
            Self::Bool(_) => 1,
            Self::Number(_) => 2,
            Self::Text(_) => 3,
        }
    }

    /// Total order: missing, then booleans, numbers and text, each by value.
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Text a filter value is matched against. `None` never matches.
#[must_use]
pub fn filter_text(item: &Item, field: &str) -> Option<String> {
    let yes_no = |flag: bool| if flag { "Yes" } else { "No" }.to_string();
    match field {
        "target" => Some(item.target_repr()),
        "labeled" => Some(yes_no(item.is_done())),
        "ignored" => Some(yes_no(item.is_ignored())),
        "labels" => Some(item.label_summary()),
        key => item
            .metadata
            .get(key)
            .filter(|value| !value.is_null())
            .map(display_value),
    }
}

/// Rejects metadata keys that shadow a synthetic column.
///
/// # Errors
///
/// Returns [`LabelerError::ReservedField`] naming the first offending key.
pub fn check_reserved_fields(items: &[Item]) -> Result<()> {
    for item in items {
        if let Some(key) = item
            .metadata
            .keys()
            .find(|key| RESERVED_FIELDS.contains(&key.as_str()))
        {
            return Err(LabelerError::ReservedField(key.clone()));
        }
    }
    Ok(())
}

/// What a [`OrderIndex::refresh`] call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Refresh {
    /// The permutation was recomputed (it may still be equal to the old one).
    pub recomputed: bool,
    /// Advisory shown when the filter matched nothing and was not applied.
    pub advisory: Option<String>,
}

/// Cached permutation of item positions after sort and filter.
#[derive(Debug, Clone)]
pub struct OrderIndex {
    sort: Option<SortSpec>,
    filter: Option<FilterSpec>,
    applied_sort: Option<SortSpec>,
    applied_filter: Option<FilterSpec>,
    sorted: Vec<usize>,
    order: Vec<usize>,
}

impl OrderIndex {
    /// Identity order over `len` items.
    #[must_use]
    pub fn new(len: usize) -> Self {
        let identity: Vec<usize> = (0..len).collect();
        Self {
            sort: None,
            filter: None,
            applied_sort: None,
            applied_filter: None,
            sorted: identity.clone(),
            order: identity,
        }
    }

    #[must_use]
    pub const fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    #[must_use]
    pub const fn filter(&self) -> Option<&FilterSpec> {
        self.filter.as_ref()
    }

    /// Stores a sort spec; applied on the next [`refresh`](Self::refresh).
    pub fn set_sort(&mut self, sort: Option<SortSpec>) {
        self.sort = sort;
    }

    /// Stores a filter spec; applied on the next [`refresh`](Self::refresh).
    ///
    /// A filter with an empty value is the same as no filter.
    pub fn set_filter(&mut self, filter: Option<FilterSpec>) {
        self.filter = filter.filter(|spec| !spec.value.is_empty());
    }

    /// Whether a stored spec differs from its applied snapshot.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.sort != self.applied_sort || self.filter != self.applied_filter
    }

    /// Re-applies whichever stages changed since the last refresh.
    ///
    /// A sort change re-runs both stages; a filter-only change reuses the
    /// sorted permutation. A filter that matches nothing leaves the sorted
    /// permutation in place and reports an advisory.
    pub fn refresh(&mut self, items: &[Item]) -> Refresh {
        let sort_changed = self.sort != self.applied_sort;
        let filter_changed = self.filter != self.applied_filter;
        if !sort_changed && !filter_changed {
            return Refresh::default();
        }

        let _span = tracing::debug_span!("order_refresh",
            sort = ?self.sort,
            filter = ?self.filter,
            sort_changed,
            filter_changed
        )
        .entered();

        if sort_changed {
            self.sorted = sort_positions(items, self.sort.as_ref());
            self.applied_sort.clone_from(&self.sort);
        }

        let mut advisory = None;
        self.order = match &self.filter {
            None => self.sorted.clone(),
            Some(spec) => {
                let filtered: Vec<usize> = self
                    .sorted
                    .iter()
                    .copied()
                    .filter(|&idx| {
                        filter_text(&items[idx], &spec.field).is_some_and(|text| text.contains(&spec.value))
                    })
                    .collect();
                if filtered.is_empty() {
                    let message = format!(
                        "No rows matched the filter criteria ({}: {}).",
                        spec.field, spec.value
                    );
                    tracing::info!(field = %spec.field, value = %spec.value, "filter matched nothing");
                    advisory = Some(message);
                    self.sorted.clone()
                } else {
                    filtered
                }
            }
        };
        self.applied_filter.clone_from(&self.filter);

        tracing::debug!(len = self.order.len(), "order recomputed");
        Refresh {
            recomputed: true,
            advisory,
        }
    }

    /// The current permutation.
    #[must_use]
    pub fn positions(&self) -> &[usize] {
        &self.order
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Position of an item within the permutation, if present.
    #[must_use]
    pub fn position_of(&self, idx: usize) -> Option<usize> {
        self.order.iter().position(|&candidate| candidate == idx)
    }

    #[must_use]
    pub fn first(&self) -> Option<usize> {
        self.order.first().copied()
    }

    #[must_use]
    pub fn last(&self) -> Option<usize> {
        self.order.last().copied()
    }
}

/// Stable sort of all positions by the projected key.
fn sort_positions(items: &[Item], spec: Option<&SortSpec>) -> Vec<usize> {
    let mut positions: Vec<usize> = (0..items.len()).collect();
    let Some(spec) = spec else {
        return positions;
    };

    let keys: Vec<FieldValue> = items
        .iter()
        .map(|item| FieldValue::project(item, &spec.field))
        .collect();
    match spec.direction {
        SortDirection::Asc => positions.sort_by(|&a, &b| keys[a].total_cmp(&keys[b])),
        SortDirection::Desc => positions.sort_by(|&a, &b| keys[b].total_cmp(&keys[a])),
    }
    positions
}
