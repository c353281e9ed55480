//! Fuzzy search over the item collection.
//!
//! Search never changes the order; it only ranks items so the UI can offer a
//! jump target. Each item is matched on its target representation and on every
//! metadata value, and its best-scoring field wins.

use crate::domain::{display_value, Item};
use crate::ui::viewmodel::SearchHit;
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

/// Ranks items against `query`, best match first.
///
/// Ties are broken by collection position. An empty or whitespace-only query
/// matches nothing.
#[must_use]
pub fn search(items: &[Item], query: &str, limit: Option<usize>) -> Vec<SearchHit> {
    let query = query.trim();
    let _span = tracing::debug_span!("search", items = items.len(), query_len = query.len()).entered();
    if query.is_empty() {
        return Vec::new();
    }

    let matcher = SkimMatcherV2::default();
    let mut hits: Vec<SearchHit> = items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| best_match(&matcher, idx, item, query))
        .collect();

    hits.sort_by(|a, b| b.score.cmp(&a.score).then(a.idx.cmp(&b.idx)));
    if let Some(limit) = limit {
        hits.truncate(limit);
    }

    tracing::debug!(hits = hits.len(), "search complete");
    hits
}

fn best_match(matcher: &SkimMatcherV2, idx: usize, item: &Item, query: &str) -> Option<SearchHit> {
    let fields = std::iter::once(("target".to_string(), item.target_repr())).chain(
        item.metadata
            .iter()
            .map(|(key, value)| (key.clone(), display_value(value))),
    );

    fields
        .filter(|(_, text)| !text.is_empty())
        .filter_map(|(field, text)| {
            let (score, indices) = matcher.fuzzy_indices(&text, query)?;
            Some(SearchHit {
                idx,
                score,
                field,
                text,
                highlight_ranges: highlight_ranges(&indices),
            })
        })
        .max_by(|a, b| a.score.cmp(&b.score).then(b.field.cmp(&a.field)))
}

/// Coalesces matched character indices into `(start, end)` runs, end exclusive.
#[must_use]
pub fn highlight_ranges(indices: &[usize]) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = None;
    let mut prev = None;

    for &idx in indices {
        match (start, prev) {
            (Some(_), Some(p)) if idx == p + 1 => {
                prev = Some(idx);
            }
            (Some(s), Some(p)) => {
                ranges.push((s, p + 1));
                start = Some(idx);
                prev = Some(idx);
            }
            _ => {
                start = Some(idx);
                prev = Some(idx);
            }
        }
    }

    if let (Some(s), Some(p)) = (start, prev) {
        ranges.push((s, p + 1));
    }
    ranges
}
