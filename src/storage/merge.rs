//! Reconciling merge of two item lists.
//!
//! Used when a session is reopened: the items persisted last time are merged
//! with the items the caller supplies now. Items are matched by
//! [`Fingerprint`]. Fresh metadata wins, prior labeling work survives.

use crate::domain::error::{LabelerError, Result};
use crate::domain::{Fingerprint, Item};
use std::collections::HashMap;

/// Merges a single item pair.
///
/// `incoming` overrides `target`, `type`, `metadata`, `defaults`, `ignored` and
/// `jsonpath` wherever it supplies a value. `labels` are taken from `incoming`
/// only when it explicitly carries them; otherwise the existing labels are kept.
#[must_use]
pub fn merge_item(existing: &Item, incoming: &Item) -> Item {
    let mut merged = existing.clone();
    if incoming.target.is_some() {
        merged.target.clone_from(&incoming.target);
    }
    if incoming.media_type.is_some() {
        merged.media_type = incoming.media_type;
    }
    if !incoming.metadata.is_empty() {
        merged.metadata.clone_from(&incoming.metadata);
    }
    if incoming.defaults.is_some() {
        merged.defaults.clone_from(&incoming.defaults);
    }
    if incoming.ignored.is_some() {
        merged.ignored = incoming.ignored;
    }
    if incoming.jsonpath.is_some() {
        merged.jsonpath.clone_from(&incoming.jsonpath);
    }
    if incoming.labels.is_some() {
        merged.labels.clone_from(&incoming.labels);
    }
    merged
}

/// Merges two item lists keyed by fingerprint.
///
/// The result keeps the order of `existing`, followed by items only present in
/// `incoming` in their original order. An empty side returns the other side
/// unchanged.
///
/// # Errors
///
/// - [`LabelerError::UnhashableKey`] if an item cannot be fingerprinted
/// - [`LabelerError::MergeConflict`] if one list holds the same key twice
///
/// # Examples
///
/// ```
/// use batchlabel::Item;
/// use batchlabel::storage::merge_items;
/// use serde_json::json;
///
/// let existing = vec![Item::new("a.jpg").with_labels(json!({"image": {}}))];
/// let incoming = vec![Item::new("a.jpg").with_metadata("site", "north"), Item::new("b.jpg")];
///
/// let merged = merge_items(existing, incoming)?;
/// assert_eq!(merged.len(), 2);
/// assert!(merged[0].is_labeled());
/// assert_eq!(merged[0].metadata["site"], "north");
/// # Ok::<(), batchlabel::LabelerError>(())
/// ```
pub fn merge_items(existing: Vec<Item>, incoming: Vec<Item>) -> Result<Vec<Item>> {
    let _span = tracing::debug_span!("merge_items",
        existing = existing.len(),
        incoming = incoming.len()
    )
    .entered();

    let existing_keys = fingerprints(&existing)?;
    let incoming_keys = fingerprints(&incoming)?;

    if existing.is_empty() {
        return Ok(incoming);
    }
    if incoming.is_empty() {
        return Ok(existing);
    }

    let mut incoming_by_key: HashMap<&Fingerprint, &Item> =
        incoming_keys.iter().zip(incoming.iter()).collect();

    let mut combined = Vec::with_capacity(existing.len() + incoming.len());
    let mut updated = 0usize;
    for (key, item) in existing_keys.iter().zip(existing.iter()) {
        match incoming_by_key.remove(key) {
            Some(fresh) => {
                updated += 1;
                combined.push(merge_item(item, fresh));
            }
            None => combined.push(item.clone()),
        }
    }

    let mut inserted = 0usize;
    for (key, item) in incoming_keys.iter().zip(incoming.iter()) {
        if incoming_by_key.contains_key(key) {
            inserted += 1;
            combined.push(item.clone());
        }
    }

    tracing::debug!(
        total = combined.len(),
        updated = updated,
        inserted = inserted,
        "item lists merged"
    );
    Ok(combined)
}

/// Fingerprints every item, rejecting duplicate keys within one list.
fn fingerprints(items: &[Item]) -> Result<Vec<Fingerprint>> {
    let keys = items.iter().map(Item::fingerprint).collect::<Result<Vec<_>>>()?;

    let mut seen = HashMap::with_capacity(keys.len());
    for (position, key) in keys.iter().enumerate() {
        if let Some(first) = seen.insert(key, position) {
            return Err(LabelerError::MergeConflict(format!(
                "items {first} and {position} share the key {key}"
            )));
        }
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MediaType, Metadata};
    use serde_json::json;

    fn by_id(id: &str) -> Item {
        Item::from_metadata(Metadata::new()).with_metadata("id", id)
    }

    #[test]
    fn empty_existing_is_identity() {
        let incoming = vec![Item::new("a.jpg"), Item::new("b.jpg")];
        assert_eq!(merge_items(vec![], incoming.clone()).unwrap(), incoming);
    }

    #[test]
    fn empty_incoming_is_identity() {
        let existing = vec![Item::new("a.jpg").with_labels(json!({}))];
        assert_eq!(merge_items(existing.clone(), vec![]).unwrap(), existing);
    }

    #[test]
    fn empty_side_still_checks_keys() {
        let nested = vec![Item::from_metadata(Metadata::new()).with_metadata("box", json!([1, 2]))];
        assert!(matches!(
            merge_items(vec![], nested.clone()),
            Err(LabelerError::UnhashableKey(_))
        ));
        assert!(matches!(
            merge_items(nested, vec![]),
            Err(LabelerError::UnhashableKey(_))
        ));
    }

    #[test]
    fn metadata_keyed_merge_keeps_labels() {
        let existing = vec![by_id("a").with_labels(json!({"x": 1}))];
        let incoming = vec![by_id("a").with_defaults(json!({"x": 0}))];

        let merged = merge_items(existing, incoming).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].labels, Some(json!({"x": 1})));
        assert_eq!(merged[0].defaults, Some(json!({"x": 0})));
    }

    #[test]
    fn incoming_overrides_descriptive_fields() {
        let existing = vec![Item::new("a.jpg")
            .with_metadata("site", "old")
            .with_labels(json!({"image": {}}))];
        let mut fresh = Item::new("a.jpg")
            .with_type(MediaType::Image)
            .with_metadata("site", "new");
        fresh.ignored = Some(true);

        let merged = merge_items(existing, vec![fresh]).unwrap();
        assert_eq!(merged[0].metadata["site"], "new");
        assert_eq!(merged[0].ignored, Some(true));
        assert!(merged[0].is_labeled());
    }

    #[test]
    fn unset_ignore_flag_does_not_clobber_persisted_one() {
        let mut persisted = Item::new("a.jpg");
        persisted.ignored = Some(true);
        let merged = merge_items(vec![persisted], vec![Item::new("a.jpg")]).unwrap();
        assert!(merged[0].is_ignored());
    }

    #[test]
    fn explicit_incoming_labels_replace_existing() {
        let existing = vec![Item::new("a.jpg").with_labels(json!({"x": 1}))];
        let incoming = vec![Item::new("a.jpg").with_labels(json!({"x": 2}))];
        let merged = merge_items(existing, incoming).unwrap();
        assert_eq!(merged[0].labels, Some(json!({"x": 2})));
    }

    #[test]
    fn preserves_existing_order_then_appends_new() {
        let existing = vec![Item::new("b.jpg"), Item::new("a.jpg")];
        let incoming = vec![Item::new("c.jpg"), Item::new("a.jpg"), Item::new("d.jpg")];
        let merged = merge_items(existing, incoming).unwrap();
        let targets: Vec<String> = merged.iter().map(Item::target_repr).collect();
        assert_eq!(targets, ["b.jpg", "a.jpg", "c.jpg", "d.jpg"]);
    }

    #[test]
    fn nested_metadata_cannot_be_merged() {
        let existing = vec![by_id("a")];
        let incoming = vec![by_id("b").with_metadata("extra", json!([1, 2]))];
        assert!(matches!(
            merge_items(existing, incoming),
            Err(LabelerError::UnhashableKey(_))
        ));
    }

    #[test]
    fn duplicate_keys_are_a_conflict() {
        let existing = vec![Item::new("a.jpg"), Item::new("a.jpg")];
        assert!(matches!(
            merge_items(existing, vec![Item::new("b.jpg")]),
            Err(LabelerError::MergeConflict(_))
        ));
    }
}
