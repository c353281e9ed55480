//! Index (browse) table computation.
//!
//! The index view pages through the current order. Besides the four synthetic
//! columns it shows up to [`MAX_METADATA_COLUMNS`] metadata keys, chosen
//! alphabetically from the union of keys across the collection so that columns
//! stay the same from page to page.

use crate::app::order::{FilterSpec, SortSpec};
use crate::domain::{Item, Metadata};
use crate::ui::viewmodel::{Column, ColumnKind, IndexPage, IndexRow};
use serde_json::Value;
use std::collections::BTreeSet;

/// Metadata keys shown as index columns.
pub const MAX_METADATA_COLUMNS: usize = 5;

/// Approximate pixel height of one index row.
const ROW_HEIGHT: u32 = 70;

/// Rows that fit in the configured view height, at least one.
#[must_use]
pub const fn rows_per_page(max_view_height: u32) -> usize {
    let rows = max_view_height.saturating_add(ROW_HEIGHT / 2) / ROW_HEIGHT;
    if rows == 0 {
        1
    } else {
        rows as usize
    }
}

/// Builds one page of the index table over `order`.
///
/// `page` is clamped to the last page.
#[must_use]
pub fn build_page(
    items: &[Item],
    order: &[usize],
    page: usize,
    rows_per_page: usize,
    sort: Option<&SortSpec>,
    filter: Option<&FilterSpec>,
) -> IndexPage {
    let rows_per_page = rows_per_page.max(1);
    let last_page = order.len().saturating_sub(1) / rows_per_page;
    let page = page.min(last_page);
    let keys = metadata_keys(items);

    let rows = order
        .iter()
        .skip(page * rows_per_page)
        .take(rows_per_page)
        .map(|&idx| row(idx, &items[idx], &keys))
        .collect();

    IndexPage {
        rows,
        columns: columns(items, &keys),
        page,
        rows_per_page,
        row_count: order.len(),
        sort: sort.cloned(),
        filter: filter.cloned(),
    }
}

/// Page that contains order position `pos`.
#[must_use]
pub const fn page_of(pos: usize, rows_per_page: usize) -> usize {
    if rows_per_page == 0 {
        0
    } else {
        pos / rows_per_page
    }
}

fn metadata_keys(items: &[Item]) -> Vec<String> {
    items
        .iter()
        .flat_map(|item| item.metadata.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .take(MAX_METADATA_COLUMNS)
        .cloned()
        .collect()
}

fn row(idx: usize, item: &Item, keys: &[String]) -> IndexRow {
    let yes_no = |flag: bool| if flag { "Yes" } else { "No" }.to_string();
    let metadata: Metadata = keys
        .iter()
        .map(|key| (key.clone(), item.metadata.get(key).cloned().unwrap_or(Value::Null)))
        .collect();
    IndexRow {
        idx,
        target: item.target_repr(),
        labeled: yes_no(item.is_done()),
        ignored: yes_no(item.is_ignored()),
        labels: item.label_summary(),
        metadata,
    }
}

fn columns(items: &[Item], keys: &[String]) -> Vec<Column> {
    let synthetic = [
        ("target", "Target"),
        ("labeled", "Labeled"),
        ("ignored", "Ignored"),
        ("labels", "Labels"),
    ];
    let mut columns: Vec<Column> = synthetic
        .iter()
        .map(|(field, header)| Column {
            field: (*field).to_string(),
            kind: ColumnKind::String,
            header_name: Some((*header).to_string()),
        })
        .collect();

    columns.extend(keys.iter().map(|key| {
        let numeric = items
            .iter()
            .filter_map(|item| item.metadata.get(key))
            .all(Value::is_number);
        Column {
            field: key.clone(),
            kind: if numeric { ColumnKind::Number } else { ColumnKind::String },
            header_name: None,
        }
    }));
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items() -> Vec<Item> {
        (0..7)
            .map(|i| {
                Item::new(format!("{i}.jpg"))
                    .with_metadata("n", i)
                    .with_metadata("site", if i % 2 == 0 { "north" } else { "south" })
            })
            .collect()
    }

    #[test]
    fn page_size_follows_view_height() {
        assert_eq!(rows_per_page(512), 7);
        assert_eq!(rows_per_page(700), 10);
        assert_eq!(rows_per_page(10), 1);
        assert_eq!(rows_per_page(u32::MAX), (u32::MAX / 70) as usize);
    }

    #[test]
    fn pages_through_the_order() {
        let items = items();
        let order: Vec<usize> = (0..items.len()).rev().collect();
        let page = build_page(&items, &order, 1, 3, None, None);
        let idxs: Vec<usize> = page.rows.iter().map(|row| row.idx).collect();
        assert_eq!(idxs, [3, 2, 1]);
        assert_eq!(page.row_count, 7);
        assert_eq!(page.page_count(), 3);

        let clamped = build_page(&items, &order, 9, 3, None, None);
        assert_eq!(clamped.page, 2);
        assert_eq!(clamped.rows.len(), 1);
    }

    #[test]
    fn rows_summarize_label_state() {
        let mut items = items();
        items[0].labels = Some(json!({"image": {"kind": ["cat", "dog"]}}));
        items[1].ignored = Some(true);
        let order: Vec<usize> = (0..items.len()).collect();
        let page = build_page(&items, &order, 0, 2, None, None);

        assert_eq!(page.rows[0].labeled, "Yes");
        assert_eq!(page.rows[0].labels, "kind: cat, dog");
        assert_eq!(page.rows[1].labeled, "Yes");
        assert_eq!(page.rows[1].ignored, "Yes");
        assert_eq!(page.rows[1].metadata["site"], "south");
    }

    #[test]
    fn metadata_columns_are_typed() {
        let mut items = items();
        items.push(Item::new("x.jpg").with_metadata("n", "seven"));
        let order: Vec<usize> = (0..items.len()).collect();
        let page = build_page(&items, &order, 0, 5, None, None);

        let fields: Vec<&str> = page.columns.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, ["target", "labeled", "ignored", "labels", "n", "site"]);
        assert_eq!(page.columns[4].kind, ColumnKind::String);

        let numeric = build_page(&self::items(), &order[..7], 0, 5, None, None);
        assert_eq!(numeric.columns[4].kind, ColumnKind::Number);
    }

    #[test]
    fn at_most_five_metadata_columns() {
        let item = (0..8).fold(Item::new("a.jpg"), |item, i| item.with_metadata(format!("k{i}"), i));
        let page = build_page(&[item], &[0], 0, 5, None, None);
        assert_eq!(page.columns.len(), 4 + MAX_METADATA_COLUMNS);
        assert_eq!(page.rows[0].metadata.len(), MAX_METADATA_COLUMNS);
    }

    #[test]
    fn empty_order_yields_an_empty_first_page() {
        let page = build_page(&items(), &[], 3, 5, None, None);
        assert_eq!(page.page, 0);
        assert!(page.rows.is_empty());
        assert_eq!(page.page_count(), 1);
    }
}
