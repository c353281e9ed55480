//! Batch selection.
//!
//! A batch is a run of consecutive positions in the [`OrderIndex`] order
//! starting at the cursor. Only images may share a batch: the first member is
//! always taken, and the walk stops before the first item that would put a
//! non-image into a multi-item batch.
//!
//! [`OrderIndex`]: crate::app::order::OrderIndex

use crate::domain::error::{LabelerError, Result};
use crate::domain::{Item, MediaType};

/// Item indices of the batch starting at order position `cursor_pos`.
///
/// Returns an empty batch only for an empty order. Out-of-range positions
/// are clamped to the last position.
#[must_use]
pub fn select_batch(order: &[usize], items: &[Item], cursor_pos: usize, batch_size: usize) -> Vec<usize> {
    if order.is_empty() {
        return Vec::new();
    }
    let start = cursor_pos.min(order.len() - 1);
    let end = (start + batch_size.max(1)).min(order.len());

    let mut batch = Vec::with_capacity(end - start);
    let mut includes_non_image = false;
    for (count, &idx) in order[start..end].iter().enumerate() {
        includes_non_image |= !items[idx].media_type().is_batchable();
        if count > 0 && includes_non_image {
            break;
        }
        batch.push(idx);
    }
    batch
}

/// Order position where the batch before `cursor_pos` starts.
///
/// Walks back at most `batch_size` positions. The step immediately before the
/// cursor is always taken; once a non-image has been seen any further step
/// is refused and the walk lands one position forward, so the landing batch
/// never mixes a non-image with anything else.
#[must_use]
pub fn select_batch_backward(order: &[usize], items: &[Item], cursor_pos: usize, batch_size: usize) -> usize {
    let cursor_pos = cursor_pos.min(order.len());
    let floor = cursor_pos.saturating_sub(batch_size.max(1));

    let mut landing = cursor_pos;
    let mut includes_non_image = false;
    for (count, pos) in (floor..cursor_pos).rev().enumerate() {
        includes_non_image |= !items[order[pos]].media_type().is_batchable();
        if count > 0 && includes_non_image {
            return pos + 1;
        }
        landing = pos;
    }
    landing
}

/// Checks that a batch is homogeneous and returns its media type.
///
/// # Errors
///
/// - [`LabelerError::HeterogeneousBatch`] if members have different types
/// - [`LabelerError::NonImageBatch`] if a non-image type has more than one member
pub fn validate_batch(items: &[Item], batch: &[usize]) -> Result<MediaType> {
    let mut types: Vec<MediaType> = batch.iter().map(|&idx| items[idx].media_type()).collect();
    let media_type = types.first().copied().unwrap_or_default();
    types.sort_unstable();
    types.dedup();

    if types.len() > 1 {
        let found = types
            .iter()
            .map(|media_type| media_type.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(LabelerError::HeterogeneousBatch { found });
    }
    if batch.len() > 1 && !media_type.is_batchable() {
        return Err(LabelerError::NonImageBatch {
            media_type: media_type.to_string(),
            batch_len: batch.len(),
        });
    }
    Ok(media_type)
}
