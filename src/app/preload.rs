//! Prefetch planning for upcoming media.

use crate::domain::Item;
use crate::infrastructure::MediaResolver;

/// References to prefetch after the current batch.
///
/// Walks the order from `after_pos + 1`, skipping items whose type cannot be
/// resolved ahead of time, and collects up to `max_preload` references. The
/// walk stops at the first eligible item without a reference.
#[must_use]
pub fn plan(
    order: &[usize],
    items: &[Item],
    after_pos: usize,
    max_preload: usize,
    resolver: &dyn MediaResolver,
) -> Vec<String> {
    let mut preload = Vec::with_capacity(max_preload);
    if max_preload == 0 {
        return preload;
    }

    for &idx in order.iter().skip(after_pos + 1) {
        let item = &items[idx];
        if !item.media_type().is_preloadable() {
            continue;
        }
        let reference = item
            .target
            .as_ref()
            .map(|target| resolver.resolve(target))
            .transpose()
            .unwrap_or_else(|e| {
                tracing::warn!(idx, error = %e, "preload resolution failed");
                None
            })
            .flatten();
        let Some(reference) = reference else {
            tracing::debug!(idx, "stopping preload at unresolvable reference");
            break;
        };
        preload.push(reference);
        if preload.len() == max_preload {
            break;
        }
    }
    preload
}
