//! Ranking for surfaced insights and recommendations.

use crate::types::Priority;

/// Sort `entries` by priority (high first), then confidence (descending),
/// and keep the first `top_k`. The sort is stable, so entries that tie on
/// both keys keep their original relative order.
pub fn rank_top_k<T>(
    mut entries: Vec<T>,
    top_k: usize,
    priority: impl Fn(&T) -> Priority,
    confidence: impl Fn(&T) -> f64,
) -> Vec<T> {
    entries.sort_by(|a, b| {
        priority(b)
            .cmp(&priority(a))
            .then_with(|| confidence(b).total_cmp(&confidence(a)))
    });
    entries.truncate(top_k);
    entries
}

/// Sort `entries` by priority alone (high first, stable on ties) and keep
/// the first `top_k`. For entries without a confidence dimension, such as
/// recommendations ordered by urgency.
pub fn rank_top_k_by_priority<T>(
    mut entries: Vec<T>,
    top_k: usize,
    priority: impl Fn(&T) -> Priority,
) -> Vec<T> {
    entries.sort_by(|a, b| priority(b).cmp(&priority(a)));
    entries.truncate(top_k);
    entries
}
