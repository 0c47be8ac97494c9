//! Bounded append-only ledgers for AI-generated content.
//!
//! Daily insights/recommendations and goal insights/recommendations all grow
//! through this single helper so no record accumulates unbounded AI output.

/// Append `item` and evict the oldest entries until at most `cap` remain.
/// Relative order of the survivors is preserved.
pub fn push_capped<T>(items: &mut Vec<T>, item: T, cap: usize) {
    items.push(item);
    if items.len() > cap {
        let excess = items.len() - cap;
        items.drain(..excess);
    }
}
