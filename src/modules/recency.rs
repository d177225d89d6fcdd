// Recency list logic - pure functions over the entry vector.
// Callers own loading and persisting; nothing here touches storage.

use std::collections::HashSet;

use crate::modules::listing::ListingSummary;

/// Default number of entries kept.
pub const MAX_RECENT_LISTINGS: usize = 10;

/// Puts `entry` at the front, dropping any older entry with the same id,
/// then trims the tail to `capacity`.
pub fn promote(entries: &mut Vec<ListingSummary>, entry: ListingSummary, capacity: usize) {
    entries.retain(|e| e.id != entry.id);
    entries.insert(0, entry);
    entries.truncate(capacity);
}

/// Removes the entry with `id`. Returns true if something was removed.
pub fn remove_id(entries: &mut Vec<ListingSummary>, id: &str) -> bool {
    let before = entries.len();
    entries.retain(|e| e.id != id);
    entries.len() != before
}

/// Restores the invariants on a list that came from outside: keeps the
/// first (most recent) entry per id and trims to `capacity`.
/// Returns true if the list changed.
pub fn normalize(entries: &mut Vec<ListingSummary>, capacity: usize) -> bool {
    let before = entries.len();
    let mut seen = HashSet::new();
    entries.retain(|e| seen.insert(e.id.clone()));
    entries.truncate(capacity);
    entries.len() != before
}
