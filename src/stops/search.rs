//! Autocomplete over the stop index.
//!
//! Results come back in dataset order, unranked.

use crate::models::StopRecord;

use super::StopIndexData;

pub const MAX_MATCHES: usize = 20;

/// Stops matching a free-text query.
///
/// An all-digit query is a code prefix match; anything else is a
/// case-insensitive substring match on the stop name.
pub fn matches<'a>(index: &'a StopIndexData, query: &str, limit: usize) -> Vec<&'a StopRecord> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }

    let numeric = query.bytes().all(|b| b.is_ascii_digit());
    index
        .stops()
        .iter()
        .filter(|stop| {
            if numeric {
                stop.code.starts_with(&query)
            } else {
                stop.name.to_lowercase().contains(&query)
            }
        })
        .take(limit.min(MAX_MATCHES))
        .collect()
}
