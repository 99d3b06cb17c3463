//! Top-N zone ranking.
//!
//! Ordering is a hand-written in-place selection sort, O(z²) in the number of
//! distinct zones. For equal counts it keeps the first maximum found in the
//! unsorted suffix.

use super::counter::{PickupRecord, ZoneCount, ZoneCounts, count_zones};
use crate::error::QueryError;

/// Sorts `entries` by count, highest first.
pub fn selection_sort_desc(entries: &mut [ZoneCount]) {
    let n = entries.len();
    for i in 0..n {
        let mut max_idx = i;
        for j in (i + 1)..n {
            if entries[j].count > entries[max_idx].count {
                max_idx = j;
            }
        }
        entries.swap(i, max_idx);
    }
}

/// Copies out the first `n` entries; all of them when `n` exceeds the length.
pub fn take_first(ranked: &[ZoneCount], n: i64) -> Vec<ZoneCount> {
    let mut top = Vec::new();
    for entry in ranked {
        if top.len() as i64 >= n {
            break;
        }
        top.push(*entry);
    }
    top
}

/// Ranks zones by count and keeps the `n` busiest. `n <= 0` yields nothing.
pub fn rank_zones(counts: &ZoneCounts, n: i64) -> Vec<ZoneCount> {
    let mut entries = counts.to_vec();
    selection_sort_desc(&mut entries);
    take_first(&entries, n)
}

/// Counts then ranks in one call.
pub fn top_n_zones(records: &[PickupRecord], n: i64) -> Result<Vec<ZoneCount>, QueryError> {
    let counts = count_zones(records)?;
    Ok(rank_zones(&counts, n))
}
