//! Per-zone pickup counting.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::QueryError;
use crate::model::{CleanTrip, Trip};

/// Occurrences of one zone identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneCount {
    pub zone_id: i64,
    pub count: u64,
}

/// Zone id to count mapping that remembers first-seen order.
///
/// Iteration order is the order zones were first counted, so ranking ties
/// resolve the same way for the same input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneCounts {
    entries: Vec<ZoneCount>,
    index: HashMap<i64, usize>,
}

impl ZoneCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, zone_id: i64) {
        self.add(zone_id, 1);
    }

    /// Adds `count` occurrences of `zone_id`.
    pub fn add(&mut self, zone_id: i64, count: u64) {
        match self.index.get(&zone_id) {
            Some(&i) => self.entries[i].count += count,
            None => {
                self.index.insert(zone_id, self.entries.len());
                self.entries.push(ZoneCount { zone_id, count });
            }
        }
    }

    pub fn get(&self, zone_id: i64) -> Option<u64> {
        self.index.get(&zone_id).map(|&i| self.entries[i].count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|e| e.count).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ZoneCount> {
        self.entries.iter()
    }

    /// The entries as an unordered (first-seen) sequence of pairs.
    pub fn to_vec(&self) -> Vec<ZoneCount> {
        self.entries.clone()
    }
}

/// Builds counts from grouped `(zone_id, count)` rows such as a storage
/// `GROUP BY` result. Repeated ids are summed.
impl FromIterator<(i64, u64)> for ZoneCounts {
    fn from_iter<I: IntoIterator<Item = (i64, u64)>>(iter: I) -> Self {
        let mut counts = ZoneCounts::new();
        for (zone_id, count) in iter {
            counts.add(zone_id, count);
        }
        counts
    }
}

/// A pickup as handed over by the transport layer: either an object with a
/// `pickup_zone_id` field or a positional row whose first element is the id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PickupRecord {
    Keyed {
        #[serde(alias = "PULocationID")]
        pickup_zone_id: Option<i64>,
    },
    Positional(Vec<Value>),
}

impl PickupRecord {
    pub fn zone(zone_id: i64) -> Self {
        PickupRecord::Keyed {
            pickup_zone_id: Some(zone_id),
        }
    }

    /// The pickup zone id, if the record carries an integer-like one.
    pub fn zone_id(&self) -> Option<i64> {
        match self {
            PickupRecord::Keyed { pickup_zone_id } => *pickup_zone_id,
            PickupRecord::Positional(values) => values.first().and_then(integer_like),
        }
    }
}

fn integer_like(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
            .map(|f| f as i64)
    })
}

impl From<&Trip> for PickupRecord {
    fn from(trip: &Trip) -> Self {
        PickupRecord::zone(trip.pu_location_id)
    }
}

impl From<&CleanTrip> for PickupRecord {
    fn from(trip: &CleanTrip) -> Self {
        PickupRecord::zone(trip.pu_location_id)
    }
}

/// Counts pickups per zone in a single pass.
///
/// # Errors
///
/// Returns [`QueryError::MissingZoneId`] for the first record without a zone id.
pub fn count_zones(records: &[PickupRecord]) -> Result<ZoneCounts, QueryError> {
    let mut counts = ZoneCounts::new();
    for (index, record) in records.iter().enumerate() {
        let zone_id = record
            .zone_id()
            .ok_or(QueryError::MissingZoneId { index })?;
        counts.increment(zone_id);
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn records(ids: &[i64]) -> Vec<PickupRecord> {
        ids.iter().copied().map(PickupRecord::zone).collect()
    }

    #[test]
    fn test_count_zones_basic() {
        let counts = count_zones(&records(&[5, 5, 3, 9, 9, 9])).unwrap();

        assert_eq!(counts.len(), 3);
        assert_eq!(counts.get(5), Some(2));
        assert_eq!(counts.get(3), Some(1));
        assert_eq!(counts.get(9), Some(3));
        assert_eq!(counts.get(7), None);
    }

    #[test]
    fn test_count_zones_empty() {
        let counts = count_zones(&[]).unwrap();
        assert!(counts.is_empty());
        assert_eq!(counts.total(), 0);
    }

    #[test]
    fn test_totals_and_keys_match_input() {
        let ids = [4, 8, 15, 16, 23, 42, 4, 8, 4, 99, 15];
        let counts = count_zones(&records(&ids)).unwrap();

        assert_eq!(counts.total(), ids.len() as u64);
        let keys: HashSet<i64> = counts.iter().map(|e| e.zone_id).collect();
        let distinct: HashSet<i64> = ids.iter().copied().collect();
        assert_eq!(keys, distinct);
    }

    #[test]
    fn test_first_seen_order_is_kept() {
        let counts = count_zones(&records(&[7, 3, 7, 1])).unwrap();
        let order: Vec<i64> = counts.iter().map(|e| e.zone_id).collect();
        assert_eq!(order, vec![7, 3, 1]);
    }

    #[test]
    fn test_accepts_keyed_and_positional_records() {
        let parsed: Vec<PickupRecord> = serde_json::from_value(json!([
            {"pickup_zone_id": 5, "fare": 12.5},
            {"PULocationID": 5},
            [3, "2024-01-01 00:00:00"],
            [3.0],
        ]))
        .unwrap();

        let counts = count_zones(&parsed).unwrap();
        assert_eq!(counts.get(5), Some(2));
        assert_eq!(counts.get(3), Some(2));
    }

    #[test]
    fn test_malformed_record_is_error() {
        let parsed: Vec<PickupRecord> =
            serde_json::from_value(json!([{"pickup_zone_id": 1}, {"dropoff_zone_id": 2}, []]))
                .unwrap();

        let err = count_zones(&parsed).unwrap_err();
        assert_eq!(err, QueryError::MissingZoneId { index: 1 });

        let err = count_zones(&parsed[2..]).unwrap_err();
        assert_eq!(err, QueryError::MissingZoneId { index: 0 });
    }

    #[test]
    fn test_from_grouped_rows_sums_repeats() {
        let counts: ZoneCounts = vec![(1, 10), (2, 4), (1, 5)].into_iter().collect();
        assert_eq!(counts.get(1), Some(15));
        assert_eq!(counts.len(), 2);
    }
}
