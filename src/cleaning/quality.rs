//! Missing-value handling, de-duplication and outlier removal.
//!
//! Passes run in a fixed order so each logged count reflects exactly the rows
//! that pass removed. Every pass except passenger imputation is a pure filter.

use std::collections::HashSet;

use chrono::NaiveDateTime;

use super::retain_logged;
use crate::audit::{AuditLog, DropReason};
use crate::model::{Trip, TripRecord};

pub const MIN_DURATION_MINUTES: f64 = 1.0;
pub const MAX_DURATION_MINUTES: f64 = 180.0;

/// Order in which missing critical columns are reported.
const CRITICAL_COLUMNS: &[&str] = &[
    "PULocationID",
    "DOLocationID",
    "tpep_pickup_datetime",
    "tpep_dropoff_datetime",
    "trip_distance",
    "total_amount",
];

/// Runs every quality pass over normalized records.
pub fn filter(records: Vec<TripRecord>, audit: &mut AuditLog) -> Vec<Trip> {
    audit.record(format!("Quality filter: {} records in", records.len()));

    let trips = drop_missing(records, audit);
    let trips = fill_passenger_count(trips, audit);
    let trips = drop_duplicates(trips, audit);
    let trips = drop_negative_distance(trips, audit);
    let trips = drop_negative_total(trips, audit);
    let trips = drop_duration_outliers(trips, audit);
    let trips = drop_zero_distance_with_fare(trips, audit);
    let trips = drop_zero_distance(trips, audit);

    audit.record(format!("Quality filter: {} records out", trips.len()));
    trips
}

/// Pass 1: drops rows lacking a zone id, a parseable timestamp, a distance or a total.
pub fn drop_missing(records: Vec<TripRecord>, audit: &mut AuditLog) -> Vec<Trip> {
    let mut missing_counts = vec![0usize; CRITICAL_COLUMNS.len()];
    let mut dropped = 0usize;
    let mut trips = Vec::with_capacity(records.len());

    for record in records {
        match Trip::from_record(record) {
            Ok(trip) => trips.push(trip),
            Err(columns) => {
                dropped += 1;
                for column in columns {
                    if let Some(i) = CRITICAL_COLUMNS.iter().position(|c| *c == column) {
                        missing_counts[i] += 1;
                    }
                }
            }
        }
    }

    for (column, count) in CRITICAL_COLUMNS.iter().zip(&missing_counts) {
        if *count > 0 {
            audit.record(format!("  {column}: {count} missing or unparseable"));
        }
    }
    audit.removed(DropReason::MissingCriticalField, dropped, trips.len());
    trips
}

/// Pass 2: imputes a missing passenger count as 1.
pub fn fill_passenger_count(mut trips: Vec<Trip>, audit: &mut AuditLog) -> Vec<Trip> {
    let mut filled = 0usize;
    for trip in trips.iter_mut().filter(|t| t.passenger_count.is_none()) {
        trip.passenger_count = Some(1);
        filled += 1;
    }
    audit.record(format!("Filled {filled} missing passenger_count values with 1"));
    trips
}

#[derive(PartialEq, Eq, Hash)]
struct TripKey {
    pickup: NaiveDateTime,
    dropoff: NaiveDateTime,
    pu_location_id: i64,
    do_location_id: i64,
    total_bits: u64,
}

impl TripKey {
    fn of(trip: &Trip) -> Self {
        // -0.0 and 0.0 are the same amount
        let total = if trip.total_amount == 0.0 { 0.0 } else { trip.total_amount };
        Self {
            pickup: trip.pickup,
            dropoff: trip.dropoff,
            pu_location_id: trip.pu_location_id,
            do_location_id: trip.do_location_id,
            total_bits: total.to_bits(),
        }
    }
}

/// Pass 3: keeps the first of any rows sharing timestamps, zones and total.
pub fn drop_duplicates(trips: Vec<Trip>, audit: &mut AuditLog) -> Vec<Trip> {
    let mut seen = HashSet::with_capacity(trips.len());
    retain_logged(trips, DropReason::Duplicate, audit, |t| seen.insert(TripKey::of(t)))
}

/// Pass 4
pub fn drop_negative_distance(trips: Vec<Trip>, audit: &mut AuditLog) -> Vec<Trip> {
    retain_logged(trips, DropReason::NegativeDistance, audit, |t| t.trip_distance >= 0.0)
}

/// Pass 5
pub fn drop_negative_total(trips: Vec<Trip>, audit: &mut AuditLog) -> Vec<Trip> {
    retain_logged(trips, DropReason::NegativeTotal, audit, |t| t.total_amount >= 0.0)
}

/// Pass 6: keeps trips lasting between 1 and 180 minutes inclusive.
pub fn drop_duration_outliers(trips: Vec<Trip>, audit: &mut AuditLog) -> Vec<Trip> {
    retain_logged(trips, DropReason::DurationOutOfRange, audit, |t| {
        (MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&t.duration_minutes())
    })
}

/// Pass 7
pub fn drop_zero_distance_with_fare(trips: Vec<Trip>, audit: &mut AuditLog) -> Vec<Trip> {
    retain_logged(trips, DropReason::ZeroDistancePositiveFare, audit, |t| {
        !(t.trip_distance == 0.0 && t.total_amount > 0.0)
    })
}

/// Pass 8: whatever zero-distance rows remain have a zero total as well.
pub fn drop_zero_distance(trips: Vec<Trip>, audit: &mut AuditLog) -> Vec<Trip> {
    retain_logged(trips, DropReason::ZeroDistance, audit, |t| t.trip_distance != 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawTrip;

    fn record(pickup: &str, dropoff: &str, distance: f64, total: f64) -> TripRecord {
        TripRecord {
            raw: RawTrip {
                pickup_datetime: Some(pickup.to_string()),
                dropoff_datetime: Some(dropoff.to_string()),
                pu_location_id: Some(10),
                do_location_id: Some(20),
                trip_distance: Some(distance),
                passenger_count: Some(1),
                total_amount: Some(total),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn ten_minute(distance: f64, total: f64) -> TripRecord {
        record("2024-01-01 08:00:00", "2024-01-01 08:10:00", distance, total)
    }

    #[test]
    fn test_drop_missing_counts_columns() {
        let mut no_pickup_zone = ten_minute(1.0, 10.0);
        no_pickup_zone.raw.pu_location_id = None;
        let bad_timestamp = record("yesterday", "2024-01-01 08:10:00", 1.0, 10.0);
        let mut audit = AuditLog::in_memory();

        let trips = drop_missing(
            vec![no_pickup_zone, bad_timestamp, ten_minute(1.0, 10.0)],
            &mut audit,
        );

        assert_eq!(trips.len(), 1);
        assert_eq!(audit.removed_for(DropReason::MissingCriticalField), 2);
        assert!(audit.contains("PULocationID: 1 missing or unparseable"));
        assert!(audit.contains("tpep_pickup_datetime: 1 missing or unparseable"));
    }

    #[test]
    fn test_fill_passenger_count() {
        let mut empty = ten_minute(1.0, 10.0);
        empty.raw.passenger_count = None;
        let mut three = ten_minute(2.0, 12.0);
        three.raw.passenger_count = Some(3);
        let mut audit = AuditLog::in_memory();

        let trips = drop_missing(vec![empty, three], &mut audit);
        let filled = fill_passenger_count(trips, &mut audit);

        assert_eq!(filled.len(), 2);
        assert_eq!(filled[0].passenger_count, Some(1));
        assert_eq!(filled[1].passenger_count, Some(3));
        assert!(audit.contains("Filled 1 missing passenger_count values with 1"));
    }

    #[test]
    fn test_duplicates_keep_first_occurrence() {
        let mut first = ten_minute(1.0, 10.0);
        first.raw.passenger_count = Some(1);
        let mut second = ten_minute(5.0, 10.0);
        second.raw.passenger_count = Some(4);
        let mut third = ten_minute(3.0, 10.0);
        third.raw.passenger_count = Some(2);
        let different_total = ten_minute(1.0, 11.0);
        let mut audit = AuditLog::in_memory();

        let trips = drop_missing(vec![first, second, third, different_total], &mut audit);
        let trips = drop_duplicates(trips, &mut audit);

        assert_eq!(trips.len(), 2);
        assert_eq!(trips[0].passenger_count, Some(1));
        assert_eq!(trips[1].total_amount, 11.0);
        assert_eq!(audit.removed_for(DropReason::Duplicate), 2);
    }

    #[test]
    fn test_negative_values_removed() {
        let mut audit = AuditLog::in_memory();
        let trips = drop_missing(
            vec![ten_minute(-1.0, 10.0), ten_minute(1.0, -5.0), ten_minute(1.0, 10.0)],
            &mut audit,
        );

        let trips = drop_negative_distance(trips, &mut audit);
        let trips = drop_negative_total(trips, &mut audit);

        assert_eq!(trips.len(), 1);
        assert_eq!(audit.removed_for(DropReason::NegativeDistance), 1);
        assert_eq!(audit.removed_for(DropReason::NegativeTotal), 1);
    }

    #[test]
    fn test_duration_boundaries() {
        let records = vec![
            record("2024-01-01 00:00:00", "2024-01-01 00:01:00", 1.0, 10.0),
            record("2024-01-01 00:00:00", "2024-01-01 03:00:00", 1.0, 11.0),
            record("2024-01-01 00:00:00", "2024-01-01 00:00:59.940", 1.0, 12.0),
            record("2024-01-01 00:00:00", "2024-01-01 03:00:00.060", 1.0, 13.0),
            record("2024-01-01 00:00:00", "2024-01-01 00:00:30", 1.0, 14.0),
            record("2024-01-01 00:10:00", "2024-01-01 00:00:00", 1.0, 15.0),
            record("2024-01-01 00:00:00", "2024-01-01 03:00:00.000900", 1.0, 16.0),
        ];
        let mut audit = AuditLog::in_memory();

        let trips = drop_duration_outliers(drop_missing(records, &mut audit), &mut audit);

        let kept: Vec<f64> = trips.iter().map(|t| t.total_amount).collect();
        assert_eq!(kept, vec![10.0, 11.0]);
        assert_eq!(audit.removed_for(DropReason::DurationOutOfRange), 5);
    }

    #[test]
    fn test_zero_distance_reasons_are_distinct() {
        let mut audit = AuditLog::in_memory();

        let trips = filter(
            vec![ten_minute(0.0, 5.0), ten_minute(0.0, 0.0), ten_minute(2.0, 10.0)],
            &mut audit,
        );

        assert_eq!(trips.len(), 1);
        assert_eq!(audit.removed_for(DropReason::ZeroDistancePositiveFare), 1);
        assert_eq!(audit.removed_for(DropReason::ZeroDistance), 1);
    }

    #[test]
    fn test_filter_invariants_hold() {
        let records = vec![
            ten_minute(1.0, 10.0),
            ten_minute(1.0, 10.0),
            ten_minute(-2.0, 10.0),
            ten_minute(3.0, -1.0),
            record("2024-01-01 00:00:00", "2024-01-01 05:00:00", 3.0, 40.0),
            ten_minute(0.0, 0.0),
            ten_minute(4.0, 20.0),
        ];
        let mut audit = AuditLog::in_memory();

        let trips = filter(records, &mut audit);

        assert_eq!(trips.len(), 2);
        for t in &trips {
            assert!(t.trip_distance > 0.0);
            assert!(t.total_amount >= 0.0);
            assert!((1.0..=180.0).contains(&t.duration_minutes()));
            assert!(t.passenger_count.is_some());
        }
        assert_eq!(audit.total_removed(), 5);
    }
}
