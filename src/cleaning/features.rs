//! Derived columns and the final fare-density filter.

use chrono::Timelike;

use super::retain_logged;
use crate::audit::{AuditLog, DropReason};
use crate::model::{CleanTrip, Trip};

pub const MAX_FARE_PER_MILE: f64 = 100.0;

/// Total charged per mile; zero when the trip covered no distance.
pub fn fare_per_mile(total_amount: f64, trip_distance: f64) -> f64 {
    if trip_distance > 0.0 {
        total_amount / trip_distance
    } else {
        0.0
    }
}

/// Adds `pickup_hour`, `trip_duration_minutes` and `fare_per_mile`.
pub fn enrich(trip: Trip) -> CleanTrip {
    let trip_duration_minutes = trip.duration_minutes();
    CleanTrip {
        pickup_hour: trip.pickup.hour(),
        trip_duration_minutes,
        fare_per_mile: fare_per_mile(trip.total_amount, trip.trip_distance),
        pickup_datetime: trip.pickup,
        dropoff_datetime: trip.dropoff,
        pu_location_id: trip.pu_location_id,
        do_location_id: trip.do_location_id,
        trip_distance: trip.trip_distance,
        passenger_count: trip.passenger_count.unwrap_or(1),
        fare_amount: trip.fare_amount,
        tip_amount: trip.tip_amount,
        tolls_amount: trip.tolls_amount,
        total_amount: trip.total_amount,
        payment_type: trip.payment_type,
        pickup_zone_name: trip.pickup_zone.name,
        pickup_borough: trip.pickup_zone.borough,
        dropoff_zone_name: trip.dropoff_zone.name,
        dropoff_borough: trip.dropoff_zone.borough,
    }
}

/// Enriches every trip, then drops those charging more than $100 per mile.
pub fn derive(trips: Vec<Trip>, audit: &mut AuditLog) -> Vec<CleanTrip> {
    let enriched: Vec<CleanTrip> = trips.into_iter().map(enrich).collect();
    audit.record(format!(
        "Derived pickup_hour, trip_duration_minutes and fare_per_mile for {} records",
        enriched.len()
    ));

    retain_logged(enriched, DropReason::FarePerMileTooHigh, audit, |t| {
        t.fare_per_mile <= MAX_FARE_PER_MILE
    })
}
