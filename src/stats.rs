//! Aggregate views over a cleaned trip set.

use serde::Serialize;

use crate::model::CleanTrip;

/// `part` as a percentage of `total`; zero when `total` is zero.
pub fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripSummary {
    pub total_trips: usize,
    pub avg_fare: f64,
    pub avg_distance: f64,
    pub avg_duration_minutes: f64,
    pub avg_fare_per_mile: f64,
}

/// Fare amounts of the trips that report one.
fn fares(trips: &[CleanTrip]) -> Vec<f64> {
    trips.iter().filter_map(|t| t.fare_amount).collect()
}

/// Dataset averages. `avg_fare` is over `fare_amount` and skips trips without one.
pub fn summarize(trips: &[CleanTrip]) -> TripSummary {
    let column = |f: fn(&CleanTrip) -> f64| trips.iter().map(f).collect::<Vec<f64>>();

    TripSummary {
        total_trips: trips.len(),
        avg_fare: mean(&fares(trips)),
        avg_distance: mean(&column(|t| t.trip_distance)),
        avg_duration_minutes: mean(&column(|t| t.trip_duration_minutes)),
        avg_fare_per_mile: mean(&column(|t| t.fare_per_mile)),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyFare {
    pub hour: u32,
    pub trips: usize,
    pub avg_fare: f64,
}

/// Average fare amount per pickup hour, ascending, for hours that have trips.
/// `trips` counts every trip in the hour; trips without a fare amount are
/// left out of the average.
pub fn average_fare_by_hour(trips: &[CleanTrip]) -> Vec<HourlyFare> {
    let mut by_hour: Vec<Vec<&CleanTrip>> = vec![Vec::new(); 24];
    for trip in trips {
        if let Some(bucket) = by_hour.get_mut(trip.pickup_hour as usize) {
            bucket.push(trip);
        }
    }

    by_hour
        .into_iter()
        .zip(0u32..)
        .filter(|(bucket, _)| !bucket.is_empty())
        .map(|(bucket, hour)| {
            let fares: Vec<f64> = bucket.iter().filter_map(|t| t.fare_amount).collect();
            HourlyFare {
                hour,
                trips: bucket.len(),
                avg_fare: mean(&fares),
            }
        })
        .collect()
}

/// Trips matching an optional pickup borough (case-insensitive) and pickup hour.
pub fn filter_trips<'a>(
    trips: &'a [CleanTrip],
    borough: Option<&str>,
    hour: Option<u32>,
) -> Vec<&'a CleanTrip> {
    trips
        .iter()
        .filter(|t| match borough {
            Some(b) => t
                .pickup_borough
                .as_deref()
                .is_some_and(|pb| pb.eq_ignore_ascii_case(b)),
            None => true,
        })
        .filter(|t| hour.is_none_or(|h| t.pickup_hour == h))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_timestamp;

    fn clean(hour: u32, borough: Option<&str>, total: f64, distance: f64) -> CleanTrip {
        let pickup = parse_timestamp(&format!("2024-01-01 {hour:02}:00:00")).unwrap();
        CleanTrip {
            pickup_datetime: pickup,
            dropoff_datetime: pickup + chrono::Duration::minutes(10),
            pu_location_id: 1,
            do_location_id: 2,
            trip_distance: distance,
            passenger_count: 1,
            fare_amount: Some(total - 5.0),
            tip_amount: None,
            tolls_amount: None,
            total_amount: total,
            payment_type: None,
            pickup_zone_name: None,
            pickup_borough: borough.map(str::to_string),
            dropoff_zone_name: None,
            dropoff_borough: None,
            pickup_hour: hour,
            trip_duration_minutes: 10.0,
            fare_per_mile: total / distance,
        }
    }

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(pct(10, 0), 0.0);
    }

    #[test]
    fn test_pct_normal_values() {
        assert_eq!(pct(50, 100), 50.0);
        assert_eq!(pct(1, 4), 25.0);
    }

    #[test]
    fn test_mean_empty() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
    }

    #[test]
    fn test_summarize() {
        let trips = vec![clean(8, None, 10.0, 2.0), clean(9, None, 20.0, 4.0)];
        let summary = summarize(&trips);

        assert_eq!(summary.total_trips, 2);
        assert_eq!(summary.avg_fare, 10.0);
        assert_eq!(summary.avg_distance, 3.0);
        assert_eq!(summary.avg_duration_minutes, 10.0);
        assert_eq!(summary.avg_fare_per_mile, 5.0);
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_trips, 0);
        assert_eq!(summary.avg_fare, 0.0);
    }

    #[test]
    fn test_average_fare_by_hour() {
        let trips = vec![
            clean(17, None, 10.0, 1.0),
            clean(3, None, 30.0, 1.0),
            clean(17, None, 20.0, 1.0),
        ];
        let hourly = average_fare_by_hour(&trips);

        assert_eq!(
            hourly,
            vec![
                HourlyFare { hour: 3, trips: 1, avg_fare: 25.0 },
                HourlyFare { hour: 17, trips: 2, avg_fare: 10.0 },
            ]
        );
    }

    #[test]
    fn test_fare_averages_skip_missing_fare_amount() {
        let mut no_fare = clean(8, None, 40.0, 2.0);
        no_fare.fare_amount = None;
        let trips = vec![clean(8, None, 20.0, 2.0), no_fare];

        let summary = summarize(&trips);
        assert_eq!(summary.total_trips, 2);
        assert_eq!(summary.avg_fare, 15.0);

        let hourly = average_fare_by_hour(&trips);
        assert_eq!(hourly, vec![HourlyFare { hour: 8, trips: 2, avg_fare: 15.0 }]);
    }

    #[test]
    fn test_filter_trips() {
        let trips = vec![
            clean(8, Some("Manhattan"), 10.0, 1.0),
            clean(9, Some("Brooklyn"), 10.0, 1.0),
            clean(8, None, 10.0, 1.0),
        ];

        assert_eq!(filter_trips(&trips, Some("manhattan"), None).len(), 1);
        assert_eq!(filter_trips(&trips, None, Some(8)).len(), 2);
        assert_eq!(filter_trips(&trips, Some("Brooklyn"), Some(8)).len(), 0);
        assert_eq!(filter_trips(&trips, None, None).len(), 3);
    }
}
