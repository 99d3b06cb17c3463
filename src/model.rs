//! Row types flowing through the cleaning pipeline.
//!
//! A trip starts as a [`RawTrip`] read from CSV, gains zone names in
//! [`TripRecord`], becomes a fully-typed [`Trip`] once its critical fields are
//! present, and leaves the pipeline as a flat [`CleanTrip`] with derived fields.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

/// Output format for timestamps; fractional seconds are written only when present.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const TIMESTAMP_INPUT_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parses a trip timestamp, returning `None` for anything unrecognized.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

/// Trip duration in minutes. Shared by outlier removal and feature derivation
/// so both always agree on the value.
pub fn duration_minutes(pickup: NaiveDateTime, dropoff: NaiveDateTime) -> f64 {
    let elapsed = dropoff - pickup;
    // microseconds overflow only past ~292k years
    elapsed.num_microseconds().map_or_else(
        || elapsed.num_milliseconds() as f64 / 60_000.0,
        |us| us as f64 / 60_000_000.0,
    )
}

/// One row of the zone lookup table.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Zone {
    #[serde(rename = "LocationID")]
    pub location_id: i64,
    #[serde(rename = "Borough")]
    pub borough: String,
    #[serde(rename = "Zone")]
    pub zone: String,
    #[serde(default)]
    pub service_zone: Option<String>,
}

/// A trip row exactly as read from the input table.
///
/// Every field is optional: values that fail to coerce are read as missing
/// and handled by the quality filter instead of aborting the load.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawTrip {
    #[serde(rename = "tpep_pickup_datetime", default)]
    pub pickup_datetime: Option<String>,
    #[serde(rename = "tpep_dropoff_datetime", default)]
    pub dropoff_datetime: Option<String>,
    #[serde(rename = "PULocationID", default, deserialize_with = "csv::invalid_option")]
    pub pu_location_id: Option<i64>,
    #[serde(rename = "DOLocationID", default, deserialize_with = "csv::invalid_option")]
    pub do_location_id: Option<i64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub trip_distance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub passenger_count: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub fare_amount: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub tip_amount: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub tolls_amount: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub total_amount: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub payment_type: Option<i64>,
}

/// Accepts `"2"` as well as `"2.0"`; parquet exports often store counts as floats.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_count))
}

fn parse_count(value: &str) -> Option<u32> {
    let value = value.trim();
    if let Ok(n) = value.parse::<u32>() {
        return Some(n);
    }
    match value.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 => {
            Some(f as u32)
        }
        _ => None,
    }
}

/// Human-readable names joined from the zone lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneNames {
    pub name: Option<String>,
    pub borough: Option<String>,
}

/// A raw trip annotated with pickup and dropoff zone names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripRecord {
    pub raw: RawTrip,
    pub pickup_zone: ZoneNames,
    pub dropoff_zone: ZoneNames,
}

/// A trip whose critical fields are all present and typed.
#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    pub pickup: NaiveDateTime,
    pub dropoff: NaiveDateTime,
    pub pu_location_id: i64,
    pub do_location_id: i64,
    pub trip_distance: f64,
    pub total_amount: f64,
    pub passenger_count: Option<u32>,
    pub fare_amount: Option<f64>,
    pub tip_amount: Option<f64>,
    pub tolls_amount: Option<f64>,
    pub payment_type: Option<i64>,
    pub pickup_zone: ZoneNames,
    pub dropoff_zone: ZoneNames,
}

impl Trip {
    /// Promotes a normalized record, or returns the names of the critical
    /// columns that are missing. Unparseable timestamps count as missing.
    pub fn from_record(record: TripRecord) -> Result<Trip, Vec<&'static str>> {
        let TripRecord {
            raw,
            pickup_zone,
            dropoff_zone,
        } = record;

        let pickup = raw.pickup_datetime.as_deref().and_then(parse_timestamp);
        let dropoff = raw.dropoff_datetime.as_deref().and_then(parse_timestamp);
        let distance = raw.trip_distance.filter(|d| d.is_finite());
        let total = raw.total_amount.filter(|t| t.is_finite());

        let mut missing = Vec::new();
        if raw.pu_location_id.is_none() {
            missing.push("PULocationID");
        }
        if raw.do_location_id.is_none() {
            missing.push("DOLocationID");
        }
        if pickup.is_none() {
            missing.push("tpep_pickup_datetime");
        }
        if dropoff.is_none() {
            missing.push("tpep_dropoff_datetime");
        }
        if distance.is_none() {
            missing.push("trip_distance");
        }
        if total.is_none() {
            missing.push("total_amount");
        }

        match (
            pickup,
            dropoff,
            raw.pu_location_id,
            raw.do_location_id,
            distance,
            total,
        ) {
            (Some(pickup), Some(dropoff), Some(pu), Some(dol), Some(distance), Some(total)) => {
                Ok(Trip {
                    pickup,
                    dropoff,
                    pu_location_id: pu,
                    do_location_id: dol,
                    trip_distance: distance,
                    total_amount: total,
                    passenger_count: raw.passenger_count,
                    fare_amount: raw.fare_amount,
                    tip_amount: raw.tip_amount,
                    tolls_amount: raw.tolls_amount,
                    payment_type: raw.payment_type,
                    pickup_zone,
                    dropoff_zone,
                })
            }
            _ => Err(missing),
        }
    }

    pub fn duration_minutes(&self) -> f64 {
        duration_minutes(self.pickup, self.dropoff)
    }
}

/// A row of the cleaned output table.
///
/// Column names match the trip input so the output can be fed back in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanTrip {
    #[serde(rename = "tpep_pickup_datetime", with = "timestamp")]
    pub pickup_datetime: NaiveDateTime,
    #[serde(rename = "tpep_dropoff_datetime", with = "timestamp")]
    pub dropoff_datetime: NaiveDateTime,
    #[serde(rename = "PULocationID")]
    pub pu_location_id: i64,
    #[serde(rename = "DOLocationID")]
    pub do_location_id: i64,
    pub trip_distance: f64,
    pub passenger_count: u32,
    pub fare_amount: Option<f64>,
    pub tip_amount: Option<f64>,
    pub tolls_amount: Option<f64>,
    pub total_amount: f64,
    pub payment_type: Option<i64>,
    pub pickup_zone_name: Option<String>,
    pub pickup_borough: Option<String>,
    pub dropoff_zone_name: Option<String>,
    pub dropoff_borough: Option<String>,
    pub pickup_hour: u32,
    pub trip_duration_minutes: f64,
    pub fare_per_mile: f64,
}

impl CleanTrip {
    /// Converts back into an input row, dropping the joined and derived columns.
    pub fn to_raw(&self) -> RawTrip {
        RawTrip {
            pickup_datetime: Some(self.pickup_datetime.format(TIMESTAMP_FORMAT).to_string()),
            dropoff_datetime: Some(self.dropoff_datetime.format(TIMESTAMP_FORMAT).to_string()),
            pu_location_id: Some(self.pu_location_id),
            do_location_id: Some(self.do_location_id),
            trip_distance: Some(self.trip_distance),
            passenger_count: Some(self.passenger_count),
            fare_amount: self.fare_amount,
            tip_amount: self.tip_amount,
            tolls_amount: self.tolls_amount,
            total_amount: Some(self.total_amount),
            payment_type: self.payment_type,
        }
    }
}

mod timestamp {
    use super::{TIMESTAMP_FORMAT, parse_timestamp};
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{raw}'")))
    }
}
