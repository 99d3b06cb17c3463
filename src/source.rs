//! Loading input artifacts from disk or over HTTP.

use std::io::{self, Read};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::cleaning::normalize::ZoneLookup;
use crate::error::{PipelineError, PipelineResult};
use crate::fetch::{BasicClient, fetch_bytes, is_remote};
use crate::model::{CleanTrip, RawTrip};
use crate::ranking::PickupRecord;

/// Trip columns that must appear in the header of a trip table.
pub const REQUIRED_TRIP_COLUMNS: &[&str] = &[
    "tpep_pickup_datetime",
    "tpep_dropoff_datetime",
    "PULocationID",
    "DOLocationID",
];

/// Trip rows read from a table, plus the number of rows that could not be read at all.
#[derive(Debug, Default)]
pub struct TripLoad {
    pub trips: Vec<RawTrip>,
    pub skipped: usize,
}

/// Reads a local file, or fetches a URL.
///
/// # Errors
///
/// A local path that does not exist is a configuration error; any other
/// read failure is [`PipelineError::Io`].
#[tracing::instrument]
pub async fn load_bytes(source: &str) -> Result<Vec<u8>> {
    if is_remote(source) {
        let client = BasicClient::new();
        return fetch_bytes(&client, source).await;
    }

    match std::fs::read(source) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(PipelineError::configuration(format!("input artifact not found: {source}")).into())
        }
        Err(e) => Err(PipelineError::from(e)).with_context(|| format!("failed to read {source}")),
    }
}

/// Reads trip rows, skipping rows the CSV layer cannot decode.
///
/// # Errors
///
/// Fails with a configuration error when a required column is missing from the header.
pub fn read_trips<R: Read>(reader: R) -> PipelineResult<TripLoad> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    for column in REQUIRED_TRIP_COLUMNS {
        if !headers.iter().any(|h| h.trim() == *column) {
            return Err(PipelineError::configuration(format!(
                "trip table is missing required column '{column}'"
            )));
        }
    }

    let mut load = TripLoad::default();
    for result in rdr.deserialize::<RawTrip>() {
        match result {
            Ok(trip) => load.trips.push(trip),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable trip row");
                load.skipped += 1;
            }
        }
    }
    Ok(load)
}

/// Reads rows previously written by the cleaning pipeline.
pub fn read_clean_trips<R: Read>(reader: R) -> PipelineResult<Vec<CleanTrip>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let trips = rdr.deserialize().collect::<Result<Vec<CleanTrip>, _>>()?;
    Ok(trips)
}

#[derive(Deserialize)]
struct PickupRow {
    #[serde(rename = "PULocationID", default, deserialize_with = "csv::invalid_option")]
    pickup_zone_id: Option<i64>,
}

/// Reads only the pickup zone column of any trip table, raw or cleaned.
pub fn read_pickups<R: Read>(reader: R) -> PipelineResult<Vec<PickupRecord>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut records = Vec::new();
    for result in rdr.deserialize::<PickupRow>() {
        let row = result?;
        records.push(PickupRecord::Keyed {
            pickup_zone_id: row.pickup_zone_id,
        });
    }
    Ok(records)
}

pub async fn load_trips(source: &str) -> Result<TripLoad> {
    let bytes = load_bytes(source).await?;
    let load = read_trips(bytes.as_slice())?;
    info!(source, rows = load.trips.len(), skipped = load.skipped, "Loaded trip table");
    Ok(load)
}

pub async fn load_zones(source: &str) -> Result<ZoneLookup> {
    let bytes = load_bytes(source).await?;
    let lookup = ZoneLookup::from_reader(bytes.as_slice())?;
    info!(source, zones = lookup.len(), "Loaded zone lookup");
    Ok(lookup)
}

pub async fn load_clean_trips(source: &str) -> Result<Vec<CleanTrip>> {
    let bytes = load_bytes(source).await?;
    let trips = read_clean_trips(bytes.as_slice())
        .with_context(|| format!("{source} is not a cleaned trip table"))?;
    Ok(trips)
}

pub async fn load_pickups(source: &str) -> Result<Vec<PickupRecord>> {
    let bytes = load_bytes(source).await?;
    Ok(read_pickups(bytes.as_slice())?)
}
