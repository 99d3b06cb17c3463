//! Joins trip rows against the zone lookup table.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io::Read;

use tracing::{debug, warn};

use crate::audit::AuditLog;
use crate::error::{PipelineError, PipelineResult};
use crate::model::{RawTrip, TripRecord, Zone, ZoneNames};

/// Columns a zone lookup table must provide.
pub const REQUIRED_ZONE_COLUMNS: &[&str] = &["LocationID", "Borough", "Zone"];

/// Zone reference data keyed by location id. Never empty.
#[derive(Debug, Clone)]
pub struct ZoneLookup {
    zones: HashMap<i64, Zone>,
}

impl ZoneLookup {
    /// Builds the lookup, keeping the first row for a repeated id.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `zones` is empty.
    pub fn new(zones: Vec<Zone>) -> PipelineResult<Self> {
        if zones.is_empty() {
            return Err(PipelineError::configuration("zone lookup is empty"));
        }

        let mut map = HashMap::with_capacity(zones.len());
        for zone in zones {
            match map.entry(zone.location_id) {
                Entry::Vacant(slot) => {
                    slot.insert(zone);
                }
                Entry::Occupied(_) => {
                    warn!(location_id = zone.location_id, "Duplicate zone id in lookup, keeping first");
                }
            }
        }

        Ok(Self { zones: map })
    }

    /// Reads a zone lookup CSV, checking its header before any row.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a required column is absent, a row
    /// cannot be parsed, or the table has no rows.
    pub fn from_reader<R: Read>(reader: R) -> PipelineResult<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.clone();

        for &column in REQUIRED_ZONE_COLUMNS {
            if !headers.iter().any(|h| h.trim() == column) {
                return Err(PipelineError::MissingColumn { column });
            }
        }

        let mut zones = Vec::new();
        for (line, result) in rdr.deserialize::<Zone>().enumerate() {
            let zone = result.map_err(|e| {
                PipelineError::configuration(format!("zone lookup row {} is malformed: {e}", line + 1))
            })?;
            zones.push(zone);
        }

        Self::new(zones)
    }

    pub fn get(&self, location_id: i64) -> Option<&Zone> {
        self.zones.get(&location_id)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    fn names_for(&self, location_id: Option<i64>) -> ZoneNames {
        match location_id.and_then(|id| self.get(id)) {
            Some(zone) => ZoneNames {
                name: Some(zone.zone.clone()),
                borough: Some(zone.borough.clone()),
            },
            None => ZoneNames::default(),
        }
    }
}

/// Attaches pickup and dropoff zone names to every trip.
///
/// A left join: unmatched ids keep empty names and no row is dropped.
pub fn normalize(trips: Vec<RawTrip>, lookup: &ZoneLookup, audit: &mut AuditLog) -> Vec<TripRecord> {
    let mut pickup_unmatched = 0usize;
    let mut dropoff_unmatched = 0usize;

    let records: Vec<TripRecord> = trips
        .into_iter()
        .map(|raw| {
            let pickup_zone = lookup.names_for(raw.pu_location_id);
            let dropoff_zone = lookup.names_for(raw.do_location_id);
            if pickup_zone.name.is_none() {
                pickup_unmatched += 1;
            }
            if dropoff_zone.name.is_none() {
                dropoff_unmatched += 1;
            }
            TripRecord {
                raw,
                pickup_zone,
                dropoff_zone,
            }
        })
        .collect();

    debug!(records = records.len(), zones = lookup.len(), "Zone merge finished");
    audit.record(format!(
        "Merged {} records with {} zones ({} pickup and {} dropoff ids without a zone match)",
        records.len(),
        lookup.len(),
        pickup_unmatched,
        dropoff_unmatched
    ));

    records
}
