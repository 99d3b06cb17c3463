//! Orchestrates a full cleaning run over one in-memory batch.

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use serde::Serialize;
use tracing::info;

use super::normalize::{ZoneLookup, normalize};
use super::{features, quality, retain_logged};
use crate::audit::{AuditLog, DropReason};
use crate::model::{CleanTrip, RawTrip, parse_timestamp};
use crate::output::write_cleaned;
use crate::source::{load_trips, load_zones};
use crate::stats::pct;

pub const DEFAULT_SEED: u64 = 42;

/// Restrictions applied to the raw batch before cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Keep a uniform random sample of at most this many rows.
    pub sample_size: Option<usize>,
    pub seed: u64,
    /// Drop rows picked up on or after midnight of this date.
    pub cutoff: Option<NaiveDate>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            sample_size: None,
            seed: DEFAULT_SEED,
            cutoff: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleaningSummary {
    /// Rows read from the trip table.
    pub loaded_records: usize,
    /// Rows entering the cleaning stages after sampling and cutoff.
    pub original_records: usize,
    pub final_records: usize,
    pub removed_records: usize,
    pub removed_pct: f64,
}

#[derive(Debug)]
pub struct CleaningOutput {
    pub trips: Vec<CleanTrip>,
    pub summary: CleaningSummary,
}

/// Drops rows whose pickup falls on or after `cutoff`. Rows without a
/// parseable pickup are left for the quality filter.
pub fn restrict_before(trips: Vec<RawTrip>, cutoff: NaiveDate, audit: &mut AuditLog) -> Vec<RawTrip> {
    let Some(limit) = cutoff.and_hms_opt(0, 0, 0) else {
        return trips;
    };
    retain_logged(trips, DropReason::PickupCutoff, audit, |t| {
        match t.pickup_datetime.as_deref().and_then(parse_timestamp) {
            Some(pickup) => pickup < limit,
            None => true,
        }
    })
}

/// Uniform random sample of `size` rows, in their original order.
/// Deterministic for a given `seed`.
pub fn sample(trips: Vec<RawTrip>, size: usize, seed: u64, audit: &mut AuditLog) -> Vec<RawTrip> {
    let total = trips.len();
    if size >= total {
        audit.record(format!(
            "Sample size {size} covers all {total} records, no sampling applied"
        ));
        return trips;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut keep = vec![false; total];
    for i in index::sample(&mut rng, total, size).iter() {
        keep[i] = true;
    }

    let sampled: Vec<RawTrip> = trips
        .into_iter()
        .zip(keep)
        .filter_map(|(trip, k)| k.then_some(trip))
        .collect();
    audit.record(format!(
        "Sampled {} of {} records (seed {})",
        sampled.len(),
        total,
        seed
    ));
    sampled
}

/// Applies the cutoff first, then sampling, so the sample size is honoured.
pub fn apply_restrictions(
    trips: Vec<RawTrip>,
    options: &PipelineOptions,
    audit: &mut AuditLog,
) -> Vec<RawTrip> {
    let trips = match options.cutoff {
        Some(cutoff) => restrict_before(trips, cutoff, audit),
        None => trips,
    };
    match options.sample_size {
        Some(size) => sample(trips, size, options.seed, audit),
        None => trips,
    }
}

/// Restrictions, zone merge, quality filter and feature derivation, followed
/// by the summary lines. No banners.
pub fn clean(
    trips: Vec<RawTrip>,
    lookup: &ZoneLookup,
    options: &PipelineOptions,
    audit: &mut AuditLog,
) -> CleaningOutput {
    let loaded_records = trips.len();
    let trips = apply_restrictions(trips, options, audit);
    let original_records = trips.len();

    let records = normalize(trips, lookup, audit);
    let trips = quality::filter(records, audit);
    let clean = features::derive(trips, audit);

    let final_records = clean.len();
    let removed_records = original_records - final_records;
    let summary = CleaningSummary {
        loaded_records,
        original_records,
        final_records,
        removed_records,
        removed_pct: pct(removed_records, original_records),
    };

    audit.record(format!("Original records: {original_records}"));
    audit.record(format!("Final records: {final_records}"));
    audit.record(format!(
        "Removed records: {} ({:.2}%)",
        removed_records, summary.removed_pct
    ));
    info!(
        original = original_records,
        kept = final_records,
        removed = removed_records,
        "Cleaning finished"
    );

    CleaningOutput {
        trips: clean,
        summary,
    }
}

/// Runs the pipeline over an in-memory batch with header and footer banners.
pub fn run(
    trips: Vec<RawTrip>,
    lookup: &ZoneLookup,
    options: &PipelineOptions,
    audit: &mut AuditLog,
) -> CleaningOutput {
    audit.banner("Starting data cleaning pipeline");
    let output = clean(trips, lookup, options, audit);
    audit.record("Data cleaning pipeline completed");
    output
}

/// Where a cleaning job reads from and writes to.
#[derive(Debug, Clone)]
pub struct CleaningJob {
    pub trips_source: String,
    pub zones_source: String,
    pub output: PathBuf,
    pub gzip: bool,
    pub options: PipelineOptions,
}

/// Loads both input artifacts, cleans, and writes the output table.
///
/// Any failure is appended to the audit log before it is returned; in that
/// case no output file is written.
#[tracing::instrument(skip(audit), fields(trips = %job.trips_source, zones = %job.zones_source))]
pub async fn execute(job: &CleaningJob, audit: &mut AuditLog) -> Result<CleaningSummary> {
    audit.banner("Starting data cleaning pipeline");

    match execute_stages(job, audit).await {
        Ok(summary) => {
            audit.record("Data cleaning pipeline completed");
            Ok(summary)
        }
        Err(e) => {
            audit.record(format!("Pipeline FAILED: {e:#}"));
            Err(e)
        }
    }
}

async fn execute_stages(job: &CleaningJob, audit: &mut AuditLog) -> Result<CleaningSummary> {
    let load = load_trips(&job.trips_source).await?;
    audit.record(format!(
        "Loaded {} records from {}",
        load.trips.len(),
        job.trips_source
    ));
    if load.skipped > 0 {
        audit.record(format!("Skipped {} unreadable rows", load.skipped));
    }

    let lookup = load_zones(&job.zones_source).await?;
    audit.record(format!(
        "Loaded {} zones from {}",
        lookup.len(),
        job.zones_source
    ));

    let output = clean(load.trips, &lookup, &job.options, audit);

    let written = write_cleaned(&job.output, &output.trips, job.gzip)?;
    audit.record(format!("Saved cleaned data to {}", written.display()));

    Ok(output.summary)
}
