//! CLI entry point for the taxi trip cleaner.
//!
//! Provides subcommands for cleaning a raw trip table against the zone lookup,
//! ranking the busiest pickup zones, and summarizing a cleaned table.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use taxi_cleaner::audit::AuditLog;
use taxi_cleaner::cleaning::pipeline::{CleaningJob, DEFAULT_SEED, PipelineOptions, execute};
use taxi_cleaner::output::{print_json, print_pretty};
use taxi_cleaner::ranking::top_n_zones;
use taxi_cleaner::source::{load_clean_trips, load_pickups};
use taxi_cleaner::stats::{HourlyFare, TripSummary, average_fare_by_hour, filter_trips, summarize};
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "taxi_cleaner")]
#[command(about = "Clean taxi trip records and rank the busiest pickup zones", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean a raw trip table and write the enriched result
    Clean {
        /// Trip table: path to a CSV file or URL to fetch
        #[arg(short, long, value_name = "FILE_OR_URL")]
        trips: String,

        /// Zone lookup table: path to a CSV file or URL to fetch
        #[arg(short, long, value_name = "FILE_OR_URL", default_value = "data/raw/taxi_zone_lookup.csv")]
        zones: String,

        /// CSV file to write cleaned trips to
        #[arg(short, long, default_value = "data/processed/cleaned_taxi_data.csv")]
        output: PathBuf,

        /// Text file the cleaning audit log is appended to
        #[arg(long, default_value = "data/cleaning_log.txt")]
        audit_log: PathBuf,

        /// Keep a uniform random sample of this many records
        #[arg(long)]
        sample_size: Option<usize>,

        /// Seed for sampling
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        /// Drop records picked up on or after this date (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        before: Option<NaiveDate>,

        /// Gzip compress the cleaned output
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Rank the busiest pickup zones of a trip table
    TopZones {
        /// Trip table (raw or cleaned): path or URL
        #[arg(short, long, value_name = "FILE_OR_URL")]
        input: String,

        /// Number of zones to return
        #[arg(short, default_value_t = 10, allow_negative_numbers = true)]
        n: i64,

        /// Print the ranking as JSON on stdout
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Summarize a cleaned trip table
    Summary {
        /// Cleaned trip table: path or URL
        #[arg(short, long, value_name = "FILE_OR_URL")]
        input: String,

        /// Print the summary as JSON on stdout
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List cleaned trips filtered by pickup borough and hour, as JSON
    Trips {
        /// Cleaned trip table: path or URL
        #[arg(short, long, value_name = "FILE_OR_URL")]
        input: String,

        /// Pickup borough, case-insensitive
        #[arg(short, long)]
        borough: Option<String>,

        /// Pickup hour (0-23)
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..24))]
        hour: Option<u32>,

        /// Maximum number of trips to print
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },
}

#[derive(Debug, Serialize)]
struct SummaryReport {
    summary: TripSummary,
    average_fare_by_hour: Vec<HourlyFare>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/taxi_cleaner.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("taxi_cleaner.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Clean {
            trips,
            zones,
            output,
            audit_log,
            sample_size,
            seed,
            before,
            gzip,
        } => {
            let mut audit = AuditLog::append_to_file(&audit_log)
                .with_context(|| format!("failed to open audit log {}", audit_log.display()))?;
            let job = CleaningJob {
                trips_source: trips,
                zones_source: zones,
                output,
                gzip,
                options: PipelineOptions {
                    sample_size,
                    seed,
                    cutoff: before,
                },
            };

            match execute(&job, &mut audit).await {
                Ok(summary) => {
                    print_pretty(&summary);
                    info!(
                        original = summary.original_records,
                        kept = summary.final_records,
                        removed_pct = %format!("{:.2}", summary.removed_pct),
                        "Cleaning run complete"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Cleaning run failed");
                    return Err(e);
                }
            }
        }
        Commands::TopZones { input, n, json } => {
            let records = load_pickups(&input).await?;
            let top = top_n_zones(&records, n)?;

            info!(records = records.len(), n, returned = top.len(), "Zones ranked");

            if json {
                print_json(&top)?;
            } else {
                for (rank, entry) in top.iter().enumerate() {
                    info!(rank = rank + 1, zone_id = entry.zone_id, pickups = entry.count, "Zone");
                }
            }
        }
        Commands::Summary { input, json } => {
            let trips = load_clean_trips(&input).await?;
            let report = SummaryReport {
                summary: summarize(&trips),
                average_fare_by_hour: average_fare_by_hour(&trips),
            };

            if json {
                print_json(&report)?;
            } else {
                let s = &report.summary;
                info!(
                    total_trips = s.total_trips,
                    avg_fare = %format!("{:.2}", s.avg_fare),
                    avg_distance = %format!("{:.2}", s.avg_distance),
                    avg_duration_minutes = %format!("{:.2}", s.avg_duration_minutes),
                    avg_fare_per_mile = %format!("{:.2}", s.avg_fare_per_mile),
                    "Trip summary"
                );
                for h in &report.average_fare_by_hour {
                    info!(hour = h.hour, trips = h.trips, avg_fare = %format!("{:.2}", h.avg_fare), "Hourly fare");
                }
            }
        }
        Commands::Trips {
            input,
            borough,
            hour,
            limit,
        } => {
            let trips = load_clean_trips(&input).await?;
            let matching = filter_trips(&trips, borough.as_deref(), hour);
            info!(matching = matching.len(), limit, "Trips filtered");

            let page: Vec<_> = matching.into_iter().take(limit).collect();
            print_json(&page)?;
        }
    }

    Ok(())
}
