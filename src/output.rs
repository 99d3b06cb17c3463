//! Output formatting and persistence for cleaned trips and query results.
//!
//! Supports pretty-printing, JSON serialization, and CSV writing.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::model::CleanTrip;

/// Logs a value using Rust's debug pretty-print format.
pub fn print_pretty<T: std::fmt::Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Prints a value as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, value)?;
    writeln!(handle)?;
    Ok(())
}

/// Serializes trips as CSV with a header row, returning the inner writer.
pub fn write_trips<W: Write>(writer: W, trips: &[CleanTrip]) -> Result<W> {
    let mut wtr = csv::Writer::from_writer(writer);
    for trip in trips {
        wtr.serialize(trip)?;
    }
    wtr.flush()?;
    wtr.into_inner().map_err(|e| e.into_error().into())
}

/// Writes the cleaned table to `path`, replacing any previous file.
///
/// With `gzip` the data is compressed and `.gz` is appended to the path.
/// Returns the path actually written.
pub fn write_cleaned(path: &Path, trips: &[CleanTrip], gzip: bool) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let target = if gzip {
        let mut name = path.as_os_str().to_owned();
        name.push(".gz");
        PathBuf::from(name)
    } else {
        path.to_path_buf()
    };
    debug!(path = %target.display(), gzip, rows = trips.len(), "Writing cleaned trips");

    replace_file(&target, |file| {
        let file = if gzip {
            write_trips(GzEncoder::new(file, Compression::default()), trips)?.finish()?
        } else {
            write_trips(file, trips)?
        };
        file.sync_all()?;
        Ok(())
    })?;

    info!(path = %target.display(), rows = trips.len(), "Cleaned trips written");
    Ok(target)
}

/// Sibling path that `target` is staged at before being renamed into place.
fn staging_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Runs `write` against a staging file and renames it onto `target` only if
/// it succeeds. On failure the staging file is removed and `target` is left
/// as it was.
fn replace_file(target: &Path, write: impl FnOnce(File) -> Result<()>) -> Result<()> {
    let staging = staging_path(target);
    let file = File::create(&staging)
        .with_context(|| format!("failed to create {}", staging.display()))?;

    let result = write(file).and_then(|()| {
        fs::rename(&staging, target)
            .with_context(|| format!("failed to move output into {}", target.display()))
    });
    if result.is_err() {
        if let Err(e) = fs::remove_file(&staging) {
            warn!(path = %staging.display(), error = %e, "Failed to remove partial output");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_timestamp;
    use crate::source::read_clean_trips;
    use flate2::read::GzDecoder;
    use std::env;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    fn trip() -> CleanTrip {
        CleanTrip {
            pickup_datetime: parse_timestamp("2024-01-01 08:00:00").unwrap(),
            dropoff_datetime: parse_timestamp("2024-01-01 08:12:00").unwrap(),
            pu_location_id: 161,
            do_location_id: 236,
            trip_distance: 2.5,
            passenger_count: 1,
            fare_amount: Some(14.2),
            tip_amount: Some(3.0),
            tolls_amount: None,
            total_amount: 20.0,
            payment_type: Some(1),
            pickup_zone_name: Some("Midtown Center".to_string()),
            pickup_borough: Some("Manhattan".to_string()),
            dropoff_zone_name: Some("Upper East Side North".to_string()),
            dropoff_borough: Some("Manhattan".to_string()),
            pickup_hour: 8,
            trip_duration_minutes: 12.0,
            fare_per_mile: 8.0,
        }
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&trip());
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&trip()).unwrap();
    }

    #[test]
    fn test_write_cleaned_reads_back() {
        let path = temp_path("taxi_cleaner_test_output/cleaned.csv");
        let _ = fs::remove_file(&path);

        let written = write_cleaned(&path, &[trip(), trip()], false).unwrap();
        assert_eq!(written, path);

        let trips = read_clean_trips(File::open(&path).unwrap()).unwrap();
        assert_eq!(trips, vec![trip(), trip()]);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_cleaned_overwrites() {
        let path = temp_path("taxi_cleaner_test_overwrite.csv");
        let _ = fs::remove_file(&path);

        write_cleaned(&path, &[trip(), trip()], false).unwrap();
        write_cleaned(&path, &[trip()], false).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        // 1 header + 1 data row
        assert_eq!(content.lines().count(), 2);

        fs::remove_file(&path).unwrap();
    }

    /// Passes through `budget` bytes, then fails every write.
    struct FailAfter<W> {
        inner: W,
        budget: usize,
    }

    impl<W: Write> Write for FailAfter<W> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::other("disk full"));
            }
            let n = buf.len().min(self.budget);
            self.budget -= n;
            self.inner.write(&buf[..n])
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    #[test]
    fn test_failed_write_keeps_previous_output() {
        let path = temp_path("taxi_cleaner_test_failed_write.csv");
        fs::write(&path, "previous run\n").unwrap();

        let result = replace_file(&path, |file| {
            let writer = FailAfter { inner: file, budget: 64 };
            write_trips(writer, &[trip(), trip(), trip()])?;
            Ok(())
        });

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "previous run\n");
        assert!(!staging_path(&path).exists());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_cleaned_leaves_no_staging_file() {
        let path = temp_path("taxi_cleaner_test_staging.csv");
        write_cleaned(&path, &[trip()], false).unwrap();

        assert!(path.exists());
        assert!(!staging_path(&path).exists());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_cleaned_gzip() {
        let path = temp_path("taxi_cleaner_test_gzip.csv");
        let written = write_cleaned(&path, &[trip()], true).unwrap();
        assert_eq!(written, temp_path("taxi_cleaner_test_gzip.csv.gz"));

        let decoder = GzDecoder::new(File::open(&written).unwrap());
        let trips = read_clean_trips(decoder).unwrap();
        assert_eq!(trips, vec![trip()]);

        fs::remove_file(&written).unwrap();
    }
}
