//! Append-only audit trail for a cleaning run.
//!
//! The log is an explicit object handed to each stage. Every message is kept in
//! memory, mirrored to `tracing`, and optionally appended to a text file as
//! `[YYYY-MM-DD HH:MM:SS] <message>`.

use chrono::{Local, NaiveDateTime};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tracing::{info, warn};

pub const AUDIT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Why a row was removed from the working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    PickupCutoff,
    MissingCriticalField,
    Duplicate,
    NegativeDistance,
    NegativeTotal,
    DurationOutOfRange,
    ZeroDistancePositiveFare,
    ZeroDistance,
    FarePerMileTooHigh,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DropReason::PickupCutoff => "pickup on or after the cutoff date",
            DropReason::MissingCriticalField => "missing critical fields",
            DropReason::Duplicate => "duplicate trips",
            DropReason::NegativeDistance => "negative trip distance",
            DropReason::NegativeTotal => "negative total amount",
            DropReason::DurationOutOfRange => "duration under 1 minute or over 180 minutes",
            DropReason::ZeroDistancePositiveFare => "zero distance but positive fare",
            DropReason::ZeroDistance => "zero distance",
            DropReason::FarePerMileTooHigh => "fare per mile above $100",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub timestamp: NaiveDateTime,
    pub message: String,
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.timestamp.format(AUDIT_TIMESTAMP_FORMAT),
            self.message
        )
    }
}

pub struct AuditLog {
    sink: Option<Box<dyn Write + Send>>,
    entries: Vec<AuditEntry>,
    removals: Vec<(DropReason, usize)>,
}

impl AuditLog {
    /// A log that only keeps entries in memory.
    pub fn in_memory() -> Self {
        Self {
            sink: None,
            entries: Vec::new(),
            removals: Vec::new(),
        }
    }

    /// A log that also appends each line to `writer`.
    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            sink: Some(Box::new(writer)),
            ..Self::in_memory()
        }
    }

    /// Opens `path` for appending, creating it and its parent directory if needed.
    pub fn append_to_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().append(true).create(true).open(path)?;
        Ok(Self::with_writer(file))
    }

    pub fn record(&mut self, message: impl Into<String>) {
        let entry = AuditEntry {
            timestamp: Local::now().naive_local(),
            message: message.into(),
        };
        info!(target: "audit", "{}", entry.message);

        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = writeln!(sink, "{entry}").and_then(|_| sink.flush()) {
                warn!(error = %e, "Failed to append to audit log");
            }
        }

        self.entries.push(entry);
    }

    /// Logs a removal pass and remembers its count for later queries.
    pub fn removed(&mut self, reason: DropReason, count: usize, remaining: usize) {
        self.removals.push((reason, count));
        self.record(format!(
            "Removed {count} rows: {reason} ({remaining} remaining)"
        ));
    }

    pub fn banner(&mut self, title: &str) {
        let rule = "=".repeat(50);
        self.record(rule.clone());
        self.record(title);
        self.record(rule);
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// Total rows removed for `reason` across the run.
    pub fn removed_for(&self, reason: DropReason) -> usize {
        self.removals
            .iter()
            .filter(|(r, _)| *r == reason)
            .map(|(_, n)| n)
            .sum()
    }

    pub fn total_removed(&self) -> usize {
        self.removals.iter().map(|(_, n)| n).sum()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|e| e.message.contains(needle))
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLog")
            .field("file_backed", &self.sink.is_some())
            .field("entries", &self.entries.len())
            .finish()
    }
}
