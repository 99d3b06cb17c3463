//! Batch cleaning of raw trip records.
//!
//! Stages run in a fixed order: zone merge, quality filtering, feature
//! derivation. Each takes its rows by value and returns the surviving rows,
//! writing what it removed to the [`AuditLog`](crate::audit::AuditLog).

pub mod features;
pub mod normalize;
pub mod pipeline;
pub mod quality;

use crate::audit::{AuditLog, DropReason};

/// Keeps the rows matching `keep` and logs how many were removed.
pub(crate) fn retain_logged<T>(
    rows: Vec<T>,
    reason: DropReason,
    audit: &mut AuditLog,
    mut keep: impl FnMut(&T) -> bool,
) -> Vec<T> {
    let before = rows.len();
    let kept: Vec<T> = rows.into_iter().filter(|row| keep(row)).collect();
    audit.removed(reason, before - kept.len(), kept.len());
    kept
}
