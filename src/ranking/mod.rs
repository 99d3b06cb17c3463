//! Zone popularity queries: per-zone pickup counts and the top-N ranking.
//!
//! [`count_zones`] and [`rank_zones`] are the entry points a transport layer
//! calls; both are read-only over their input.

pub mod counter;
pub mod ranker;

pub use counter::{PickupRecord, ZoneCount, ZoneCounts, count_zones};
pub use ranker::{rank_zones, top_n_zones};
