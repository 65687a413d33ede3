//! drip-ingest: storage-export snapshots into drip-core types.
//!
//! Rows with unusable dates are dropped or degraded, never rejected: a
//! missing reminder is acceptable, a failed run is not.

pub mod types;
pub mod parsers;

pub use types::{RawContentItem, RawEnrollment, RawProfile, RawRound, RawSession, RawSnapshot};
pub use parsers::profiles::{parse_profiles_json, profiles_from_raw};
pub use parsers::snapshot::{parse_snapshot_json, Snapshot};
