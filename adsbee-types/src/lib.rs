//! # adsbee-types
//!
//! Snapshot types for the ADSBee metrics stream, plus the permissive decoder
//! that turns one raw stream message into a [`Snapshot`].
//!
//! ## Wire format
//!
//! Each message is a single JSON object with three optional sub-records:
//!
//! ```json
//! {
//!   "aircraft_dictionary_metrics": { "raw_squitter_frames": 1200, "demods_1090": 3000 },
//!   "server_metrics": { "feed_uri": ["feed.example", ""], "feed_mps": [1.5, 0.0] },
//!   "device_status": { "pico": { "uptime_ms": 65000, "core_0_usage_percent": 42.5 } }
//! }
//! ```
//!
//! ## Design Goals
//!
//! - **Never fail on content**: only invalid JSON is an error
//! - **Per-field coercion**: a bad field is skipped without losing its siblings
//! - **Absent means absent**: missing fields stay `None` so consumers keep
//!   their previous values
//!
//! ## Example
//!
//! ```rust
//! use adsbee_types::parse_snapshot;
//!
//! let raw = br#"{"server_metrics": {"feed_uri": ["A", "", "B"], "feed_mps": [1.5, 9.9, 2.25]}}"#;
//! let snapshot = parse_snapshot(raw).unwrap();
//!
//! let server = snapshot.server.unwrap();
//! let named = server.pairs().filter(|(uri, _)| uri.is_some_and(|u| !u.is_empty()));
//! assert_eq!(named.count(), 2);
//! ```

pub mod coerce;
mod error;
mod parse;
mod snapshot;

pub use error::ParseError;
pub use parse::{core_label, parse_snapshot, snapshot_from_value};
pub use snapshot::*;
