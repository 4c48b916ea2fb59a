//! Snapshot - one decoded telemetry update from the metrics stream.

use std::collections::BTreeMap;
use std::fmt;

/// One decoded telemetry message.
///
/// Every sub-record is optional: a message may carry any subset of the
/// aircraft dictionary counters, the server feed rates and the device status
/// table. A sub-record that was absent (or not a JSON object) on the wire is
/// `None` here, and consumers must leave the corresponding gauges untouched.
///
/// # Example
///
/// ```rust
/// use adsbee_types::{AircraftCounter, Snapshot};
///
/// let snapshot = Snapshot::builder()
///     .aircraft(|a| a.counter(AircraftCounter::Demods1090, 12.0))
///     .feed("feed.adsb.lol", 1.5)
///     .device("pico", |d| d.uptime_ms(5_000.0).core_usage("core_0", 42.5))
///     .build();
///
/// assert!(snapshot.server.is_some());
/// assert_eq!(snapshot.devices().count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    /// Counters from `aircraft_dictionary_metrics`.
    pub aircraft: Option<AircraftDictionaryMetrics>,

    /// Feed rates from `server_metrics`.
    pub server: Option<ServerMetrics>,

    /// Per-device records from `device_status`, keyed by device name.
    pub device_status: Option<BTreeMap<String, DeviceRecord>>,

    /// Dotted paths of fields that were present but could not be coerced.
    pub skipped_fields: Vec<String>,
}

impl Snapshot {
    /// Create a builder for constructing snapshots.
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    /// Check if the snapshot carries no sub-records at all.
    pub fn is_empty(&self) -> bool {
        self.aircraft.is_none() && self.server.is_none() && self.device_status.is_none()
    }

    /// Iterate over device records, if any.
    pub fn devices(&self) -> impl Iterator<Item = (&String, &DeviceRecord)> {
        self.device_status.iter().flat_map(|devices| devices.iter())
    }
}

/// The fixed set of integer counters in `aircraft_dictionary_metrics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AircraftCounter {
    RawSquitterFrames,
    ValidSquitterFrames,
    RawExtendedSquitterFrames,
    ValidExtendedSquitterFrames,
    Demods1090,
    RawUatAdsbFrames,
    ValidUatAdsbFrames,
    RawUatUplinkFrames,
    ValidUatUplinkFrames,
    NumModeSAircraft,
    NumUatAircraft,
}

impl AircraftCounter {
    /// Every counter, in wire order.
    pub const ALL: [AircraftCounter; 11] = [
        AircraftCounter::RawSquitterFrames,
        AircraftCounter::ValidSquitterFrames,
        AircraftCounter::RawExtendedSquitterFrames,
        AircraftCounter::ValidExtendedSquitterFrames,
        AircraftCounter::Demods1090,
        AircraftCounter::RawUatAdsbFrames,
        AircraftCounter::ValidUatAdsbFrames,
        AircraftCounter::RawUatUplinkFrames,
        AircraftCounter::ValidUatUplinkFrames,
        AircraftCounter::NumModeSAircraft,
        AircraftCounter::NumUatAircraft,
    ];

    /// The JSON field name carrying this counter.
    pub const fn field_name(self) -> &'static str {
        match self {
            AircraftCounter::RawSquitterFrames => "raw_squitter_frames",
            AircraftCounter::ValidSquitterFrames => "valid_squitter_frames",
            AircraftCounter::RawExtendedSquitterFrames => "raw_extended_squitter_frames",
            AircraftCounter::ValidExtendedSquitterFrames => "valid_extended_squitter_frames",
            AircraftCounter::Demods1090 => "demods_1090",
            AircraftCounter::RawUatAdsbFrames => "raw_uat_adsb_frames",
            AircraftCounter::ValidUatAdsbFrames => "valid_uat_adsb_frames",
            AircraftCounter::RawUatUplinkFrames => "raw_uat_uplink_frames",
            AircraftCounter::ValidUatUplinkFrames => "valid_uat_uplink_frames",
            AircraftCounter::NumModeSAircraft => "num_mode_s_aircraft",
            AircraftCounter::NumUatAircraft => "num_uat_aircraft",
        }
    }
}

impl fmt::Display for AircraftCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Counters decoded from `aircraft_dictionary_metrics`.
///
/// Only counters that were present and coercible are stored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AircraftDictionaryMetrics {
    pub counters: BTreeMap<AircraftCounter, f64>,
}

impl AircraftDictionaryMetrics {
    /// Get a counter value, if it was present in the message.
    pub fn get(&self, counter: AircraftCounter) -> Option<f64> {
        self.counters.get(&counter).copied()
    }

    /// Iterate over the counters that were present.
    pub fn iter(&self) -> impl Iterator<Item = (AircraftCounter, f64)> + '_ {
        self.counters.iter().map(|(counter, value)| (*counter, *value))
    }
}

/// Feed rates decoded from `server_metrics`.
///
/// The two sequences are kept exactly as they were on the wire: index-aligned,
/// with `None` in place of any entry that could not be decoded. Pairing and
/// filtering is left to the consumer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServerMetrics {
    /// `feed_uri` as label text; `None` for entries with no usable label
    /// (null, `false`, zero, arrays and objects).
    pub feed_uri: Vec<Option<String>>,

    /// `feed_mps`; `None` for entries that are not numeric.
    pub feed_mps: Vec<Option<f64>>,
}

impl ServerMetrics {
    /// Iterate the two sequences pairwise, up to the shorter length.
    pub fn pairs(&self) -> impl Iterator<Item = (Option<&str>, Option<f64>)> + '_ {
        self.feed_uri
            .iter()
            .zip(self.feed_mps.iter())
            .map(|(uri, mps)| (uri.as_deref(), *mps))
    }
}

/// Status of a single device from `device_status`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceRecord {
    pub uptime_ms: Option<f64>,
    pub temperature_deg_c: Option<f64>,
    pub heap_free_bytes: Option<f64>,
    pub heap_largest_free_block_bytes: Option<f64>,

    /// Usage percentages keyed by core label (`core_0`, `user_core`, ...).
    pub core_usage_percent: BTreeMap<String, f64>,
}

/// Builder for constructing `Snapshot` instances.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    snapshot: Snapshot,
}

impl SnapshotBuilder {
    /// Add aircraft dictionary counters built using a closure.
    pub fn aircraft<F>(mut self, f: F) -> Self
    where
        F: FnOnce(AircraftBuilder) -> AircraftBuilder,
    {
        let existing = self.snapshot.aircraft.take().unwrap_or_default();
        self.snapshot.aircraft = Some(f(AircraftBuilder(existing)).0);
        self
    }

    /// Append one `feed_uri`/`feed_mps` pair.
    pub fn feed(mut self, uri: impl Into<String>, mps: f64) -> Self {
        let server = self.snapshot.server.get_or_insert_with(ServerMetrics::default);
        server.feed_uri.push(Some(uri.into()));
        server.feed_mps.push(Some(mps));
        self
    }

    /// Add a device record built using a closure.
    pub fn device<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(DeviceBuilder) -> DeviceBuilder,
    {
        let record = f(DeviceBuilder(DeviceRecord::default())).0;
        self.snapshot
            .device_status
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), record);
        self
    }

    /// Build the snapshot.
    pub fn build(self) -> Snapshot {
        self.snapshot
    }
}

/// Builder for aircraft dictionary counters.
#[derive(Debug)]
pub struct AircraftBuilder(AircraftDictionaryMetrics);

impl AircraftBuilder {
    /// Set a counter value.
    pub fn counter(mut self, counter: AircraftCounter, value: f64) -> Self {
        self.0.counters.insert(counter, value);
        self
    }
}

/// Builder for device records.
#[derive(Debug)]
pub struct DeviceBuilder(DeviceRecord);

impl DeviceBuilder {
    pub fn uptime_ms(mut self, ms: f64) -> Self {
        self.0.uptime_ms = Some(ms);
        self
    }

    pub fn temperature_deg_c(mut self, deg_c: f64) -> Self {
        self.0.temperature_deg_c = Some(deg_c);
        self
    }

    pub fn core_usage(mut self, core: impl Into<String>, percent: f64) -> Self {
        self.0.core_usage_percent.insert(core.into(), percent);
        self
    }
}
