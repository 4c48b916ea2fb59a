//! Mapping from decoded snapshots onto the exported gauges.

use std::sync::Arc;

use adsbee_types::{AircraftCounter, AircraftDictionaryMetrics, DeviceRecord, ServerMetrics, Snapshot};
use tracing::trace;

use crate::MetricRegistry;

pub const FEED_MPS: &str = "adsbee_feed_mps";
pub const DEVICE_UPTIME: &str = "adsbee_device_uptime_seconds";
pub const DEVICE_TEMPERATURE: &str = "adsbee_device_temperature_deg_c";
pub const DEVICE_HEAP_FREE: &str = "adsbee_device_heap_free_bytes";
pub const DEVICE_HEAP_LARGEST_FREE_BLOCK: &str = "adsbee_device_heap_largest_free_block_bytes";
pub const DEVICE_CORE_USAGE: &str = "adsbee_device_core_usage_percent";

/// Gauge name and help text for an aircraft dictionary counter.
pub const fn counter_gauge(counter: AircraftCounter) -> (&'static str, &'static str) {
    match counter {
        AircraftCounter::RawSquitterFrames => (
            "adsbee_raw_squitter_frames_current",
            "Latest absolute value for raw squitter frames.",
        ),
        AircraftCounter::ValidSquitterFrames => (
            "adsbee_valid_squitter_frames_current",
            "Latest absolute value for valid squitter frames.",
        ),
        AircraftCounter::RawExtendedSquitterFrames => (
            "adsbee_raw_extended_squitter_frames_current",
            "Latest absolute value for raw extended squitter frames.",
        ),
        AircraftCounter::ValidExtendedSquitterFrames => (
            "adsbee_valid_extended_squitter_frames_current",
            "Latest absolute value for valid extended squitter frames.",
        ),
        AircraftCounter::Demods1090 => (
            "adsbee_demods_1090_current",
            "Latest absolute value for 1090 demods.",
        ),
        AircraftCounter::RawUatAdsbFrames => (
            "adsbee_raw_uat_adsb_frames_current",
            "Latest absolute value for raw UAT ADS-B frames.",
        ),
        AircraftCounter::ValidUatAdsbFrames => (
            "adsbee_valid_uat_adsb_frames_current",
            "Latest absolute value for valid UAT ADS-B frames.",
        ),
        AircraftCounter::RawUatUplinkFrames => (
            "adsbee_raw_uat_uplink_frames_current",
            "Latest absolute value for raw UAT uplink frames.",
        ),
        AircraftCounter::ValidUatUplinkFrames => (
            "adsbee_valid_uat_uplink_frames_current",
            "Latest absolute value for valid UAT uplink frames.",
        ),
        AircraftCounter::NumModeSAircraft => (
            "adsbee_num_mode_s_aircraft_current",
            "Latest absolute value for number of Mode S aircraft.",
        ),
        AircraftCounter::NumUatAircraft => (
            "adsbee_num_uat_aircraft_current",
            "Latest absolute value for number of UAT aircraft.",
        ),
    }
}

/// Applies snapshots to a [`MetricRegistry`].
///
/// Creating an updater registers every gauge family, so the eleven unlabeled
/// aircraft gauges are scrapeable (at `0`) before the first message arrives.
/// Applying a snapshot only ever writes the gauges whose fields are present;
/// everything else keeps its last value.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use adsbee_metrics::{MetricRegistry, MetricUpdater};
/// use adsbee_types::Snapshot;
///
/// let registry = Arc::new(MetricRegistry::new());
/// let updater = MetricUpdater::new(registry.clone());
///
/// updater.apply(&Snapshot::builder().feed("A", 1.5).feed("", 9.9).build());
/// assert_eq!(registry.get("adsbee_feed_mps", &["A"]), Some(1.5));
/// ```
#[derive(Debug, Clone)]
pub struct MetricUpdater {
    registry: Arc<MetricRegistry>,
}

impl MetricUpdater {
    /// Create an updater and register all exported gauges.
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        for counter in AircraftCounter::ALL {
            let (name, help) = counter_gauge(counter);
            registry.register_gauge(name, help);
        }

        registry.register_gauge_vec(
            FEED_MPS,
            "Messages per second per upstream feed URI.",
            &["feed_uri"],
        );
        registry.register_gauge_vec(DEVICE_UPTIME, "Device uptime in seconds.", &["device"]);
        registry.register_gauge_vec(
            DEVICE_CORE_USAGE,
            "Device CPU core usage percent.",
            &["device", "core"],
        );
        registry.register_gauge_vec(
            DEVICE_TEMPERATURE,
            "Device temperature in degrees Celsius.",
            &["device"],
        );
        registry.register_gauge_vec(DEVICE_HEAP_FREE, "Device heap free bytes.", &["device"]);
        registry.register_gauge_vec(
            DEVICE_HEAP_LARGEST_FREE_BLOCK,
            "Device largest free heap block in bytes.",
            &["device"],
        );

        Self { registry }
    }

    /// The registry this updater writes to.
    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Apply one snapshot. Returns the number of gauge cells written.
    pub fn apply(&self, snapshot: &Snapshot) -> usize {
        let mut written = 0;

        if let Some(aircraft) = &snapshot.aircraft {
            written += self.apply_aircraft(aircraft);
        }
        if let Some(server) = &snapshot.server {
            written += self.apply_server(server);
        }
        for (device, record) in snapshot.devices() {
            written += self.apply_device(device, record);
        }

        trace!(written, "applied snapshot");
        written
    }

    fn apply_aircraft(&self, aircraft: &AircraftDictionaryMetrics) -> usize {
        let mut written = 0;
        for (counter, value) in aircraft.iter() {
            let (name, _) = counter_gauge(counter);
            self.registry.set_absolute(name, value);
            written += 1;
        }
        written
    }

    fn apply_server(&self, server: &ServerMetrics) -> usize {
        let mut written = 0;
        for (uri, mps) in server.pairs() {
            let (Some(uri), Some(mps)) = (uri, mps) else {
                continue;
            };
            if uri.is_empty() {
                continue;
            }
            self.registry.set_labeled(FEED_MPS, &[uri], mps);
            written += 1;
        }
        written
    }

    fn apply_device(&self, device: &str, record: &DeviceRecord) -> usize {
        let fields = [
            (DEVICE_UPTIME, record.uptime_ms.map(|ms| ms / 1000.0)),
            (DEVICE_TEMPERATURE, record.temperature_deg_c),
            (DEVICE_HEAP_FREE, record.heap_free_bytes),
            (DEVICE_HEAP_LARGEST_FREE_BLOCK, record.heap_largest_free_block_bytes),
        ];

        let mut written = 0;
        for (name, value) in fields {
            if let Some(value) = value {
                self.registry.set_labeled(name, &[device], value);
                written += 1;
            }
        }

        for (core, percent) in &record.core_usage_percent {
            self.registry
                .set_labeled(DEVICE_CORE_USAGE, &[device, core.as_str()], *percent);
            written += 1;
        }
        written
    }
}
