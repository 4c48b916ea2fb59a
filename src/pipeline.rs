//! Frame handling: decode each stream message and apply it to the gauges.

use adsbee_metrics::MetricUpdater;
use adsbee_stream::FrameHandler;
use adsbee_types::parse_snapshot;
use tracing::{debug, warn};

/// Decodes stream messages and applies them to the registry.
///
/// A message that is not valid JSON is logged and dropped without touching
/// any gauge; the session stays open.
#[derive(Debug)]
pub struct SnapshotPipeline {
    updater: MetricUpdater,
    applied: u64,
    rejected: u64,
}

impl SnapshotPipeline {
    pub fn new(updater: MetricUpdater) -> Self {
        Self {
            updater,
            applied: 0,
            rejected: 0,
        }
    }

    /// Messages decoded and applied so far.
    pub fn applied(&self) -> u64 {
        self.applied
    }

    /// Messages dropped because they were not valid JSON.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

impl FrameHandler for SnapshotPipeline {
    fn handle(&mut self, frame: &[u8]) {
        let snapshot = match parse_snapshot(frame) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.rejected += 1;
                warn!("Received non-JSON message; ignoring: {}", e);
                return;
            }
        };

        if !snapshot.skipped_fields.is_empty() {
            debug!(fields = ?snapshot.skipped_fields, "Skipped fields that could not be coerced");
        }

        let written = self.updater.apply(&snapshot);
        self.applied += 1;
        debug!(written, "Applied snapshot");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use adsbee_metrics::MetricRegistry;

    fn pipeline() -> (Arc<MetricRegistry>, SnapshotPipeline) {
        let registry = Arc::new(MetricRegistry::new());
        let pipeline = SnapshotPipeline::new(MetricUpdater::new(registry.clone()));
        (registry, pipeline)
    }

    #[test]
    fn test_valid_message_updates_gauges() {
        let (registry, mut pipeline) = pipeline();

        pipeline.handle(br#"{"aircraft_dictionary_metrics": {"demods_1090": 3000}}"#);

        assert_eq!(registry.get("adsbee_demods_1090_current", &[]), Some(3000.0));
        assert_eq!(pipeline.applied(), 1);
    }

    #[test]
    fn test_invalid_json_changes_nothing_and_does_not_poison() {
        let (registry, mut pipeline) = pipeline();
        pipeline.handle(br#"{"aircraft_dictionary_metrics": {"demods_1090": 10}}"#);
        let before = adsbee_metrics::prometheus::format_prometheus(&registry);

        pipeline.handle(b"not json at all");
        pipeline.handle(br#"{"aircraft_dictionary_metrics": {"demods_1090": 99"#);

        assert_eq!(before, adsbee_metrics::prometheus::format_prometheus(&registry));
        assert_eq!(pipeline.rejected(), 2);

        pipeline.handle(br#"{"aircraft_dictionary_metrics": {"demods_1090": 20}}"#);
        assert_eq!(registry.get("adsbee_demods_1090_current", &[]), Some(20.0));
        assert_eq!(pipeline.applied(), 2);
    }

    #[test]
    fn test_bad_fields_do_not_block_siblings() {
        let (registry, mut pipeline) = pipeline();

        pipeline.handle(
            br#"{
                "aircraft_dictionary_metrics": {"raw_squitter_frames": [1], "valid_squitter_frames": "12"},
                "device_status": {"pico": {"temperature_deg_c": "hot", "heap_free_bytes": 4096.7}}
            }"#,
        );

        assert_eq!(registry.get("adsbee_raw_squitter_frames_current", &[]), Some(0.0));
        assert_eq!(registry.get("adsbee_valid_squitter_frames_current", &[]), Some(12.0));
        assert_eq!(registry.get("adsbee_device_temperature_deg_c", &["pico"]), None);
        assert_eq!(registry.get("adsbee_device_heap_free_bytes", &["pico"]), Some(4096.0));
    }
}
