//! Decoding of raw stream messages into [`Snapshot`]s.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::coerce::{to_f64, to_integer};
use crate::{
    AircraftCounter, AircraftDictionaryMetrics, DeviceRecord, ParseError, ServerMetrics, Snapshot,
};

const AIRCRAFT_KEY: &str = "aircraft_dictionary_metrics";
const SERVER_KEY: &str = "server_metrics";
const DEVICE_KEY: &str = "device_status";

const USAGE_SUFFIX: &str = "_usage_percent";

/// Decode one message from the metrics stream.
///
/// Only a payload that is not valid JSON is an error. Everything below the
/// top level is read permissively: missing or mistyped sub-records are
/// treated as absent and fields that cannot be coerced are skipped one at a
/// time (their paths are collected in [`Snapshot::skipped_fields`]).
///
/// # Example
///
/// ```rust
/// use adsbee_types::{parse_snapshot, AircraftCounter};
///
/// let snapshot = parse_snapshot(br#"{"aircraft_dictionary_metrics": {"demods_1090": 7}}"#)?;
/// let aircraft = snapshot.aircraft.unwrap();
/// assert_eq!(aircraft.get(AircraftCounter::Demods1090), Some(7.0));
/// # Ok::<(), adsbee_types::ParseError>(())
/// ```
pub fn parse_snapshot(raw: &[u8]) -> Result<Snapshot, ParseError> {
    let payload: Value = serde_json::from_slice(raw)?;
    Ok(snapshot_from_value(&payload))
}

/// Build a snapshot from an already decoded JSON value.
///
/// A value that is not an object yields an empty snapshot.
pub fn snapshot_from_value(payload: &Value) -> Snapshot {
    let mut snapshot = Snapshot::default();
    let Some(root) = payload.as_object() else {
        return snapshot;
    };

    let mut skipped = Vec::new();

    if let Some(aircraft) = root.get(AIRCRAFT_KEY).and_then(Value::as_object) {
        snapshot.aircraft = Some(parse_aircraft(aircraft, &mut skipped));
    }
    if let Some(server) = root.get(SERVER_KEY).and_then(Value::as_object) {
        snapshot.server = Some(parse_server(server, &mut skipped));
    }
    if let Some(devices) = root.get(DEVICE_KEY).and_then(Value::as_object) {
        snapshot.device_status = Some(parse_devices(devices, &mut skipped));
    }

    snapshot.skipped_fields = skipped;
    snapshot
}

/// Derive a core label from a device field name.
///
/// Matches any key that ends in `_usage_percent` and contains `core`
/// anywhere, and returns the key with the suffix removed:
/// `core_0_usage_percent` gives `core_0`, `user_core_usage_percent` gives
/// `user_core`.
pub fn core_label(key: &str) -> Option<&str> {
    if key.contains("core") {
        key.strip_suffix(USAGE_SUFFIX)
    } else {
        None
    }
}

fn parse_aircraft(fields: &Map<String, Value>, skipped: &mut Vec<String>) -> AircraftDictionaryMetrics {
    let mut metrics = AircraftDictionaryMetrics::default();
    for counter in AircraftCounter::ALL {
        let Some(value) = fields.get(counter.field_name()) else {
            continue;
        };
        match to_integer(value) {
            Some(v) => {
                metrics.counters.insert(counter, v);
            }
            None => skipped.push(format!("{AIRCRAFT_KEY}.{counter}")),
        }
    }
    metrics
}

fn parse_server(fields: &Map<String, Value>, skipped: &mut Vec<String>) -> ServerMetrics {
    let feed_uri = array_field(fields, "feed_uri")
        .iter()
        .map(feed_label)
        .collect();

    let feed_mps = array_field(fields, "feed_mps")
        .iter()
        .enumerate()
        .map(|(index, mps)| {
            let coerced = to_f64(mps);
            if coerced.is_none() {
                skipped.push(format!("{SERVER_KEY}.feed_mps[{index}]"));
            }
            coerced
        })
        .collect();

    ServerMetrics { feed_uri, feed_mps }
}

/// Label text for a `feed_uri` entry. Strings are used as-is; other truthy
/// scalars are written out (`7`, `1.5`, `True`).
fn feed_label(uri: &Value) -> Option<String> {
    match uri {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("True".to_string()),
        _ => None,
    }
}

fn array_field<'a>(fields: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    fields
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn parse_devices(
    devices: &Map<String, Value>,
    skipped: &mut Vec<String>,
) -> BTreeMap<String, DeviceRecord> {
    devices
        .iter()
        .filter_map(|(name, record)| {
            let fields = record.as_object()?;
            Some((name.clone(), parse_device(name, fields, skipped)))
        })
        .collect()
}

fn parse_device(name: &str, fields: &Map<String, Value>, skipped: &mut Vec<String>) -> DeviceRecord {
    let uptime_ms = device_field(name, fields, "uptime_ms", to_f64, skipped);
    let temperature_deg_c = device_field(name, fields, "temperature_deg_c", to_f64, skipped);
    let heap_free_bytes = device_field(name, fields, "heap_free_bytes", to_integer, skipped);
    let heap_largest_free_block_bytes =
        device_field(name, fields, "heap_largest_free_block_bytes", to_integer, skipped);

    let mut core_usage_percent = BTreeMap::new();
    for (key, value) in fields {
        let Some(core) = core_label(key) else {
            continue;
        };
        match to_f64(value) {
            Some(percent) => {
                core_usage_percent.insert(core.to_string(), percent);
            }
            None => skipped.push(format!("{DEVICE_KEY}.{name}.{key}")),
        }
    }

    DeviceRecord {
        uptime_ms,
        temperature_deg_c,
        heap_free_bytes,
        heap_largest_free_block_bytes,
        core_usage_percent,
    }
}

fn device_field<T>(
    name: &str,
    fields: &Map<String, Value>,
    key: &str,
    coerce: fn(&Value) -> Option<T>,
    skipped: &mut Vec<String>,
) -> Option<T> {
    let value = fields.get(key)?;
    let coerced = coerce(value);
    if coerced.is_none() {
        skipped.push(format!("{DEVICE_KEY}.{name}.{key}"));
    }
    coerced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_message() {
        let raw = br#"{
            "aircraft_dictionary_metrics": {
                "raw_squitter_frames": 1200,
                "valid_squitter_frames": 1100,
                "demods_1090": 3000,
                "num_mode_s_aircraft": 14
            },
            "server_metrics": {
                "feed_uri": ["A", "", "B"],
                "feed_mps": [1.5, 9.9, 2.25]
            },
            "device_status": {
                "pico": {
                    "uptime_ms": 65000,
                    "temperature_deg_c": 38.5,
                    "heap_free_bytes": 20480,
                    "heap_largest_free_block_bytes": 8192,
                    "core_0_usage_percent": 42.5,
                    "user_core_usage_percent": 10
                }
            }
        }"#;

        let snapshot = parse_snapshot(raw).unwrap();

        let aircraft = snapshot.aircraft.as_ref().unwrap();
        assert_eq!(aircraft.get(AircraftCounter::RawSquitterFrames), Some(1200.0));
        assert_eq!(aircraft.get(AircraftCounter::NumModeSAircraft), Some(14.0));
        assert_eq!(aircraft.get(AircraftCounter::RawUatAdsbFrames), None);

        let server = snapshot.server.as_ref().unwrap();
        assert_eq!(server.feed_uri.len(), 3);
        assert_eq!(server.feed_mps, vec![Some(1.5), Some(9.9), Some(2.25)]);

        let pico = snapshot.device_status.as_ref().unwrap().get("pico").unwrap();
        assert_eq!(pico.uptime_ms, Some(65000.0));
        assert_eq!(pico.temperature_deg_c, Some(38.5));
        assert_eq!(pico.heap_free_bytes, Some(20480.0));
        assert_eq!(pico.heap_largest_free_block_bytes, Some(8192.0));
        assert_eq!(pico.core_usage_percent.get("core_0"), Some(&42.5));
        assert_eq!(pico.core_usage_percent.get("user_core"), Some(&10.0));
        assert!(snapshot.skipped_fields.is_empty());
    }

    #[test]
    fn invalid_json_is_a_parse_failure() {
        assert!(parse_snapshot(b"not valid json").is_err());
        assert!(parse_snapshot(b"{\"aircraft_dictionary_metrics\": ").is_err());
        assert!(parse_snapshot(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn non_object_payload_is_empty_snapshot() {
        assert!(parse_snapshot(b"[1, 2, 3]").unwrap().is_empty());
        assert!(parse_snapshot(b"42").unwrap().is_empty());
        assert!(parse_snapshot(b"null").unwrap().is_empty());
    }

    #[test]
    fn non_object_sub_records_are_absent() {
        let raw = br#"{
            "aircraft_dictionary_metrics": [1, 2],
            "server_metrics": "nope",
            "device_status": null
        }"#;

        let snapshot = parse_snapshot(raw).unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let raw = br#"{"firmware": "1.2.3", "aircraft_dictionary_metrics": {"bogus": 1}}"#;

        let snapshot = parse_snapshot(raw).unwrap();
        assert!(snapshot.aircraft.unwrap().counters.is_empty());
        assert!(snapshot.server.is_none());
    }

    #[test]
    fn bad_fields_are_skipped_individually() {
        let raw = br#"{
            "aircraft_dictionary_metrics": {
                "raw_squitter_frames": "many",
                "valid_squitter_frames": 10
            },
            "device_status": {
                "pico": {"temperature_deg_c": {"c": 1}, "uptime_ms": 2000}
            }
        }"#;

        let snapshot = parse_snapshot(raw).unwrap();

        let aircraft = snapshot.aircraft.as_ref().unwrap();
        assert_eq!(aircraft.get(AircraftCounter::RawSquitterFrames), None);
        assert_eq!(aircraft.get(AircraftCounter::ValidSquitterFrames), Some(10.0));

        let pico = snapshot.device_status.as_ref().unwrap().get("pico").unwrap();
        assert_eq!(pico.temperature_deg_c, None);
        assert_eq!(pico.uptime_ms, Some(2000.0));

        assert_eq!(
            snapshot.skipped_fields,
            vec![
                "aircraft_dictionary_metrics.raw_squitter_frames".to_string(),
                "device_status.pico.temperature_deg_c".to_string(),
            ]
        );
    }

    #[test]
    fn server_sequences_keep_alignment() {
        let raw = br#"{"server_metrics": {"feed_uri": ["a", null, "c"], "feed_mps": [1, "x", "3.5"]}}"#;

        let server = parse_snapshot(raw).unwrap().server.unwrap();
        assert_eq!(server.feed_uri, vec![Some("a".into()), None, Some("c".into())]);
        assert_eq!(server.feed_mps, vec![Some(1.0), None, Some(3.5)]);
    }

    #[test]
    fn truthy_scalar_feed_uris_become_labels() {
        let raw = br#"{"server_metrics": {"feed_uri": [7, 1.5, true, false, 0, [1], {"u": 1}]}}"#;

        let server = parse_snapshot(raw).unwrap().server.unwrap();
        assert_eq!(
            server.feed_uri,
            vec![
                Some("7".to_string()),
                Some("1.5".to_string()),
                Some("True".to_string()),
                None,
                None,
                None,
                None,
            ]
        );
    }

    #[test]
    fn counters_beyond_i64_are_kept() {
        let raw = br#"{"aircraft_dictionary_metrics": {"demods_1090": 18446744073709551615, "raw_squitter_frames": 1e300}}"#;

        let aircraft = parse_snapshot(raw).unwrap().aircraft.unwrap();
        assert_eq!(aircraft.get(AircraftCounter::Demods1090), Some(u64::MAX as f64));
        assert_eq!(aircraft.get(AircraftCounter::RawSquitterFrames), Some(1e300));
    }

    #[test]
    fn server_sequences_that_are_not_arrays_are_empty() {
        let raw = br#"{"server_metrics": {"feed_uri": "a", "feed_mps": 1.0}}"#;

        let server = parse_snapshot(raw).unwrap().server.unwrap();
        assert!(server.feed_uri.is_empty());
        assert!(server.feed_mps.is_empty());
    }

    #[test]
    fn non_object_device_records_are_dropped() {
        let raw = br#"{"device_status": {"pico": 5, "esp32": {"uptime_ms": 1}}}"#;

        let devices = parse_snapshot(raw).unwrap().device_status.unwrap();
        assert_eq!(devices.len(), 1);
        assert!(devices.contains_key("esp32"));
    }

    #[test]
    fn test_core_label() {
        assert_eq!(core_label("core_0_usage_percent"), Some("core_0"));
        assert_eq!(core_label("core_1_usage_percent"), Some("core_1"));
        assert_eq!(core_label("user_core_usage_percent"), Some("user_core"));
        assert_eq!(core_label("cpu_usage_percent"), None);
        assert_eq!(core_label("core_0_load"), None);
        assert_eq!(core_label("uptime_ms"), None);
    }
}
