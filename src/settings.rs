//! Runtime settings: defaults, an optional file, then the environment.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/metrics";
pub const DEFAULT_EXPORTER_PORT: u16 = 9100;

const WS_URL: &str = "ws_url";
const EXPORTER_PORT: &str = "exporter_port";
const RECONNECT_MIN_SECONDS: &str = "reconnect_min_seconds";
const RECONNECT_MAX_SECONDS: &str = "reconnect_max_seconds";
const CONNECT_TIMEOUT_SECONDS: &str = "connect_timeout_seconds";
const RECEIVE_TIMEOUT_SECONDS: &str = "receive_timeout_seconds";
const LOG_LEVEL: &str = "log_level";

/// Errors that prevent the exporter from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration source could not be read.
    #[error("Failed to load configuration: {0}")]
    Source(#[from] config::ConfigError),

    /// A value was present but unusable.
    #[error("Invalid {key}={value:?}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: &'static str,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: &str, reason: &'static str) -> Self {
        ConfigError::Invalid {
            key: key.to_ascii_uppercase(),
            value: value.to_string(),
            reason,
        }
    }
}

/// Validated exporter settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub ws_url: String,
    pub exporter_port: u16,
    pub reconnect_min: Duration,
    pub reconnect_max: Duration,
    pub connect_timeout: Duration,
    /// `None` disables idle probing.
    pub receive_timeout: Option<Duration>,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            exporter_port: DEFAULT_EXPORTER_PORT,
            reconnect_min: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            receive_timeout: Some(Duration::from_secs(30)),
            log_level: "INFO".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the process environment, layered over an optional
    /// configuration file.
    ///
    /// Keys are the environment names (`WS_URL`, `EXPORTER_PORT`, ...); in a
    /// file they may be written in lower case. The environment wins.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_sources(file, Environment::default())
    }

    /// Load settings from an explicit key/value map instead of the process
    /// environment.
    pub fn from_map(file: Option<&Path>, vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_sources(file, Environment::default().source(Some(vars)))
    }

    fn from_sources(file: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default(WS_URL, DEFAULT_WS_URL)?
            .set_default(EXPORTER_PORT, DEFAULT_EXPORTER_PORT.to_string())?
            .set_default(RECONNECT_MIN_SECONDS, "1")?
            .set_default(RECONNECT_MAX_SECONDS, "30")?
            .set_default(CONNECT_TIMEOUT_SECONDS, "10")?
            .set_default(RECEIVE_TIMEOUT_SECONDS, "30")?
            .set_default(LOG_LEVEL, "INFO")?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }

        let raw: RawSettings = builder.add_source(env).build()?.try_deserialize()?;
        raw.validate()
    }

    /// `tracing` filter directive for `LOG_LEVEL`.
    ///
    /// Accepts the usual level names case-insensitively, including `WARNING`
    /// and `CRITICAL`; anything unrecognized falls back to `info`.
    pub fn log_directive(&self) -> &'static str {
        match self.log_level.trim().to_ascii_uppercase().as_str() {
            "TRACE" | "NOTSET" => "trace",
            "DEBUG" => "debug",
            "WARN" | "WARNING" => "warn",
            "ERROR" | "CRITICAL" | "FATAL" => "error",
            _ => "info",
        }
    }
}

/// Merged values before validation. Every field is read as a string so that
/// environment variables and file values go through the same checks.
#[derive(Debug, Deserialize)]
struct RawSettings {
    ws_url: String,
    exporter_port: String,
    reconnect_min_seconds: String,
    reconnect_max_seconds: String,
    connect_timeout_seconds: String,
    receive_timeout_seconds: String,
    log_level: String,
}

impl RawSettings {
    fn validate(self) -> Result<Settings, ConfigError> {
        let ws_url = self.ws_url.trim().to_string();
        if ws_url.is_empty() {
            return Err(ConfigError::invalid(WS_URL, &self.ws_url, "must not be empty"));
        }

        let exporter_port = self.exporter_port.trim().parse::<u16>().map_err(|_| {
            ConfigError::invalid(
                EXPORTER_PORT,
                &self.exporter_port,
                "expected a port number (0-65535)",
            )
        })?;

        let reconnect_min = seconds(RECONNECT_MIN_SECONDS, &self.reconnect_min_seconds)?;
        if reconnect_min.is_zero() {
            return Err(ConfigError::invalid(
                RECONNECT_MIN_SECONDS,
                &self.reconnect_min_seconds,
                "must be greater than zero",
            ));
        }

        let reconnect_max = seconds(RECONNECT_MAX_SECONDS, &self.reconnect_max_seconds)?;
        if reconnect_max < reconnect_min {
            return Err(ConfigError::invalid(
                RECONNECT_MAX_SECONDS,
                &self.reconnect_max_seconds,
                "must not be less than RECONNECT_MIN_SECONDS",
            ));
        }

        let connect_timeout = seconds(CONNECT_TIMEOUT_SECONDS, &self.connect_timeout_seconds)?;
        if connect_timeout.is_zero() {
            return Err(ConfigError::invalid(
                CONNECT_TIMEOUT_SECONDS,
                &self.connect_timeout_seconds,
                "must be greater than zero",
            ));
        }

        let receive_timeout =
            optional_seconds(RECEIVE_TIMEOUT_SECONDS, &self.receive_timeout_seconds)?;

        Ok(Settings {
            ws_url,
            exporter_port,
            reconnect_min,
            reconnect_max,
            connect_timeout,
            receive_timeout,
            log_level: self.log_level,
        })
    }
}

fn seconds(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    parse_seconds(raw)
        .ok_or_else(|| ConfigError::invalid(key, raw, "expected a non-negative number of seconds"))
}

/// Like [`seconds`], but empty, `none` and `0` mean "disabled".
fn optional_seconds(key: &str, raw: &str) -> Result<Option<Duration>, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }

    let duration = parse_seconds(trimmed)
        .ok_or_else(|| ConfigError::invalid(key, raw, "expected a number of seconds or \"none\""))?;
    Ok(Some(duration).filter(|d| !d.is_zero()))
}

fn parse_seconds(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn load(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        Settings::from_map(None, vars(pairs))
    }

    fn invalid_key(result: Result<Settings, ConfigError>) -> String {
        match result {
            Err(ConfigError::Invalid { key, .. }) => key,
            other => panic!("expected invalid value, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(load(&[]).unwrap(), Settings::default());
    }

    #[test]
    fn test_environment_overrides_defaults() {
        let settings = load(&[
            ("WS_URL", "ws://adsbee.local:80/metrics"),
            ("EXPORTER_PORT", "9200"),
            ("RECONNECT_MIN_SECONDS", "0.5"),
            ("RECONNECT_MAX_SECONDS", "60"),
            ("CONNECT_TIMEOUT_SECONDS", "2.5"),
            ("RECEIVE_TIMEOUT_SECONDS", "15"),
            ("LOG_LEVEL", "debug"),
        ])
        .unwrap();

        assert_eq!(settings.ws_url, "ws://adsbee.local:80/metrics");
        assert_eq!(settings.exporter_port, 9200);
        assert_eq!(settings.reconnect_min, Duration::from_millis(500));
        assert_eq!(settings.reconnect_max, Duration::from_secs(60));
        assert_eq!(settings.connect_timeout, Duration::from_millis(2500));
        assert_eq!(settings.receive_timeout, Some(Duration::from_secs(15)));
        assert_eq!(settings.log_directive(), "debug");
    }

    #[test]
    fn test_receive_timeout_can_be_disabled() {
        for value in ["", "none", "None", " NONE ", "0"] {
            let settings = load(&[("RECEIVE_TIMEOUT_SECONDS", value)]).unwrap();
            assert_eq!(settings.receive_timeout, None, "{value:?}");
        }
    }

    #[test]
    fn test_non_numeric_values_are_fatal() {
        assert_eq!(invalid_key(load(&[("EXPORTER_PORT", "http")])), "EXPORTER_PORT");
        assert_eq!(invalid_key(load(&[("RECONNECT_MIN_SECONDS", "soon")])), "RECONNECT_MIN_SECONDS");
        assert_eq!(invalid_key(load(&[("CONNECT_TIMEOUT_SECONDS", "NaN")])), "CONNECT_TIMEOUT_SECONDS");
        assert_eq!(invalid_key(load(&[("RECEIVE_TIMEOUT_SECONDS", "later")])), "RECEIVE_TIMEOUT_SECONDS");
        assert_eq!(invalid_key(load(&[("RECONNECT_MAX_SECONDS", "inf")])), "RECONNECT_MAX_SECONDS");
    }

    #[test]
    fn test_out_of_range_values_are_fatal() {
        assert_eq!(invalid_key(load(&[("EXPORTER_PORT", "70000")])), "EXPORTER_PORT");
        assert_eq!(invalid_key(load(&[("EXPORTER_PORT", "-1")])), "EXPORTER_PORT");
        assert_eq!(invalid_key(load(&[("RECONNECT_MIN_SECONDS", "0")])), "RECONNECT_MIN_SECONDS");
        assert_eq!(invalid_key(load(&[("RECONNECT_MIN_SECONDS", "-1")])), "RECONNECT_MIN_SECONDS");
        assert_eq!(invalid_key(load(&[("CONNECT_TIMEOUT_SECONDS", "0")])), "CONNECT_TIMEOUT_SECONDS");
        assert_eq!(invalid_key(load(&[("RECEIVE_TIMEOUT_SECONDS", "-5")])), "RECEIVE_TIMEOUT_SECONDS");
        assert_eq!(invalid_key(load(&[("WS_URL", "  ")])), "WS_URL");
    }

    #[test]
    fn test_min_above_max_is_fatal() {
        let result = load(&[("RECONNECT_MIN_SECONDS", "10"), ("RECONNECT_MAX_SECONDS", "5")]);
        assert_eq!(invalid_key(result), "RECONNECT_MAX_SECONDS");
    }

    #[test]
    fn test_file_is_layered_under_environment() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "ws_url = \"ws://from-file/metrics\"\nexporter_port = \"9300\"\nlog_level = \"WARNING\""
        )
        .unwrap();

        let settings = Settings::from_map(Some(file.path()), vars(&[("EXPORTER_PORT", "9400")])).unwrap();

        assert_eq!(settings.ws_url, "ws://from-file/metrics");
        assert_eq!(settings.exporter_port, 9400);
        assert_eq!(settings.log_directive(), "warn");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");

        let result = Settings::from_map(Some(missing.as_path()), HashMap::new());
        assert!(matches!(result, Err(ConfigError::Source(_))));
    }

    #[test]
    fn test_log_directive_mapping() {
        let level = |l: &str| Settings {
            log_level: l.to_string(),
            ..Settings::default()
        };

        assert_eq!(level("TRACE").log_directive(), "trace");
        assert_eq!(level("info").log_directive(), "info");
        assert_eq!(level("Warning").log_directive(), "warn");
        assert_eq!(level("CRITICAL").log_directive(), "error");
        assert_eq!(level("ERROR").log_directive(), "error");
        assert_eq!(level("chatty").log_directive(), "info");
    }
}
