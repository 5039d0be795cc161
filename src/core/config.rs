//! Store options and provider configuration.
//!
//! Options arrive as a loosely typed JSON map (the shape the broker's storage
//! section is written in). Recognised keys are read once at `configure`;
//! anything unset falls back to the documented defaults below.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Loosely typed option map handed to a provider's `configure`.
pub type Options = HashMap<String, Value>;

pub const DEFAULT_MAX_SIZE: u64 = 1_000_000;
pub const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_GATHER_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_EVICTION_BATCH: usize = 1024;

pub const OPT_MAX_SIZE: &str = "maxsize";
pub const OPT_PRUNE: &str = "prune";
pub const OPT_TIMEOUT: &str = "timeout";
pub const OPT_DUPLICATES: &str = "duplicates";
pub const OPT_BATCH: &str = "batch";

const KNOWN_OPTIONS: &[&str] = &[OPT_MAX_SIZE, OPT_PRUNE, OPT_TIMEOUT, OPT_DUPLICATES, OPT_BATCH];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid option {key}: {reason}")]
    InvalidOption { key: String, reason: String },
    #[error("unknown storage provider: {0}")]
    UnknownProvider(String),
    #[error("failed to parse storage config: {0}")]
    Parse(String),
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// What `store` does when a record's SSID and time already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Replace the existing record (idempotent re-publish).
    #[default]
    Overwrite,
    /// Refuse the write with `StoreError::Duplicate`.
    Reject,
    /// Move the new record to the next free time ordinal.
    Disambiguate,
}

impl FromStr for DuplicatePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "reject" => Ok(Self::Reject),
            "disambiguate" => Ok(Self::Disambiguate),
            other => Err(ConfigError::invalid(
                OPT_DUPLICATES,
                format!("unknown policy {other}"),
            )),
        }
    }
}

/// Resolved configuration for an in-memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Maximum number of retained records; 0 = unbounded.
    pub max_size: u64,
    /// Eviction tick interval; zero disables the background controller.
    pub prune: Duration,
    /// How long `query_last` waits for peer frames.
    pub gather_timeout: Duration,
    pub duplicates: DuplicatePolicy,
    /// Upper bound on records removed per index write lock.
    pub eviction_batch: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            prune: DEFAULT_PRUNE_INTERVAL,
            gather_timeout: DEFAULT_GATHER_TIMEOUT,
            duplicates: DuplicatePolicy::default(),
            eviction_batch: DEFAULT_EVICTION_BATCH,
        }
    }
}

impl StoreConfig {
    /// Resolve a config from an optional option map, defaulting unset keys.
    pub fn from_options(options: Option<&Options>) -> Result<Self, ConfigError> {
        let Some(options) = options else {
            return Ok(Self::default());
        };
        for key in options.keys() {
            if !KNOWN_OPTIONS.contains(&key.as_str()) {
                tracing::debug!(option = %key, "ignoring unrecognised store option");
            }
        }
        let defaults = Self::default();
        let duplicates = match options.get(OPT_DUPLICATES) {
            None | Some(Value::Null) => defaults.duplicates,
            Some(Value::String(s)) => s.parse()?,
            Some(other) => {
                return Err(ConfigError::invalid(
                    OPT_DUPLICATES,
                    format!("expected string, got {other}"),
                ))
            }
        };
        let eviction_batch = param_u64(options, OPT_BATCH, defaults.eviction_batch as u64)?;
        if eviction_batch == 0 {
            return Err(ConfigError::invalid(OPT_BATCH, "must be at least 1"));
        }
        Ok(Self {
            max_size: param_u64(options, OPT_MAX_SIZE, defaults.max_size)?,
            prune: param_duration(options, OPT_PRUNE, defaults.prune)?,
            gather_timeout: param_duration(options, OPT_TIMEOUT, defaults.gather_timeout)?,
            duplicates,
            eviction_batch: usize::try_from(eviction_batch)
                .map_err(|_| ConfigError::invalid(OPT_BATCH, "out of range"))?,
        })
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_prune(mut self, prune: Duration) -> Self {
        self.prune = prune;
        self
    }

    pub fn with_gather_timeout(mut self, timeout: Duration) -> Self {
        self.gather_timeout = timeout;
        self
    }

    pub fn with_duplicates(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }

    pub fn is_bounded(&self) -> bool {
        self.max_size > 0
    }
}

/// Read a non-negative integer option.
///
/// JSON numbers frequently arrive as floats, so whole floats are accepted.
pub fn param_u64(options: &Options, key: &str, default: u64) -> Result<u64, ConfigError> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_u64() {
                return Ok(v);
            }
            if n.as_i64().is_some() {
                return Err(ConfigError::invalid(key, "must not be negative"));
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
                    Ok(f as u64)
                }
                _ => Err(ConfigError::invalid(key, format!("not a whole number: {n}"))),
            }
        }
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map_err(|err| ConfigError::invalid(key, format!("{s:?}: {err}"))),
        Some(other) => Err(ConfigError::invalid(
            key,
            format!("expected integer, got {other}"),
        )),
    }
}

/// Longest accepted `prune` or `timeout`.
pub const MAX_DURATION_OPTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Read a duration option: a number of seconds or a literal such as `"500ms"`.
/// Values above [`MAX_DURATION_OPTION`] are rejected.
pub fn param_duration(
    options: &Options,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let duration = match options.get(key) {
        None | Some(Value::Null) => return Ok(default),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(secs) if secs.is_finite() && secs >= 0.0 => Duration::try_from_secs_f64(secs)
                .map_err(|err| ConfigError::invalid(key, err.to_string()))?,
            _ => return Err(ConfigError::invalid(key, format!("invalid seconds: {n}"))),
        },
        Some(Value::String(s)) => parse_duration_literal(s)
            .ok_or_else(|| ConfigError::invalid(key, format!("invalid duration {s:?}")))?,
        Some(other) => {
            return Err(ConfigError::invalid(
                key,
                format!("expected duration, got {other}"),
            ))
        }
    };
    if duration > MAX_DURATION_OPTION {
        return Err(ConfigError::invalid(
            key,
            format!(
                "{}s exceeds the {}s maximum",
                duration.as_secs(),
                MAX_DURATION_OPTION.as_secs()
            ),
        ));
    }
    Ok(duration)
}

/// Parse `"1m30s"`-style literals. A bare number is seconds; `None` on any
/// unknown unit or overflow.
fn parse_duration_literal(literal: &str) -> Option<Duration> {
    let mut rest = literal.trim();
    if rest.is_empty() {
        return None;
    }
    if let Ok(secs) = rest.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (value, tail) = rest.split_at(digits);
        let value: u64 = value.parse().ok()?;
        let unit_len = tail
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let part = match unit.to_ascii_lowercase().as_str() {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.checked_mul(60)?),
            "h" => Duration::from_secs(value.checked_mul(3_600)?),
            _ => return None,
        };
        total = total.checked_add(part)?;
        rest = tail.trim_start();
    }
    Some(total)
}

/// Storage section of the broker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: String,
    #[serde(default)]
    pub config: Options,
}

impl StorageConfig {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            config: Options::new(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(value: Value) -> Options {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn missing_options_use_defaults() {
        let cfg = StoreConfig::from_options(None).unwrap();
        assert_eq!(cfg, StoreConfig::default());
        let cfg = StoreConfig::from_options(Some(&Options::new())).unwrap();
        assert_eq!(cfg.max_size, DEFAULT_MAX_SIZE);
        assert_eq!(cfg.prune, DEFAULT_PRUNE_INTERVAL);
    }

    #[test]
    fn float_numbers_are_accepted() {
        let opts = options(json!({ "maxsize": 1.0, "prune": 1.0 }));
        let cfg = StoreConfig::from_options(Some(&opts)).unwrap();
        assert_eq!(cfg.max_size, 1);
        assert_eq!(cfg.prune, Duration::from_secs(1));
    }

    #[test]
    fn param_reads_large_values_from_json() {
        let cfg = StorageConfig::from_json(
            r#"{ "provider": "memory", "config": { "maxsize": 99999999 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.provider, "memory");
        assert_eq!(param_u64(&cfg.config, "maxsize", 0).unwrap(), 99_999_999);
    }

    #[test]
    fn malformed_values_are_rejected() {
        for bad in [
            json!({ "maxsize": -1 }),
            json!({ "maxsize": 1.5 }),
            json!({ "maxsize": "lots" }),
            json!({ "prune": "soon" }),
            json!({ "prune": -2.0 }),
            json!({ "timeout": [1] }),
            json!({ "duplicates": "ignore" }),
            json!({ "batch": 0 }),
        ] {
            let opts = options(bad.clone());
            let err = StoreConfig::from_options(Some(&opts)).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidOption { .. }),
                "{bad} -> {err:?}"
            );
        }
    }

    #[test]
    fn duration_literals() {
        let ms = |literal| parse_duration_literal(literal).map(|d| d.as_millis());
        assert_eq!(ms("500ms"), Some(500));
        assert_eq!(ms("2s"), Some(2_000));
        assert_eq!(ms("1m30s"), Some(90_000));
        assert_eq!(ms("1m 30s"), Some(90_000));
        assert_eq!(ms("3"), Some(3_000));
        assert_eq!(ms("5 parsecs"), None);
        assert_eq!(ms("s"), None);
        assert_eq!(ms(""), None);
        assert_eq!(ms("18446744073709551615h"), None);
    }

    #[test]
    fn durations_above_the_cap_are_rejected() {
        for key in [OPT_TIMEOUT, OPT_PRUNE] {
            for value in [json!(1e19), json!(86_401), json!("25h"), json!("99999999999h")] {
                let mut opts = Options::new();
                opts.insert(key.to_string(), value.clone());
                let err = StoreConfig::from_options(Some(&opts)).unwrap_err();
                assert!(
                    matches!(&err, ConfigError::InvalidOption { key: k, .. } if k == key),
                    "{key}={value} -> {err:?}"
                );
            }
        }
        let opts = options(json!({ "timeout": "24h", "prune": 86_400 }));
        let cfg = StoreConfig::from_options(Some(&opts)).unwrap();
        assert_eq!(cfg.gather_timeout, MAX_DURATION_OPTION);
        assert_eq!(cfg.prune, MAX_DURATION_OPTION);
    }

    #[test]
    fn policy_and_timeout_are_parsed() {
        let opts = options(json!({
            "duplicates": "Disambiguate",
            "timeout": "250ms",
            "prune": 0,
            "unknown": true
        }));
        let cfg = StoreConfig::from_options(Some(&opts)).unwrap();
        assert_eq!(cfg.duplicates, DuplicatePolicy::Disambiguate);
        assert_eq!(cfg.gather_timeout, Duration::from_millis(250));
        assert!(cfg.prune.is_zero());
    }
}
