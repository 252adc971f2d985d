//! Typed views over the merged config JSON.
//!
//! Every setting has a default, so an empty config document yields a valid
//! configuration. Values of the wrong type are rejected rather than silently
//! defaulted.

use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_BATCH_SIZE: i64 = 100;
pub const DEFAULT_DAYS_TO_IMPORT: i64 = 30;
pub const DEFAULT_MAX_RETRY_ATTEMPTS: i64 = 3;
pub const DEFAULT_RETRY_DELAY_SECS: i64 = 5;
pub const DEFAULT_PARALLELISM: i64 = 4;
pub const DEFAULT_OVERALL_TIMEOUT_SECS: i64 = 60 * 60;
pub const DEFAULT_SOURCE_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_SCHEDULE_INTERVAL_SECS: i64 = 2 * 60 * 60;

/// Settings that drive one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Subjects per partition. Kept signed so a negative YAML value reaches
    /// validation instead of failing deserialization.
    pub batch_size: i64,
    /// Fetch window is `[today - days_to_import, today]`.
    pub days_to_import: i64,
    pub max_retry_attempts: i64,
    pub retry_delay: Duration,
    pub parallelism_enabled: bool,
    pub parallelism: i64,
    pub overall_timeout: Duration,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            days_to_import: DEFAULT_DAYS_TO_IMPORT,
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS as u64),
            parallelism_enabled: true,
            parallelism: DEFAULT_PARALLELISM,
            overall_timeout: Duration::from_secs(DEFAULT_OVERALL_TIMEOUT_SECS as u64),
        }
    }
}

impl ImportConfig {
    pub fn from_config_json(v: &Value) -> Result<Self> {
        let retry_delay_secs = read_i64(v, "/import/retry_delay_secs", DEFAULT_RETRY_DELAY_SECS)?;
        let timeout_secs = read_i64(
            v,
            "/import/overall_timeout_secs",
            DEFAULT_OVERALL_TIMEOUT_SECS,
        )?;
        if retry_delay_secs < 0 || timeout_secs < 0 {
            bail!(
                "CONFIG_INVALID: durations must be >= 0 (retry_delay_secs={retry_delay_secs}, \
                 overall_timeout_secs={timeout_secs})"
            );
        }

        Ok(Self {
            batch_size: read_i64(v, "/import/batch_size", DEFAULT_BATCH_SIZE)?,
            days_to_import: read_i64(v, "/import/days_to_import", DEFAULT_DAYS_TO_IMPORT)?,
            max_retry_attempts: read_i64(
                v,
                "/import/max_retry_attempts",
                DEFAULT_MAX_RETRY_ATTEMPTS,
            )?,
            retry_delay: Duration::from_secs(retry_delay_secs as u64),
            parallelism_enabled: read_bool(v, "/import/parallelism_enabled", true)?,
            parallelism: read_i64(v, "/import/parallelism", DEFAULT_PARALLELISM)?,
            overall_timeout: Duration::from_secs(timeout_secs as u64),
        })
    }

    /// Range checks. Fails fast before any run starts.
    pub fn validate(&self) -> Result<()> {
        check_range("batch_size", self.batch_size, 1, 10_000)?;
        check_range("days_to_import", self.days_to_import, 1, 365)?;
        check_range("max_retry_attempts", self.max_retry_attempts, 1, 20)?;
        check_range("parallelism", self.parallelism, 1, 50)?;
        check_range(
            "retry_delay_secs",
            self.retry_delay.as_secs() as i64,
            0,
            300,
        )?;
        check_range(
            "overall_timeout_secs",
            self.overall_timeout.as_secs() as i64,
            60,
            720 * 60,
        )?;

        if self.parallelism_enabled && self.parallelism > self.batch_size {
            bail!(
                "CONFIG_INVALID: parallelism ({}) must not exceed batch_size ({}) \
                 when parallelism is enabled",
                self.parallelism,
                self.batch_size
            );
        }
        Ok(())
    }

    /// Worker count actually used: 1 when parallelism is disabled.
    pub fn effective_parallelism(&self) -> usize {
        if self.parallelism_enabled {
            self.parallelism.max(1) as usize
        } else {
            1
        }
    }
}

/// Where and how to reach the legacy source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Name of the env var holding a bearer token, if the source needs one.
    pub token_env: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SOURCE_BASE_URL.to_string(),
            connect_timeout: Duration::from_millis(10_000),
            read_timeout: Duration::from_millis(30_000),
            token_env: None,
        }
    }
}

impl SourceConfig {
    pub fn from_config_json(v: &Value) -> Result<Self> {
        let connect_ms = read_i64(v, "/source/connect_timeout_ms", 10_000)?;
        let read_ms = read_i64(v, "/source/read_timeout_ms", 30_000)?;
        if connect_ms <= 0 || read_ms <= 0 {
            bail!("CONFIG_INVALID: source timeouts must be > 0");
        }
        let base_url = read_str(v, "/source/base_url")?
            .unwrap_or_else(|| DEFAULT_SOURCE_BASE_URL.to_string());
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            connect_timeout: Duration::from_millis(connect_ms as u64),
            read_timeout: Duration::from_millis(read_ms as u64),
            token_env: read_str(v, "/source/token_env")?,
        })
    }
}

/// Daemon-only settings: the periodic trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    pub schedule_enabled: bool,
    pub schedule_interval: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            schedule_enabled: true,
            schedule_interval: Duration::from_secs(DEFAULT_SCHEDULE_INTERVAL_SECS as u64),
        }
    }
}

impl DaemonConfig {
    pub fn from_config_json(v: &Value) -> Result<Self> {
        let secs = read_i64(
            v,
            "/daemon/schedule_interval_secs",
            DEFAULT_SCHEDULE_INTERVAL_SECS,
        )?;
        if secs <= 0 {
            bail!("CONFIG_INVALID: daemon.schedule_interval_secs must be > 0 (got {secs})");
        }
        Ok(Self {
            schedule_enabled: read_bool(v, "/daemon/schedule_enabled", true)?,
            schedule_interval: Duration::from_secs(secs as u64),
        })
    }
}

fn check_range(name: &str, value: i64, min: i64, max: i64) -> Result<()> {
    if value < min || value > max {
        bail!("CONFIG_INVALID: {name}={value} out of range [{min}, {max}]");
    }
    Ok(())
}

fn read_i64(v: &Value, pointer: &str, default: i64) -> Result<i64> {
    match v.pointer(pointer) {
        None | Some(Value::Null) => Ok(default),
        Some(x) => match x.as_i64() {
            Some(n) => Ok(n),
            None => bail!("CONFIG_INVALID: {pointer} must be an integer (got {x})"),
        },
    }
}

fn read_bool(v: &Value, pointer: &str, default: bool) -> Result<bool> {
    match v.pointer(pointer) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(x) => bail!("CONFIG_INVALID: {pointer} must be a boolean (got {x})"),
    }
}

fn read_str(v: &Value, pointer: &str) -> Result<Option<String>> {
    match v.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(x) => bail!("CONFIG_INVALID: {pointer} must be a string (got {x})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = ImportConfig::from_config_json(&json!({})).unwrap();
        assert_eq!(cfg, ImportConfig::default());
        cfg.validate().unwrap();
    }

    #[test]
    fn wrong_type_is_rejected() {
        let err = ImportConfig::from_config_json(&json!({"import": {"batch_size": "ten"}}))
            .unwrap_err();
        assert!(err.to_string().contains("CONFIG_INVALID"));
    }

    #[test]
    fn effective_parallelism_is_one_when_disabled() {
        let cfg = ImportConfig {
            parallelism_enabled: false,
            parallelism: 8,
            ..ImportConfig::default()
        };
        assert_eq!(cfg.effective_parallelism(), 1);
    }

    #[test]
    fn source_base_url_trailing_slash_is_trimmed() {
        let cfg =
            SourceConfig::from_config_json(&json!({"source": {"base_url": "http://x:1/"}}))
                .unwrap();
        assert_eq!(cfg.base_url, "http://x:1");
    }
}
