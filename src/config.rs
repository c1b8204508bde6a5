use std::env;

use serde::Deserialize;

use crate::error::ConfigError;

const ENV_ENABLED: &str = "OUTBOX_DISPATCH_ENABLED";
const ENV_BATCH_SIZE: &str = "OUTBOX_DISPATCH_BATCH_SIZE";
const ENV_PARTITION_SIZE: &str = "OUTBOX_DISPATCH_PARTITION_SIZE";
const ENV_CONNECTIONS: &str = "OUTBOX_DISPATCH_CONNECTIONS";

/// Settings consumed by the dispatch job and the channel router.
///
/// `partition_size` is the largest id set passed to a single `mark_sent`
/// call. Keep it below the store's bound-parameter limit per statement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Administrative switch for the downstream channel.
    pub enabled: bool,
    /// Maximum pending rows read per run.
    pub batch_size: usize,
    /// Maximum ids per mark-sent statement.
    pub partition_size: usize,
    /// Number of channel connections (and router workers).
    pub connection_count: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: 1000,
            partition_size: 5000,
            connection_count: 1,
        }
    }
}

impl DispatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_partition_size(mut self, size: usize) -> Self {
        self.partition_size = size;
        self
    }

    pub fn with_connection_count(mut self, count: usize) -> Self {
        self.connection_count = count;
        self
    }

    /// Load from `OUTBOX_DISPATCH_*` environment variables.
    ///
    /// Unset variables keep their default; malformed values are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load using an arbitrary key lookup (environment, map, etc).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let enabled = match lookup(ENV_ENABLED) {
            Some(value) => parse_flag(ENV_ENABLED, &value)?,
            None => defaults.enabled,
        };
        let batch_size = parse_count(ENV_BATCH_SIZE, lookup(ENV_BATCH_SIZE), defaults.batch_size)?;
        let partition_size = parse_count(
            ENV_PARTITION_SIZE,
            lookup(ENV_PARTITION_SIZE),
            defaults.partition_size,
        )?;
        let connection_count = parse_count(
            ENV_CONNECTIONS,
            lookup(ENV_CONNECTIONS),
            defaults.connection_count,
        )?;

        let config = Self {
            enabled,
            batch_size,
            partition_size,
            connection_count,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Zero("batch_size"));
        }
        if self.partition_size == 0 {
            return Err(ConfigError::Zero("partition_size"));
        }
        if self.connection_count == 0 {
            return Err(ConfigError::Zero("connection_count"));
        }
        Ok(())
    }
}

fn parse_count(
    key: &'static str,
    value: Option<String>,
    default: usize,
) -> Result<usize, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            key,
            value: value.to_string(),
        }),
    }
}
