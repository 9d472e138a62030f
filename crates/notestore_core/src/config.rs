//! Store configuration.
//!
//! # Responsibility
//! - Hold collection naming, deadline and list-limit settings.
//! - Load settings from `NOTESTORE_*` environment variables.
//!
//! # Invariants
//! - A validated config has a non-empty collection name.
//! - `0 < default_list_limit <= max_list_limit`.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const ENV_COLLECTION: &str = "NOTESTORE_COLLECTION";
pub const ENV_OPERATION_TIMEOUT_MS: &str = "NOTESTORE_OPERATION_TIMEOUT_MS";
pub const ENV_DEFAULT_LIST_LIMIT: &str = "NOTESTORE_DEFAULT_LIST_LIMIT";
pub const ENV_MAX_LIST_LIMIT: &str = "NOTESTORE_MAX_LIST_LIMIT";

const DEFAULT_COLLECTION: &str = "notes";
const DEFAULT_LIST_LIMIT: u32 = 20;
const MAX_LIST_LIMIT: u32 = 100;

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value `{value}` for {key}: {reason}")
            }
            Self::Invalid(message) => write!(f, "invalid store config: {message}"),
        }
    }
}

impl Error for ConfigError {}

/// Settings for one notes store instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NoteStoreConfig {
    /// Backing collection name.
    pub collection_name: String,
    /// Deadline for a single store call. `None` leaves it to the caller.
    #[serde(rename = "operation_timeout_ms", with = "optional_millis")]
    pub operation_timeout: Option<Duration>,
    /// Limit applied when a list request gives none (or zero).
    pub default_list_limit: u32,
    /// Upper bound for any list request.
    pub max_list_limit: u32,
}

impl Default for NoteStoreConfig {
    fn default() -> Self {
        Self {
            collection_name: DEFAULT_COLLECTION.to_string(),
            operation_timeout: None,
            default_list_limit: DEFAULT_LIST_LIMIT,
            max_list_limit: MAX_LIST_LIMIT,
        }
    }
}

impl NoteStoreConfig {
    /// Loads config from process environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads config from an arbitrary key lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(name) = read(ENV_COLLECTION) {
            config.collection_name = name;
        }
        if let Some(raw) = read(ENV_OPERATION_TIMEOUT_MS) {
            let millis = parse_u64(ENV_OPERATION_TIMEOUT_MS, raw)?;
            config.operation_timeout = (millis > 0).then(|| Duration::from_millis(millis));
        }
        if let Some(raw) = read(ENV_DEFAULT_LIST_LIMIT) {
            config.default_list_limit = parse_u32(ENV_DEFAULT_LIST_LIMIT, raw)?;
        }
        if let Some(raw) = read(ENV_MAX_LIST_LIMIT) {
            config.max_list_limit = parse_u32(ENV_MAX_LIST_LIMIT, raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Sets the per-call deadline.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Checks cross-field invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collection_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "collection_name cannot be empty".to_string(),
            ));
        }
        if self.default_list_limit == 0 || self.max_list_limit == 0 {
            return Err(ConfigError::Invalid(
                "list limits must be greater than zero".to_string(),
            ));
        }
        if self.default_list_limit > self.max_list_limit {
            return Err(ConfigError::Invalid(format!(
                "default_list_limit {} exceeds max_list_limit {}",
                self.default_list_limit, self.max_list_limit
            )));
        }
        Ok(())
    }

    /// Normalizes a requested list limit.
    ///
    /// `None` and `Some(0)` fall back to the default; larger values clamp to max.
    pub fn normalize_list_limit(&self, limit: Option<u32>) -> u32 {
        match limit {
            Some(0) | None => self.default_list_limit,
            Some(value) if value > self.max_list_limit => self.max_list_limit,
            Some(value) => value,
        }
    }
}

fn parse_u64(key: &'static str, raw: String) -> Result<u64, ConfigError> {
    raw.parse::<u64>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            reason: err.to_string(),
            value: raw,
        })
}

fn parse_u32(key: &'static str, raw: String) -> Result<u32, ConfigError> {
    raw.parse::<u32>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            reason: err.to_string(),
            value: raw,
        })
}

mod optional_millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.filter(|value| *value > 0).map(Duration::from_millis))
    }
}
