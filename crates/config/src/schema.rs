//! Hub configuration schema, defaults, validation, and normalization.
//!
//! - Deserialization uses `serde` (TOML or JSON).
//! - Validation is manual and returns typed errors mapped to `ErrorEnvelope`.
//! - Normalization enforces stable ordering for list fields.

use code_hub_shared::{ErrorCode, ErrorEnvelope, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Current supported configuration schema version.
pub const CURRENT_CONFIG_VERSION: u32 = 1;

const SERVER_TIMEOUT_MIN_MS: u64 = 1_000;
const SERVER_TIMEOUT_MAX_MS: u64 = 600_000;

const QUERY_BUDGET_MIN_MS: u64 = 100;
const QUERY_BUDGET_MAX_MS: u64 = 600_000;
const QUERY_MAX_RESULTS_MIN: u32 = 1;
const QUERY_MAX_RESULTS_MAX: u32 = 200;

const RETRY_MAX_ATTEMPTS_MIN: u32 = 1;
const RETRY_MAX_ATTEMPTS_MAX: u32 = 10;
const RETRY_BASE_DELAY_MIN_MS: u64 = 1;
const RETRY_BASE_DELAY_MAX_MS: u64 = 60_000;
const RETRY_MAX_DELAY_MIN_MS: u64 = 1;
const RETRY_MAX_DELAY_MAX_MS: u64 = 600_000;
const RETRY_JITTER_RATIO_PCT_MAX: u32 = 100;

const ADMIN_USERS_MAX: usize = 64;

/// Top-level hub configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct HubConfig {
    /// Schema version for forward-compatible migrations.
    pub version: u32,
    /// Hub server connection settings.
    pub server: ServerConfig,
    /// Retry settings for the remote query executor.
    pub retry: RetryConfig,
    /// Query execution settings.
    pub query: QueryConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_CONFIG_VERSION,
            server: ServerConfig::default(),
            retry: RetryConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl HubConfig {
    /// Validate and normalize the config.
    pub fn validate_and_normalize(mut self) -> Result<ValidatedHubConfig, ConfigSchemaError> {
        self.validate_version()?;
        self.server.normalize();
        self.server.validate()?;
        self.retry.validate()?;
        self.query.validate()?;
        Ok(ValidatedHubConfig { raw: self })
    }

    const fn validate_version(&self) -> Result<(), ConfigSchemaError> {
        if self.version != CURRENT_CONFIG_VERSION {
            return Err(ConfigSchemaError::UnsupportedVersion {
                found: self.version,
                supported: CURRENT_CONFIG_VERSION,
            });
        }
        Ok(())
    }
}

/// Validated config wrapper.
#[derive(Debug, Clone)]
pub struct ValidatedHubConfig {
    raw: HubConfig,
}

impl ValidatedHubConfig {
    /// Borrow the raw config.
    #[must_use]
    pub const fn as_ref(&self) -> &HubConfig {
        &self.raw
    }

    /// Consume the wrapper and return the raw config.
    #[must_use]
    pub fn into_inner(self) -> HubConfig {
        self.raw
    }
}

impl AsRef<HubConfig> for ValidatedHubConfig {
    fn as_ref(&self) -> &HubConfig {
        &self.raw
    }
}

impl std::ops::Deref for ValidatedHubConfig {
    type Target = HubConfig;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

/// Hub server connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ServerConfig {
    /// Base URL of the hub server.
    pub base_url: Box<str>,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// User ids granted administrative privilege.
    pub admin_users: Vec<Box<str>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8090".into(),
            request_timeout_ms: 30_000,
            admin_users: Vec::new(),
        }
    }
}

impl ServerConfig {
    fn normalize(&mut self) {
        self.admin_users.sort_unstable();
        self.admin_users.dedup();
    }

    fn validate(&self) -> Result<(), ConfigSchemaError> {
        if Url::parse(self.base_url.as_ref()).is_err() {
            return Err(ConfigSchemaError::InvalidUrl {
                section: "server",
                field: "baseUrl",
                value: self.base_url.to_string(),
            });
        }
        bounded(
            "server",
            "requestTimeoutMs",
            self.request_timeout_ms,
            SERVER_TIMEOUT_MIN_MS,
            SERVER_TIMEOUT_MAX_MS,
        )?;
        if self.admin_users.len() > ADMIN_USERS_MAX {
            return Err(ConfigSchemaError::ListTooLarge {
                section: "server",
                field: "adminUsers",
                len: self.admin_users.len(),
                max: ADMIN_USERS_MAX,
            });
        }
        for user in &self.admin_users {
            if user.trim().is_empty() {
                return Err(ConfigSchemaError::EmptyListEntry {
                    section: "server",
                    field: "adminUsers",
                });
            }
        }
        Ok(())
    }

    /// Whether `user_id` is granted administrative privilege.
    #[must_use]
    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_users.iter().any(|user| user.as_ref() == user_id)
    }
}

/// Retry settings for the remote query executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct RetryConfig {
    /// Maximum number of attempts (first try included).
    pub max_attempts: u32,
    /// Base delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Backoff delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter ratio applied to each delay, in percent.
    pub jitter_ratio_pct: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay_ms,
            max_delay_ms: policy.max_delay_ms,
            jitter_ratio_pct: policy.jitter_ratio_pct,
        }
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<(), ConfigSchemaError> {
        bounded(
            "retry",
            "maxAttempts",
            u64::from(self.max_attempts),
            u64::from(RETRY_MAX_ATTEMPTS_MIN),
            u64::from(RETRY_MAX_ATTEMPTS_MAX),
        )?;
        bounded(
            "retry",
            "baseDelayMs",
            self.base_delay_ms,
            RETRY_BASE_DELAY_MIN_MS,
            RETRY_BASE_DELAY_MAX_MS,
        )?;
        bounded(
            "retry",
            "maxDelayMs",
            self.max_delay_ms,
            RETRY_MAX_DELAY_MIN_MS,
            RETRY_MAX_DELAY_MAX_MS,
        )?;
        bounded(
            "retry",
            "jitterRatioPct",
            u64::from(self.jitter_ratio_pct),
            0,
            u64::from(RETRY_JITTER_RATIO_PCT_MAX),
        )?;
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ConfigSchemaError::LimitOutOfRange {
                section: "retry",
                field: "baseDelayMs",
                value: self.base_delay_ms,
                min: RETRY_BASE_DELAY_MIN_MS,
                max: self.max_delay_ms,
            });
        }
        Ok(())
    }

    /// Convert to the shared retry policy.
    #[must_use]
    pub const fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
            jitter_ratio_pct: self.jitter_ratio_pct,
        }
    }
}

/// Query execution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct QueryConfig {
    /// Hard deadline for one query including retries, in milliseconds.
    pub budget_ms: u64,
    /// Maximum number of hits requested per query.
    pub max_results: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            budget_ms: 15_000,
            max_results: 10,
        }
    }
}

impl QueryConfig {
    fn validate(&self) -> Result<(), ConfigSchemaError> {
        bounded(
            "query",
            "budgetMs",
            self.budget_ms,
            QUERY_BUDGET_MIN_MS,
            QUERY_BUDGET_MAX_MS,
        )?;
        bounded(
            "query",
            "maxResults",
            u64::from(self.max_results),
            u64::from(QUERY_MAX_RESULTS_MIN),
            u64::from(QUERY_MAX_RESULTS_MAX),
        )?;
        Ok(())
    }
}

const fn bounded(
    section: &'static str,
    field: &'static str,
    value: u64,
    min: u64,
    max: u64,
) -> Result<(), ConfigSchemaError> {
    if value < min || value > max {
        return Err(ConfigSchemaError::LimitOutOfRange {
            section,
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Typed configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSchemaError {
    /// The config version is not supported by this binary.
    UnsupportedVersion {
        /// Version found in the config.
        found: u32,
        /// Version supported by this crate.
        supported: u32,
    },
    /// A numeric limit is out of bounds.
    LimitOutOfRange {
        /// Schema section (e.g. `retry`).
        section: &'static str,
        /// Field name in the config file (e.g. `maxAttempts`).
        field: &'static str,
        /// Value provided.
        value: u64,
        /// Minimum allowed value.
        min: u64,
        /// Maximum allowed value.
        max: u64,
    },
    /// A URL field is invalid.
    InvalidUrl {
        /// Schema section (e.g. `server`).
        section: &'static str,
        /// Field name in the config file (e.g. `baseUrl`).
        field: &'static str,
        /// Invalid value.
        value: String,
    },
    /// A list field exceeds the maximum allowed size.
    ListTooLarge {
        /// Schema section.
        section: &'static str,
        /// Field name in the config file.
        field: &'static str,
        /// Number of entries after normalization.
        len: usize,
        /// Maximum allowed number of entries.
        max: usize,
    },
    /// A list field contains an empty entry.
    EmptyListEntry {
        /// Schema section.
        section: &'static str,
        /// Field name in the config file.
        field: &'static str,
    },
}

impl fmt::Display for ConfigSchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion { found, supported } => {
                write!(f, "unsupported config version {found} (supported: {supported})")
            },
            Self::LimitOutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => {
                write!(f, "{section}.{field} = {value} is out of range [{min}, {max}]")
            },
            Self::InvalidUrl {
                section,
                field,
                value,
            } => {
                write!(f, "{section}.{field} is not a valid URL: {value}")
            },
            Self::ListTooLarge {
                section,
                field,
                len,
                max,
            } => {
                write!(f, "{section}.{field} has {len} entries (max {max})")
            },
            Self::EmptyListEntry { section, field } => {
                write!(f, "{section}.{field} contains an empty entry")
            },
        }
    }
}

impl std::error::Error for ConfigSchemaError {}

impl From<ConfigSchemaError> for ErrorEnvelope {
    fn from(error: ConfigSchemaError) -> Self {
        let message = error.to_string();
        let mut envelope = Self::expected(ErrorCode::invalid_input(), message);

        match error {
            ConfigSchemaError::UnsupportedVersion { found, supported } => {
                envelope = envelope
                    .with_metadata("found", found.to_string())
                    .with_metadata("supported", supported.to_string());
            },
            ConfigSchemaError::LimitOutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("value", value.to_string())
                    .with_metadata("min", min.to_string())
                    .with_metadata("max", max.to_string());
            },
            ConfigSchemaError::InvalidUrl {
                section,
                field,
                value,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("value", value);
            },
            ConfigSchemaError::ListTooLarge {
                section,
                field,
                len,
                max,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("len", len.to_string())
                    .with_metadata("max", max.to_string());
            },
            ConfigSchemaError::EmptyListEntry { section, field } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field);
            },
        }

        envelope
    }
}
