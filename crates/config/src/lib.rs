//! # code-hub-config
//!
//! Configuration schema, validation, and loading for code-hub.
//!
//! Sources merge in a deterministic order: defaults, then an optional
//! TOML or JSON file, then `CODE_HUB_*` environment overrides. The merged
//! result is validated before use; invalid values fail fast with typed
//! errors.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod env;
pub mod load;
pub mod schema;

pub use env::{
    ENV_QUERY_BUDGET_MS, ENV_QUERY_MAX_RESULTS, ENV_RETRY_BASE_DELAY_MS, ENV_RETRY_JITTER_RATIO_PCT,
    ENV_RETRY_MAX_ATTEMPTS, ENV_RETRY_MAX_DELAY_MS, ENV_SERVER_ADMIN_USERS, ENV_SERVER_BASE_URL,
    ENV_SERVER_REQUEST_TIMEOUT_MS, EnvParseError, HubEnv, apply_env_overrides,
};
pub use load::{
    load_hub_config_from_path, load_hub_config_std_env, parse_hub_config_json,
    parse_hub_config_toml,
};
pub use schema::{
    CURRENT_CONFIG_VERSION, ConfigSchemaError, HubConfig, QueryConfig, RetryConfig, ServerConfig,
    ValidatedHubConfig,
};

/// Returns the config crate version.
#[must_use]
pub const fn config_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_crate_compiles() {
        let version = config_crate_version();
        assert!(!version.is_empty());
    }
}
