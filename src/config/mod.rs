//! Configuration module for the validator.
//!
//! Structured configuration loaded from environment variables, organized by
//! concern: Validator, MarketData, Scoring, and Observability.

mod market_data_config;
mod observability_config;
mod scoring_config;
mod validator_config;

pub use market_data_config::{MarketDataEnvConfig, MarketDataProvider};
pub use observability_config::ObservabilityEnvConfig;
pub use scoring_config::ScoringEnvConfig;
pub use validator_config::ValidatorEnvConfig;

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

/// Main application configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub validator: ValidatorEnvConfig,
    pub market_data: MarketDataEnvConfig,
    pub scoring: ScoringEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            validator: ValidatorEnvConfig::from_env().context("Failed to load validator config")?,
            market_data: MarketDataEnvConfig::from_env()
                .context("Failed to load market data config")?,
            scoring: ScoringEnvConfig::from_env().context("Failed to load scoring config")?,
            observability: ObservabilityEnvConfig::from_env(),
        })
    }
}

/// Reads `key` and parses it, falling back to `default` when unset.
pub(crate) fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Failed to parse {}", key)),
        Err(_) => Ok(default),
    }
}

pub(crate) fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

#[cfg(test)]
pub(crate) mod test_env {
    use std::sync::{Mutex, MutexGuard, OnceLock};

    // Global lock to prevent races when tests modify environment variables
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    pub fn lock() -> MutexGuard<'static, ()> {
        ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    pub fn set(key: &str, value: &str) {
        // SAFETY: callers hold the env lock
        unsafe { std::env::set_var(key, value) }
    }

    pub fn remove(key: &str) {
        // SAFETY: callers hold the env lock
        unsafe { std::env::remove_var(key) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_default_and_override() {
        let _guard = test_env::lock();
        test_env::remove("TSV_TEST_NUMBER");
        assert_eq!(parse_env("TSV_TEST_NUMBER", 7u32).unwrap(), 7);

        test_env::set("TSV_TEST_NUMBER", " 42 ");
        assert_eq!(parse_env("TSV_TEST_NUMBER", 7u32).unwrap(), 42);

        test_env::set("TSV_TEST_NUMBER", "forty-two");
        let err = parse_env("TSV_TEST_NUMBER", 7u32).unwrap_err();
        assert!(err.to_string().contains("TSV_TEST_NUMBER"));

        test_env::remove("TSV_TEST_NUMBER");
    }

    #[test]
    fn test_parse_bool_accepts_common_spellings() {
        let _guard = test_env::lock();
        test_env::set("TSV_TEST_FLAG", "1");
        assert!(parse_bool("TSV_TEST_FLAG", false));
        test_env::set("TSV_TEST_FLAG", "nope");
        assert!(parse_bool("TSV_TEST_FLAG", true));
        test_env::remove("TSV_TEST_FLAG");
    }

    #[test]
    fn test_full_config_defaults() {
        let _guard = test_env::lock();
        let config = Config::from_env().unwrap();
        assert_eq!(config.scoring.top_k, 10);
        assert_eq!(config.market_data.max_retries, 5);
    }
}
