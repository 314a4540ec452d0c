//! Validator identity, scheduling and request-template configuration.

use super::{parse_bool, parse_env};
use crate::domain::requests::RequestTemplate;
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Validator environment configuration
#[derive(Debug, Clone)]
pub struct ValidatorEnvConfig {
    pub netuid: u16,
    pub hotkey: String,
    /// Root for predictions, ledger and weight journal
    pub data_dir: PathBuf,
    pub metagraph_path: PathBuf,

    // Scheduling
    pub tick_interval: Duration,
    pub client_request_interval: Duration,
    pub training_probability: f64,
    pub test_only_historical: bool,
    pub rng_seed: Option<u64>,

    // Miner transport
    pub miner_timeout: Duration,

    pub template: RequestTemplate,
}

impl Default for ValidatorEnvConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            netuid: 1,
            hotkey: "validator".to_string(),
            metagraph_path: data_dir.join("metagraph.toml"),
            data_dir,
            tick_interval: Duration::from_secs(5),
            client_request_interval: Duration::from_secs(60),
            training_probability: 0.1,
            test_only_historical: false,
            rng_seed: None,
            miner_timeout: Duration::from_secs(12),
            template: RequestTemplate {
                stream_type: "BTCUSDT".to_string(),
                topic_id: 1,
                feature_ids: vec![0, 1, 2, 3, 4],
                schema_id: 1,
                prediction_size: 100,
            },
        }
    }
}

impl ValidatorEnvConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let metagraph_path = env::var("METAGRAPH_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("metagraph.toml"));

        let training_probability =
            parse_env("TRAINING_PROBABILITY", defaults.training_probability)?;
        if !(0.0..=1.0).contains(&training_probability) {
            anyhow::bail!(
                "TRAINING_PROBABILITY must be within [0, 1], got {}",
                training_probability
            );
        }

        let rng_seed = match env::var("RNG_SEED") {
            Ok(raw) => Some(raw.parse::<u64>().context("Failed to parse RNG_SEED")?),
            Err(_) => None,
        };

        let feature_ids = match env::var("FEATURE_IDS") {
            Ok(raw) => parse_feature_ids(&raw)?,
            Err(_) => defaults.template.feature_ids,
        };

        let prediction_size = parse_env("PREDICTION_SIZE", defaults.template.prediction_size)?;
        if prediction_size == 0 {
            anyhow::bail!("PREDICTION_SIZE must be positive");
        }

        let tick_interval_secs = parse_env("TICK_INTERVAL_SECS", 5u64)?;
        if tick_interval_secs == 0 {
            anyhow::bail!("TICK_INTERVAL_SECS must be positive");
        }

        Ok(Self {
            netuid: parse_env("NETUID", defaults.netuid)?,
            hotkey: env::var("VALIDATOR_HOTKEY").unwrap_or(defaults.hotkey),
            data_dir,
            metagraph_path,
            tick_interval: Duration::from_secs(tick_interval_secs),
            client_request_interval: Duration::from_secs(parse_env(
                "CLIENT_REQUEST_INTERVAL_SECS",
                60u64,
            )?),
            training_probability,
            test_only_historical: parse_bool("TEST_ONLY_HISTORICAL", false),
            rng_seed,
            miner_timeout: Duration::from_secs(parse_env("MINER_TIMEOUT_SECS", 12u64)?),
            template: RequestTemplate {
                stream_type: env::var("STREAM_SYMBOL").unwrap_or(defaults.template.stream_type),
                topic_id: parse_env("TOPIC_ID", defaults.template.topic_id)?,
                feature_ids,
                schema_id: parse_env("SCHEMA_ID", defaults.template.schema_id)?,
                prediction_size,
            },
        })
    }

    pub fn predictions_dir(&self) -> PathBuf {
        self.data_dir.join("predictions")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("cmw_ledger.json")
    }

    pub fn weights_journal_path(&self) -> PathBuf {
        self.data_dir.join("weights.jsonl")
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var("HOME")
        .map(|home| PathBuf::from(home).join(".tsvalidator"))
        .unwrap_or_else(|_| PathBuf::from("./data"))
}

fn parse_feature_ids(raw: &str) -> Result<Vec<u32>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>()
                .with_context(|| format!("Invalid feature id '{}' in FEATURE_IDS", s))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_env;

    #[test]
    fn test_feature_ids_parsing() {
        assert_eq!(parse_feature_ids("0, 1,2,").unwrap(), vec![0, 1, 2]);
        assert!(parse_feature_ids("0,x").is_err());
    }

    #[test]
    fn test_overrides_and_paths() {
        let _guard = test_env::lock();
        test_env::set("DATA_DIR", "/tmp/tsv-config-test");
        test_env::set("PREDICTION_SIZE", "12");
        test_env::set("TRAINING_PROBABILITY", "0.25");

        let config = ValidatorEnvConfig::from_env().unwrap();
        assert_eq!(config.template.prediction_size, 12);
        assert_eq!(config.training_probability, 0.25);
        assert_eq!(
            config.ledger_path(),
            PathBuf::from("/tmp/tsv-config-test/cmw_ledger.json")
        );
        assert_eq!(
            config.metagraph_path,
            PathBuf::from("/tmp/tsv-config-test/metagraph.toml")
        );

        test_env::remove("DATA_DIR");
        test_env::remove("PREDICTION_SIZE");
        test_env::remove("TRAINING_PROBABILITY");
    }

    #[test]
    fn test_rejects_out_of_range_probability() {
        let _guard = test_env::lock();
        test_env::set("TRAINING_PROBABILITY", "1.5");
        assert!(ValidatorEnvConfig::from_env().is_err());
        test_env::remove("TRAINING_PROBABILITY");
    }

    #[test]
    fn test_rejects_zero_tick_interval() {
        let _guard = test_env::lock();
        test_env::set("TICK_INTERVAL_SECS", "0");
        let err = ValidatorEnvConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("TICK_INTERVAL_SECS"));
        test_env::set("TICK_INTERVAL_SECS", "3");
        assert_eq!(
            ValidatorEnvConfig::from_env().unwrap().tick_interval,
            Duration::from_secs(3)
        );
        test_env::remove("TICK_INTERVAL_SECS");
    }
}
