//! Market-data provider and window-planning configuration.

use super::parse_env;
use crate::domain::market::Timeframe;
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Largest page both providers serve per kline request
pub const MAX_FETCH_LIMIT: usize = 1000;

/// Candle provider backing the market window assembler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketDataProvider {
    Binance,
    Bybit,
}

impl FromStr for MarketDataProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "binance" => Ok(MarketDataProvider::Binance),
            "bybit" => Ok(MarketDataProvider::Bybit),
            _ => anyhow::bail!(
                "Invalid MARKET_DATA_PROVIDER: {}. Must be 'binance' or 'bybit'",
                s
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketDataEnvConfig {
    pub provider: MarketDataProvider,
    pub binance_base_url: String,
    pub bybit_base_url: String,
    pub bybit_category: String,
    pub timeframe: Timeframe,
    /// Max candles per request
    pub fetch_limit: usize,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Sleep before retry n is n times this unit
    pub retry_backoff_unit: Duration,
    /// Transport-level retries inside the HTTP client
    pub http_transport_retries: u32,
    pub window_hours: i64,
    pub min_span_days: i64,
    pub max_span_days: i64,
    pub historical_lookback_days: i64,
}

impl Default for MarketDataEnvConfig {
    fn default() -> Self {
        Self {
            provider: MarketDataProvider::Binance,
            binance_base_url: "https://api.binance.com".to_string(),
            bybit_base_url: "https://api.bybit.com".to_string(),
            bybit_category: "linear".to_string(),
            timeframe: Timeframe::FiveMin,
            fetch_limit: 1000,
            max_retries: 5,
            retry_backoff_unit: Duration::from_secs(1),
            http_transport_retries: 0,
            window_hours: 12,
            min_span_days: 1,
            max_span_days: 3,
            historical_lookback_days: 180,
        }
    }
}

impl MarketDataEnvConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let provider = match env::var("MARKET_DATA_PROVIDER") {
            Ok(raw) => MarketDataProvider::from_str(&raw)?,
            Err(_) => defaults.provider,
        };
        let timeframe = match env::var("TIMEFRAME") {
            Ok(raw) => Timeframe::from_str(&raw).context("Failed to parse TIMEFRAME")?,
            Err(_) => defaults.timeframe,
        };

        let min_span_days = parse_env("MIN_SPAN_DAYS", defaults.min_span_days)?;
        let max_span_days = parse_env("MAX_SPAN_DAYS", defaults.max_span_days)?;
        if min_span_days < 1 || max_span_days < min_span_days {
            anyhow::bail!(
                "Invalid span bounds: MIN_SPAN_DAYS={} MAX_SPAN_DAYS={}",
                min_span_days,
                max_span_days
            );
        }

        let window_hours = parse_env("WINDOW_HOURS", defaults.window_hours)?;
        if window_hours < 1 {
            anyhow::bail!("WINDOW_HOURS must be at least 1");
        }

        let fetch_limit = parse_env("FETCH_LIMIT", defaults.fetch_limit)?;
        if !(1..=MAX_FETCH_LIMIT).contains(&fetch_limit) {
            anyhow::bail!(
                "FETCH_LIMIT must be within [1, {}], got {}",
                MAX_FETCH_LIMIT,
                fetch_limit
            );
        }

        Ok(Self {
            provider,
            binance_base_url: env::var("BINANCE_BASE_URL").unwrap_or(defaults.binance_base_url),
            bybit_base_url: env::var("BYBIT_BASE_URL").unwrap_or(defaults.bybit_base_url),
            bybit_category: env::var("BYBIT_CATEGORY").unwrap_or(defaults.bybit_category),
            timeframe,
            fetch_limit,
            max_retries: parse_env("FETCH_MAX_RETRIES", defaults.max_retries)?,
            retry_backoff_unit: Duration::from_millis(parse_env("FETCH_BACKOFF_MS", 1000u64)?),
            http_transport_retries: parse_env(
                "HTTP_TRANSPORT_RETRIES",
                defaults.http_transport_retries,
            )?,
            window_hours,
            min_span_days,
            max_span_days,
            historical_lookback_days: parse_env(
                "HISTORICAL_LOOKBACK_DAYS",
                defaults.historical_lookback_days,
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_env;

    #[test]
    fn test_provider_parsing() {
        assert_eq!(
            MarketDataProvider::from_str("ByBit").unwrap(),
            MarketDataProvider::Bybit
        );
        assert!(MarketDataProvider::from_str("kraken").is_err());
    }

    #[test]
    fn test_rejects_inverted_span_bounds() {
        let _guard = test_env::lock();
        test_env::set("MIN_SPAN_DAYS", "4");
        test_env::set("MAX_SPAN_DAYS", "2");
        assert!(MarketDataEnvConfig::from_env().is_err());
        test_env::remove("MIN_SPAN_DAYS");
        test_env::remove("MAX_SPAN_DAYS");
    }

    #[test]
    fn test_fetch_limit_capped_by_provider_page() {
        let _guard = test_env::lock();
        test_env::set("FETCH_LIMIT", "1500");
        assert!(MarketDataEnvConfig::from_env().is_err());
        test_env::set("FETCH_LIMIT", "200");
        assert_eq!(MarketDataEnvConfig::from_env().unwrap().fetch_limit, 200);
        test_env::remove("FETCH_LIMIT");
    }

    #[test]
    fn test_defaults() {
        let _guard = test_env::lock();
        let config = MarketDataEnvConfig::from_env().unwrap();
        assert_eq!(config.timeframe, Timeframe::FiveMin);
        assert_eq!(config.retry_backoff_unit, Duration::from_secs(1));
        assert_eq!(config.window_hours, 12);
    }
}
