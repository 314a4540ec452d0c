pub mod binance;
pub mod bybit;
pub mod core;
pub mod http_status;
pub mod miner;
pub mod mock;
pub mod observability;
pub mod persistence;

use crate::config::{MarketDataEnvConfig, MarketDataProvider};
use crate::domain::ports::MarketDataSource;
use std::sync::Arc;

/// Builds the configured kline provider.
pub fn market_data_source(config: &MarketDataEnvConfig) -> Arc<dyn MarketDataSource> {
    match config.provider {
        MarketDataProvider::Binance => Arc::new(binance::BinanceMarketDataSource::new(
            config.binance_base_url.clone(),
            config.http_transport_retries,
        )),
        MarketDataProvider::Bybit => Arc::new(bybit::BybitMarketDataSource::new(
            config.bybit_base_url.clone(),
            config.bybit_category.clone(),
            config.http_transport_retries,
        )),
    }
}
