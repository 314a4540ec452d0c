//! Binance klines source
//!
//! Fetches historical candles from `/api/v3/klines`. Failures are classified
//! into transient (network, 429, 5xx, undecodable body) and terminal (other
//! 4xx such as unknown symbols) for the assembler's retry logic.

use crate::domain::errors::FetchError;
use crate::domain::market::{Candle, Timeframe};
use crate::domain::ports::MarketDataSource;
use crate::infrastructure::core::http_client_factory::{HttpClientFactory, build_url_with_query};
use crate::infrastructure::http_status::classify_status;
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use std::time::Duration;
use tracing::debug;

pub struct BinanceMarketDataSource {
    client: ClientWithMiddleware,
    base_url: String,
}

impl BinanceMarketDataSource {
    pub fn new(base_url: impl Into<String>, transport_retries: u32) -> Self {
        Self {
            client: HttpClientFactory::create_client(transport_retries, Duration::from_secs(30)),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl MarketDataSource for BinanceMarketDataSource {
    async fn fetch(
        &self,
        symbol: &str,
        interval: Timeframe,
        start_ms: i64,
        end_ms: i64,
        limit: usize,
    ) -> Result<Vec<Candle>, FetchError> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let start = start_ms.to_string();
        let end = end_ms.to_string();
        let limit = limit.to_string();

        let url_with_query = build_url_with_query(
            &url,
            &[
                ("symbol", symbol),
                ("interval", interval.to_binance_string()),
                ("startTime", start.as_str()),
                ("endTime", end.as_str()),
                ("limit", limit.as_str()),
            ],
        )
        .map_err(|e| FetchError::terminal(format!("invalid Binance URL: {}", e)))?;

        let response = self
            .client
            .get(&url_with_query)
            .send()
            .await
            .map_err(|e| FetchError::transient(format!("Binance klines request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_status(
                status,
                format!("Binance klines fetch failed ({}): {}", status, error_text),
            ));
        }

        // Binance klines format: [openTime, open, high, low, close, volume, ...]
        let klines: Vec<serde_json::Value> = response.json().await.map_err(|e| {
            FetchError::transient(format!("Failed to parse Binance klines response: {}", e))
        })?;

        let candles = parse_klines(&klines);
        debug!(
            "BinanceMarketDataSource: Fetched {} bars for {} [{}, {}]",
            candles.len(),
            symbol,
            start_ms,
            end_ms
        );
        Ok(candles)
    }
}

fn parse_klines(klines: &[serde_json::Value]) -> Vec<Candle> {
    klines
        .iter()
        .filter_map(|k| {
            let arr = k.as_array()?;
            if arr.len() < 6 {
                return None;
            }

            let field = |i: usize| arr[i].as_str()?.parse::<f64>().ok();

            Some(Candle {
                timestamp: arr[0].as_i64()?,
                open: field(1)?,
                high: field(2)?,
                low: field(3)?,
                close: field(4)?,
                volume: field(5)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_klines_skips_malformed_rows() {
        let rows = vec![
            json!([1704067200000i64, "42000.1", "42100.0", "41950.5", "42050.25", "12.5", 1704067499999i64]),
            json!([1704067500000i64, "bad", "1", "1", "1", "1"]),
            json!([1704067800000i64, "1"]),
        ];

        let candles = parse_klines(&rows);
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].timestamp, 1704067200000);
        assert_eq!(candles[0].close, 42050.25);
        assert_eq!(candles[0].volume, 12.5);
    }
}
