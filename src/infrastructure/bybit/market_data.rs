//! Bybit v5 kline source
//!
//! `/v5/market/kline` returns the newest `limit` rows of the requested span,
//! newest first, with every field encoded as a string. Rows are re-sorted
//! ascending here; the assembler pages backward over what a full page left
//! uncovered.

use crate::domain::errors::FetchError;
use crate::domain::market::{Candle, Timeframe};
use crate::domain::ports::MarketDataSource;
use crate::infrastructure::core::http_client_factory::{HttpClientFactory, build_url_with_query};
use crate::infrastructure::http_status::classify_status;
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

// retCode values that signal throttling or server trouble
const RATE_LIMITED: i64 = 10006;
const SERVER_ERROR: i64 = 10016;

pub struct BybitMarketDataSource {
    client: ClientWithMiddleware,
    base_url: String,
    category: String,
}

#[derive(Debug, Deserialize)]
struct KlineEnvelope {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg", default)]
    ret_msg: String,
    result: Option<KlineResult>,
}

#[derive(Debug, Deserialize)]
struct KlineResult {
    #[serde(default)]
    list: Vec<Vec<String>>,
}

impl BybitMarketDataSource {
    pub fn new(base_url: impl Into<String>, category: impl Into<String>, transport_retries: u32) -> Self {
        Self {
            client: HttpClientFactory::create_client(transport_retries, Duration::from_secs(30)),
            base_url: base_url.into(),
            category: category.into(),
        }
    }
}

#[async_trait]
impl MarketDataSource for BybitMarketDataSource {
    async fn fetch(
        &self,
        symbol: &str,
        interval: Timeframe,
        start_ms: i64,
        end_ms: i64,
        limit: usize,
    ) -> Result<Vec<Candle>, FetchError> {
        let url = format!("{}/v5/market/kline", self.base_url);
        let start = start_ms.to_string();
        let end = end_ms.to_string();
        let limit = limit.to_string();

        let url_with_query = build_url_with_query(
            &url,
            &[
                ("category", self.category.as_str()),
                ("symbol", symbol),
                ("interval", interval.to_bybit_string()),
                ("start", start.as_str()),
                ("end", end.as_str()),
                ("limit", limit.as_str()),
            ],
        )
        .map_err(|e| FetchError::terminal(format!("invalid Bybit URL: {}", e)))?;

        let response = self
            .client
            .get(&url_with_query)
            .send()
            .await
            .map_err(|e| FetchError::transient(format!("Bybit kline request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_status(
                status,
                format!("Bybit kline fetch failed ({}): {}", status, error_text),
            ));
        }

        let envelope: KlineEnvelope = response.json().await.map_err(|e| {
            FetchError::transient(format!("Failed to parse Bybit kline response: {}", e))
        })?;

        let candles = candles_from_envelope(envelope)?;
        debug!(
            "BybitMarketDataSource: Fetched {} bars for {} [{}, {}]",
            candles.len(),
            symbol,
            start_ms,
            end_ms
        );
        Ok(candles)
    }
}

fn candles_from_envelope(envelope: KlineEnvelope) -> Result<Vec<Candle>, FetchError> {
    match envelope.ret_code {
        0 => {}
        RATE_LIMITED | SERVER_ERROR => {
            return Err(FetchError::transient(format!(
                "Bybit retCode {}: {}",
                envelope.ret_code, envelope.ret_msg
            )));
        }
        code => {
            return Err(FetchError::terminal(format!(
                "Bybit retCode {}: {}",
                code, envelope.ret_msg
            )));
        }
    }

    let rows = envelope.result.map(|r| r.list).unwrap_or_default();
    let mut candles: Vec<Candle> = rows
        .iter()
        .filter_map(|row| {
            if row.len() < 6 {
                return None;
            }
            let field = |i: usize| row[i].parse::<f64>().ok();
            Some(Candle {
                timestamp: row[0].parse::<i64>().ok()?,
                open: field(1)?,
                high: field(2)?,
                low: field(3)?,
                close: field(4)?,
                volume: field(5)?,
            })
        })
        .collect();
    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(json: &str) -> KlineEnvelope {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_rows_are_sorted_ascending() {
        let env = envelope(
            r#"{"retCode":0,"retMsg":"OK","result":{"category":"linear","list":[
                ["1704067500000","2","3","1","2.5","10","25"],
                ["1704067200000","1","2","0.5","1.5","8","12"]
            ]}}"#,
        );

        let candles = candles_from_envelope(env).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp, 1704067200000);
        assert_eq!(candles[1].close, 2.5);
    }

    #[test]
    fn test_ret_codes_are_classified() {
        let throttled = envelope(r#"{"retCode":10006,"retMsg":"Too many visits!"}"#);
        assert!(candles_from_envelope(throttled).unwrap_err().is_transient());

        let bad_symbol = envelope(r#"{"retCode":10001,"retMsg":"Invalid symbol"}"#);
        assert!(!candles_from_envelope(bad_symbol).unwrap_err().is_transient());
    }
}
