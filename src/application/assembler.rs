//! Market window assembly.
//!
//! Fetches every planned sub-window from the configured source and appends
//! the candles to one [`TimeSeriesBuffer`]. Each fetch is retried on
//! transient failures with a linearly growing sleep; terminal failures and
//! an exhausted retry budget abort the whole window.

use crate::domain::errors::{FetchError, MarketDataError};
use crate::domain::market::{Candle, TimeRange, TimeSeriesBuffer, Timeframe};
use crate::domain::ports::MarketDataSource;
use crate::infrastructure::observability::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt
    pub max_retries: u32,
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_unit: Duration) -> Self {
        Self {
            max_retries,
            backoff_unit,
        }
    }

    /// Sleep before retry `n` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        self.backoff_unit * retry
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1))
    }
}

pub struct MarketWindowAssembler {
    source: Arc<dyn MarketDataSource>,
    timeframe: Timeframe,
    fetch_limit: usize,
    retry: RetryPolicy,
    metrics: Option<Metrics>,
}

impl MarketWindowAssembler {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        timeframe: Timeframe,
        fetch_limit: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            timeframe,
            fetch_limit: fetch_limit.max(1),
            retry,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Builds one buffer from half-open `ranges`, in order.
    pub async fn assemble(
        &self,
        symbol: &str,
        ranges: &[TimeRange],
    ) -> Result<TimeSeriesBuffer, MarketDataError> {
        let mut buffer = TimeSeriesBuffer::new();
        for range in ranges {
            let candles = self.fetch_range(symbol, *range).await?;
            let added = buffer.append_candles(&candles);
            debug!(
                "MarketWindowAssembler: {} [{}, {}) -> {} rows",
                symbol, range.start_ms, range.end_ms, added
            );
        }
        info!(
            "MarketWindowAssembler: Assembled {} rows for {} over {} window(s)",
            buffer.len(),
            symbol,
            ranges.len()
        );
        Ok(buffer)
    }

    /// Fetches one half-open range, paging when the source hits its limit.
    ///
    /// A full page may sit at either end of the requested span (Binance
    /// serves the oldest rows, Bybit the newest), so the uncovered parts on
    /// both sides are queued until every page comes back short.
    async fn fetch_range(
        &self,
        symbol: &str,
        range: TimeRange,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let step = self.timeframe.to_millis();
        let mut collected: Vec<Candle> = Vec::new();
        let mut uncovered = vec![range];

        while let Some(span) = uncovered.pop() {
            let page = self
                .fetch_with_retry(symbol, span.start_ms, span.end_ms - 1)
                .await?;
            let full_page = page.len() >= self.fetch_limit;
            let page: Vec<Candle> = page
                .into_iter()
                .filter(|c| span.contains(c.timestamp))
                .collect();

            let first = page.iter().map(|c| c.timestamp).min();
            let last = page.iter().map(|c| c.timestamp).max();
            collected.extend(page);

            let (Some(first), Some(last)) = (first, last) else {
                continue;
            };
            if !full_page {
                continue;
            }
            if last + step < span.end_ms {
                uncovered.push(TimeRange::new(last + step, span.end_ms));
            }
            if first > span.start_ms {
                uncovered.push(TimeRange::new(span.start_ms, first));
            }
        }

        collected.sort_by_key(|c| c.timestamp);
        collected.dedup_by_key(|c| c.timestamp);
        Ok(collected)
    }

    async fn fetch_with_retry(
        &self,
        symbol: &str,
        start_ms: i64,
        end_inclusive_ms: i64,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let mut retry = 0u32;
        loop {
            let result = self
                .source
                .fetch(
                    symbol,
                    self.timeframe,
                    start_ms,
                    end_inclusive_ms,
                    self.fetch_limit,
                )
                .await;

            let error = match result {
                Ok(candles) => {
                    self.record_fetch("ok");
                    return Ok(candles);
                }
                Err(e) => e,
            };

            match error {
                FetchError::Terminal { .. } => {
                    self.record_fetch("terminal");
                    warn!(
                        "MarketWindowAssembler: Terminal failure for {}: {}",
                        symbol, error
                    );
                    return Err(MarketDataError::Terminal {
                        symbol: symbol.to_string(),
                        source: error,
                    });
                }
                FetchError::Transient { .. } => {
                    self.record_fetch("transient");
                    if retry >= self.retry.max_retries {
                        warn!(
                            "MarketWindowAssembler: Giving up on {} after {} attempts: {}",
                            symbol,
                            retry + 1,
                            error
                        );
                        return Err(MarketDataError::RetriesExhausted {
                            symbol: symbol.to_string(),
                            attempts: retry + 1,
                            last_error: error,
                        });
                    }

                    retry += 1;
                    let delay = self.retry.delay(retry);
                    warn!(
                        "MarketWindowAssembler: {} (retry {}/{} in {:?})",
                        error, retry, self.retry.max_retries, delay
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    fn record_fetch(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_fetch(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::MockMarketDataSource;

    fn assembler(source: &MockMarketDataSource, limit: usize) -> MarketWindowAssembler {
        MarketWindowAssembler::new(
            Arc::new(source.clone()),
            Timeframe::FiveMin,
            limit,
            RetryPolicy::new(5, Duration::ZERO),
        )
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(4), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_half_open_ranges_do_not_duplicate() {
        let source = MockMarketDataSource::new();
        let step = Timeframe::FiveMin.to_millis();
        let ranges = [TimeRange::new(0, 4 * step), TimeRange::new(4 * step, 8 * step)];

        let buffer = assembler(&source, 1000).assemble("BTCUSDT", &ranges).await.unwrap();

        let expected: Vec<i64> = (0..8).map(|i| i * step).collect();
        assert_eq!(buffer.timestamps(), expected.as_slice());
    }

    #[tokio::test]
    async fn test_pages_through_source_limit() {
        let source = MockMarketDataSource::new();
        let step = Timeframe::FiveMin.to_millis();

        let buffer = assembler(&source, 3)
            .assemble("BTCUSDT", &[TimeRange::new(0, 10 * step)])
            .await
            .unwrap();

        assert_eq!(buffer.len(), 10);
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test]
    async fn test_pages_backward_through_newest_first_source() {
        let source = MockMarketDataSource::new();
        source.set_newest_first(true);
        let step = Timeframe::FiveMin.to_millis();

        let buffer = assembler(&source, 3)
            .assemble("BTCUSDT", &[TimeRange::new(0, 10 * step)])
            .await
            .unwrap();

        let expected: Vec<i64> = (0..10).map(|i| i * step).collect();
        assert_eq!(buffer.timestamps(), expected.as_slice());
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test]
    async fn test_terminal_failure_is_not_retried() {
        let source = MockMarketDataSource::new();
        source
            .push_failures([FetchError::terminal("bad symbol")])
            .await;

        let err = assembler(&source, 1000)
            .assemble("NOPE", &[TimeRange::new(0, 300_000)])
            .await
            .unwrap_err();

        assert!(matches!(err, MarketDataError::Terminal { .. }));
        assert_eq!(source.calls(), 1);
    }
}
