use crate::config::MarketDataEnvConfig;
use crate::domain::market::{TimeRange, Timeframe};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Sampled input window for one request, split into fetchable sub-windows.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedWindow {
    pub start_ms: i64,
    pub end_ms: i64,
    /// Contiguous, non-overlapping, covering `[start_ms, end_ms)`
    pub ranges: Vec<TimeRange>,
}

pub struct TimeRangePlanner {
    timeframe: Timeframe,
    window_ms: i64,
    min_span_days: i64,
    max_span_days: i64,
    lookback_days: i64,
    rng: StdRng,
}

impl TimeRangePlanner {
    pub fn new(config: &MarketDataEnvConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let min_span_days = config.min_span_days.max(1);
        Self {
            timeframe: config.timeframe,
            window_ms: config.window_hours.max(1) * HOUR_MS,
            min_span_days,
            max_span_days: config.max_span_days.max(min_span_days),
            lookback_days: config.historical_lookback_days.max(1),
            rng,
        }
    }

    /// Live windows end at the current period boundary; historical windows
    /// end a random number of whole days before it.
    pub fn plan(&mut self, historical: bool, now_ms: i64) -> PlannedWindow {
        let span_days = self
            .rng
            .random_range(self.min_span_days..=self.max_span_days);

        let aligned_now = self.timeframe.period_start(now_ms);
        let end_ms = if historical {
            let days_back = self.rng.random_range(1..=self.lookback_days);
            aligned_now - days_back * DAY_MS
        } else {
            aligned_now
        };
        let start_ms = end_ms - span_days * DAY_MS;

        PlannedWindow {
            start_ms,
            end_ms,
            ranges: split_range(start_ms, end_ms, self.window_ms),
        }
    }
}

/// Splits `[start, end)` into consecutive chunks of at most `window_ms`.
pub fn split_range(start_ms: i64, end_ms: i64, window_ms: i64) -> Vec<TimeRange> {
    let mut ranges = Vec::new();
    if window_ms <= 0 {
        return ranges;
    }
    let mut cursor = start_ms;
    while cursor < end_ms {
        let next = (cursor + window_ms).min(end_ms);
        ranges.push(TimeRange::new(cursor, next));
        cursor = next;
    }
    ranges
}
