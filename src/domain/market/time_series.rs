//! Multi-feature time-series buffers assembled from candle data.

use serde::{Deserialize, Serialize};

/// One OHLCV candle as returned by a market-data source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time in ms since epoch
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Feature columns in a [`TimeSeriesBuffer`], in column order.
///
/// Close is column 0: it is the predicted series and the ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    Close,
    Open,
    High,
    Low,
    Volume,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::Close,
        Feature::Open,
        Feature::High,
        Feature::Low,
        Feature::Volume,
    ];

    /// Fixed column index of this feature
    pub fn index(&self) -> usize {
        match self {
            Feature::Close => 0,
            Feature::Open => 1,
            Feature::High => 2,
            Feature::Low => 3,
            Feature::Volume => 4,
        }
    }

    fn extract(&self, candle: &Candle) -> f64 {
        match self {
            Feature::Close => candle.close,
            Feature::Open => candle.open,
            Feature::High => candle.high,
            Feature::Low => candle.low,
            Feature::Volume => candle.volume,
        }
    }
}

/// Half-open time range `[start_ms, end_ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TimeRange {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn contains(&self, timestamp_ms: i64) -> bool {
        timestamp_ms >= self.start_ms && timestamp_ms < self.end_ms
    }
}

/// Column-oriented buffer of feature samples aligned by timestamp.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeSeriesBuffer {
    timestamps: Vec<i64>,
    columns: Vec<Vec<f64>>,
}

impl TimeSeriesBuffer {
    pub fn new() -> Self {
        Self {
            timestamps: Vec::new(),
            columns: vec![Vec::new(); Feature::ALL.len()],
        }
    }

    /// Builds a buffer directly from columns (already aligned).
    pub fn from_columns(timestamps: Vec<i64>, columns: Vec<Vec<f64>>) -> Self {
        Self {
            timestamps,
            columns,
        }
    }

    /// Appends candles in timestamp order.
    ///
    /// Candles at or before the last stored timestamp are dropped so that
    /// consecutive windows never contribute duplicate samples. Returns the
    /// number of samples appended.
    pub fn append_candles(&mut self, candles: &[Candle]) -> usize {
        let mut sorted: Vec<&Candle> = candles.iter().collect();
        sorted.sort_by_key(|c| c.timestamp);

        let mut appended = 0;
        for candle in sorted {
            if let Some(&last) = self.timestamps.last()
                && candle.timestamp <= last
            {
                continue;
            }
            self.timestamps.push(candle.timestamp);
            for feature in Feature::ALL {
                self.columns[feature.index()].push(feature.extract(candle));
            }
            appended += 1;
        }
        appended
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    pub fn column(&self, feature: Feature) -> &[f64] {
        &self.columns[feature.index()]
    }
}
