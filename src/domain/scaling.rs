//! Reversible min-max normalization of [`TimeSeriesBuffer`] columns.
//!
//! `scale` produces a [`ScalingEnvelope`] holding per-feature bounds and the
//! decimal precision of the source samples. The envelope travels with every
//! persisted prediction so that scaled values can be decoded later.

use crate::domain::market::{Feature, TimeSeriesBuffer};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const MAX_DECIMAL_PLACES: u32 = 12;

/// Bounds and precision captured for one feature column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureScale {
    pub min: f64,
    pub max: f64,
    pub decimal_places: u32,
}

impl FeatureScale {
    pub fn encode(&self, value: f64) -> f64 {
        scale_value(value, self.min, self.max)
    }

    /// Inverse of [`FeatureScale::encode`], rounded to the captured precision.
    pub fn decode(&self, scaled: f64) -> f64 {
        let raw = self.min + scaled * (self.max - self.min);
        round_to(raw, self.decimal_places)
    }
}

/// Per-feature decoding metadata, immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingEnvelope {
    features: Vec<FeatureScale>,
}

impl ScalingEnvelope {
    pub fn new(features: Vec<FeatureScale>) -> Self {
        Self { features }
    }

    pub fn feature(&self, feature: Feature) -> Option<&FeatureScale> {
        self.features.get(feature.index())
    }

    pub fn decode(&self, feature: Feature, scaled: &[f64]) -> Option<Vec<f64>> {
        let scale = self.feature(feature)?;
        Some(scaled.iter().map(|s| scale.decode(*s)).collect())
    }
}

/// Scales every column of `buffer` into `[0, 1]`.
pub fn scale(buffer: &TimeSeriesBuffer) -> (ScalingEnvelope, TimeSeriesBuffer) {
    let mut features = Vec::with_capacity(buffer.columns().len());
    let mut scaled_columns = Vec::with_capacity(buffer.columns().len());

    for column in buffer.columns() {
        let (min, max) = bounds(column);
        let decimal_places = column
            .iter()
            .map(|v| decimal_places(*v))
            .max()
            .unwrap_or(0);
        features.push(FeatureScale {
            min,
            max,
            decimal_places,
        });
        scaled_columns.push(scale_single(column, min, max));
    }

    let scaled = TimeSeriesBuffer::from_columns(buffer.timestamps().to_vec(), scaled_columns);
    (ScalingEnvelope::new(features), scaled)
}

/// Applies the min-max transform with externally supplied bounds.
///
/// Values outside `[min, max]` map outside `[0, 1]`; they are not clamped.
pub fn scale_single(values: &[f64], min: f64, max: f64) -> Vec<f64> {
    values.iter().map(|v| scale_value(*v, min, max)).collect()
}

fn scale_value(value: f64, min: f64, max: f64) -> f64 {
    let range = max - min;
    if range == 0.0 || !range.is_finite() {
        return 0.0;
    }
    (value - min) / range
}

fn bounds(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        })
}

/// Fractional digits needed to print `value` without loss (shortest repr).
fn decimal_places(value: f64) -> u32 {
    if !value.is_finite() {
        return 0;
    }
    // f64 carries ~15 significant digits; anything past that is noise
    let integer_digits = (value.abs().max(1.0).log10().floor() as u32) + 1;
    let cap = MAX_DECIMAL_PLACES.min(15u32.saturating_sub(integer_digits));
    Decimal::from_str(&value.to_string())
        .map(|d| d.normalize().scale().min(cap))
        .unwrap_or(0)
}

fn round_to(value: f64, decimal_places: u32) -> f64 {
    Decimal::from_f64(value)
        .and_then(|d| d.round_dp(decimal_places).to_f64())
        .unwrap_or(value)
}
