//! Grading of miner predictions and top-K weight derivation.

use crate::domain::requests::MinerPrediction;
use anyhow::{Result, anyhow};
use serde::Serialize;
use std::str::FromStr;

pub const DEFAULT_TOP_K: usize = 10;

/// Distance between a prediction and the observed series; smaller is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    Rmse,
    Mae,
}

impl DistanceMetric {
    /// Distance over the matched-length prefix of both sequences.
    ///
    /// Returns `None` when there is no overlap or the result is not finite.
    pub fn distance(&self, predicted: &[f64], observed: &[f64]) -> Option<f64> {
        let n = predicted.len().min(observed.len());
        if n == 0 {
            return None;
        }
        let pairs = predicted.iter().zip(observed).take(n);
        let value = match self {
            DistanceMetric::Rmse => {
                let sum: f64 = pairs.map(|(p, o)| (p - o).powi(2)).sum();
                (sum / n as f64).sqrt()
            }
            DistanceMetric::Mae => {
                let sum: f64 = pairs.map(|(p, o)| (p - o).abs()).sum();
                sum / n as f64
            }
        };
        value.is_finite().then_some(value)
    }
}

impl FromStr for DistanceMetric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "rmse" => Ok(DistanceMetric::Rmse),
            "mae" => Ok(DistanceMetric::Mae),
            _ => Err(anyhow!("Invalid SCORING_METRIC: '{}'. Must be 'rmse' or 'mae'", s)),
        }
    }
}

/// Converts the ranked scaled scores of the winners into weights summing to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightingCurve {
    /// Rank r (0-based) of n winners gets a weight proportional to n - r
    Linear,
    /// Rank r gets a weight proportional to decay^r
    Exponential { decay: f64 },
    /// Weight proportional to the scaled score
    Proportional,
}

impl WeightingCurve {
    /// `ranked_scores` must already be sorted best first.
    pub fn weights(&self, ranked_scores: &[f64]) -> Vec<f64> {
        let n = ranked_scores.len();
        if n == 0 {
            return Vec::new();
        }

        let raw: Vec<f64> = match self {
            WeightingCurve::Linear => (0..n).map(|r| (n - r) as f64).collect(),
            WeightingCurve::Exponential { decay } => {
                let decay = decay.clamp(0.0, 1.0);
                (0..n).map(|r| decay.powi(r as i32)).collect()
            }
            WeightingCurve::Proportional => ranked_scores.iter().map(|s| s.max(0.0)).collect(),
        };

        let total: f64 = raw.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return vec![1.0 / n as f64; n];
        }
        raw.iter().map(|w| w / total).collect()
    }

    pub fn parse(name: &str, decay: f64) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "linear" => Ok(WeightingCurve::Linear),
            "exponential" => Ok(WeightingCurve::Exponential { decay }),
            "proportional" => Ok(WeightingCurve::Proportional),
            _ => Err(anyhow!(
                "Invalid WEIGHTING_CURVE: '{}'. Must be 'linear', 'exponential' or 'proportional'",
                name
            )),
        }
    }
}

/// Per-miner result of one grading cycle. Never persisted as such.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredMiner {
    pub miner_id: String,
    pub raw_score: f64,
    pub scaled_score: f64,
    pub weight: f64,
}

/// Graded miners, ranked best first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreCard {
    pub ranked: Vec<ScoredMiner>,
}

impl ScoreCard {
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// `(miner_id, weight)` for every miner with a nonzero weight, best first.
    pub fn winners(&self) -> Vec<(String, f64)> {
        self.ranked
            .iter()
            .filter(|m| m.weight > 0.0)
            .map(|m| (m.miner_id.clone(), m.weight))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    pub metric: DistanceMetric,
    pub curve: WeightingCurve,
    pub top_k: usize,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::Rmse,
            curve: WeightingCurve::Linear,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl ScoringEngine {
    pub fn new(metric: DistanceMetric, curve: WeightingCurve, top_k: usize) -> Self {
        Self {
            metric,
            curve,
            top_k,
        }
    }

    /// Grades every prediction against `observed` and weights the top K.
    ///
    /// Ties keep the input order, so callers pass predictions in a
    /// deterministic order (miner id).
    pub fn score(&self, predictions: &[MinerPrediction], observed: &[f64]) -> ScoreCard {
        let graded: Vec<(&str, f64)> = predictions
            .iter()
            .filter_map(|p| {
                self.metric
                    .distance(&p.values, observed)
                    .map(|d| (p.miner_id.as_str(), d))
            })
            .collect();

        if graded.is_empty() {
            return ScoreCard::default();
        }

        let (min_d, max_d) = graded
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, d)| {
                (lo.min(*d), hi.max(*d))
            });
        let spread = max_d - min_d;

        let mut ranked: Vec<ScoredMiner> = graded
            .into_iter()
            .map(|(miner_id, raw)| ScoredMiner {
                miner_id: miner_id.to_string(),
                raw_score: raw,
                scaled_score: if spread > 0.0 {
                    (max_d - raw) / spread
                } else {
                    1.0
                },
                weight: 0.0,
            })
            .collect();

        // stable sort: equal scores keep input order
        ranked.sort_by(|a, b| {
            b.scaled_score
                .partial_cmp(&a.scaled_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let winners = ranked.len().min(self.top_k);
        let winning_scores: Vec<f64> = ranked[..winners].iter().map(|m| m.scaled_score).collect();
        for (miner, weight) in ranked.iter_mut().zip(self.curve.weights(&winning_scores)) {
            miner.weight = weight;
        }

        ScoreCard { ranked }
    }
}
