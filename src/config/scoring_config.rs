//! Scoring metric and weighting curve configuration.

use super::parse_env;
use crate::domain::scoring::{DEFAULT_TOP_K, DistanceMetric, ScoringEngine, WeightingCurve};
use anyhow::Result;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct ScoringEnvConfig {
    pub metric: DistanceMetric,
    pub curve: WeightingCurve,
    pub top_k: usize,
}

impl Default for ScoringEnvConfig {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::Rmse,
            curve: WeightingCurve::Linear,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl ScoringEnvConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let metric = match env::var("SCORING_METRIC") {
            Ok(raw) => DistanceMetric::from_str(&raw)?,
            Err(_) => defaults.metric,
        };

        let decay = parse_env("WEIGHTING_DECAY", 0.5f64)?;
        if !(0.0..=1.0).contains(&decay) {
            anyhow::bail!("WEIGHTING_DECAY must be within [0, 1], got {}", decay);
        }
        let curve = match env::var("WEIGHTING_CURVE") {
            Ok(raw) => WeightingCurve::parse(&raw, decay)?,
            Err(_) => defaults.curve,
        };

        let top_k = parse_env("TOP_K", defaults.top_k)?;
        if top_k == 0 {
            anyhow::bail!("TOP_K must be positive");
        }

        Ok(Self {
            metric,
            curve,
            top_k,
        })
    }

    pub fn engine(&self) -> ScoringEngine {
        ScoringEngine::new(self.metric, self.curve, self.top_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_env;

    #[test]
    fn test_curve_with_decay() {
        let _guard = test_env::lock();
        test_env::set("WEIGHTING_CURVE", "exponential");
        test_env::set("WEIGHTING_DECAY", "0.8");

        let config = ScoringEnvConfig::from_env().unwrap();
        assert_eq!(config.curve, WeightingCurve::Exponential { decay: 0.8 });
        assert_eq!(config.engine().top_k, 10);

        test_env::remove("WEIGHTING_CURVE");
        test_env::remove("WEIGHTING_DECAY");
    }
}
