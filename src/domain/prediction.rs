use crate::domain::market::TimeRange;
use crate::domain::scaling::ScalingEnvelope;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A miner's answer to a live client request, persisted until graded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub client_id: String,
    /// Market symbol the prediction refers to
    pub stream_type: String,
    pub stream_id: String,
    pub topic_id: u32,
    pub request_uuid: Uuid,
    pub miner_id: String,
    /// Window whose closes the miner predicted
    pub target_window: TimeRange,
    pub envelope: ScalingEnvelope,
    pub predictions: Vec<f64>,
}

impl PredictionRecord {
    /// Ready for grading once the whole target window is in the past.
    pub fn is_ready(&self, now_ms: i64) -> bool {
        self.target_window.end_ms <= now_ms
    }
}

/// A record as held by a [`crate::domain::ports::PredictionStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPrediction {
    pub id: String,
    pub record: PredictionRecord,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scaling::FeatureScale;

    #[test]
    fn test_ready_only_after_window_end() {
        let record = PredictionRecord {
            client_id: "client".to_string(),
            stream_type: "BTCUSDT".to_string(),
            stream_id: "abc".to_string(),
            topic_id: 1,
            request_uuid: Uuid::new_v4(),
            miner_id: "m1".to_string(),
            target_window: TimeRange::new(1_000, 2_000),
            envelope: ScalingEnvelope::new(vec![FeatureScale {
                min: 1.0,
                max: 2.0,
                decimal_places: 1,
            }]),
            predictions: vec![0.5],
        };

        assert!(!record.is_ready(1_999));
        assert!(record.is_ready(2_000));
    }
}
