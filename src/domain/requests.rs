//! Request variants processed by the validator, one workflow each.

use crate::domain::market::TimeRange;
use crate::domain::prediction::StoredPrediction;
use crate::domain::scaling::ScalingEnvelope;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Shape shared by training and client requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestTemplate {
    /// Market symbol, e.g. `BTCUSDT`
    pub stream_type: String,
    pub topic_id: u32,
    pub feature_ids: Vec<u32>,
    pub schema_id: u32,
    /// Number of future closes each miner must predict
    pub prediction_size: usize,
}

/// Historical window sent to miners for training. No ledger effect.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRequest {
    pub template: RequestTemplate,
}

/// Live request on behalf of a client; produces pending predictions.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientRequest {
    /// Defaults to the validator hotkey when absent
    pub client_id: Option<String>,
    pub template: RequestTemplate,
}

/// One miner's persisted prediction inside a [`PredictionRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct MinerPrediction {
    pub miner_id: String,
    pub values: Vec<f64>,
}

/// Pending predictions of one live request whose target window elapsed.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub request_uuid: Uuid,
    pub client_id: String,
    pub stream_type: String,
    pub stream_id: String,
    pub topic_id: u32,
    pub target_window: TimeRange,
    pub envelope: ScalingEnvelope,
    /// Sorted by miner id
    pub predictions: Vec<MinerPrediction>,
    /// Store ids backing this request, acked after grading
    pub record_ids: Vec<String>,
}

impl PredictionRequest {
    /// Groups stored records by request uuid, one request per group.
    ///
    /// Groups are ordered by target window end, then uuid.
    pub fn group(records: Vec<StoredPrediction>) -> Vec<PredictionRequest> {
        let mut groups: BTreeMap<Uuid, Vec<StoredPrediction>> = BTreeMap::new();
        for stored in records {
            groups
                .entry(stored.record.request_uuid)
                .or_default()
                .push(stored);
        }

        let mut requests: Vec<PredictionRequest> = groups
            .into_values()
            .filter_map(PredictionRequest::from_group)
            .collect();
        requests.sort_by(|a, b| {
            a.target_window
                .end_ms
                .cmp(&b.target_window.end_ms)
                .then(a.request_uuid.cmp(&b.request_uuid))
        });
        requests
    }

    fn from_group(mut group: Vec<StoredPrediction>) -> Option<PredictionRequest> {
        group.sort_by(|a, b| a.record.miner_id.cmp(&b.record.miner_id));
        let head = group.first()?.record.clone();

        let record_ids = group.iter().map(|s| s.id.clone()).collect();
        let predictions = group
            .into_iter()
            .map(|s| MinerPrediction {
                miner_id: s.record.miner_id,
                values: s.record.predictions,
            })
            .collect();

        Some(PredictionRequest {
            request_uuid: head.request_uuid,
            client_id: head.client_id,
            stream_type: head.stream_type,
            stream_id: head.stream_id,
            topic_id: head.topic_id,
            target_window: head.target_window,
            envelope: head.envelope,
            predictions,
            record_ids,
        })
    }
}

/// Work item for one scheduler tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Training(TrainingRequest),
    Client(ClientRequest),
    Prediction(PredictionRequest),
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Training(_) => "training",
            Request::Client(_) => "client",
            Request::Prediction(_) => "prediction",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::prediction::PredictionRecord;
    use crate::domain::scaling::FeatureScale;

    fn stored(id: &str, uuid: Uuid, miner: &str, end_ms: i64) -> StoredPrediction {
        StoredPrediction {
            id: id.to_string(),
            record: PredictionRecord {
                client_id: "client".to_string(),
                stream_type: "BTCUSDT".to_string(),
                stream_id: "sid".to_string(),
                topic_id: 1,
                request_uuid: uuid,
                miner_id: miner.to_string(),
                target_window: TimeRange::new(end_ms - 100, end_ms),
                envelope: ScalingEnvelope::new(vec![FeatureScale {
                    min: 0.0,
                    max: 1.0,
                    decimal_places: 0,
                }]),
                predictions: vec![0.1, 0.2],
            },
        }
    }

    #[test]
    fn test_group_by_request_uuid() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let requests = PredictionRequest::group(vec![
            stored("a", second, "m2", 500),
            stored("b", first, "m9", 200),
            stored("c", second, "m1", 500),
        ]);

        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].request_uuid, first);
        assert_eq!(requests[1].record_ids, vec!["c".to_string(), "a".to_string()]);
        assert_eq!(requests[1].predictions[0].miner_id, "m1");
    }

    #[test]
    fn test_group_of_nothing_is_empty() {
        assert!(PredictionRequest::group(Vec::new()).is_empty());
    }
}
