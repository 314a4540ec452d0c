//! Payloads exchanged with miners.
//!
//! Forward synapses carry scaled samples and expect `prediction_size`
//! predicted closes back. Backward synapses carry the scaled outcome so that
//! miners can learn; their replies are ignored.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardPayload {
    pub request_uuid: Uuid,
    pub stream_id: String,
    pub topic_id: u32,
    /// Scaled feature columns, column-major
    pub samples: Vec<Vec<f64>>,
    pub feature_ids: Vec<u32>,
    pub schema_id: u32,
    pub prediction_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackwardPayload {
    pub request_uuid: Uuid,
    pub stream_id: String,
    pub topic_id: u32,
    /// Scaled observed closes for the predicted window
    pub samples: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "synapse", content = "body")]
pub enum Synapse {
    TrainingForward(ForwardPayload),
    TrainingBackward(BackwardPayload),
    LiveForward(ForwardPayload),
    LiveBackward(BackwardPayload),
}

impl Synapse {
    pub fn name(&self) -> &'static str {
        match self {
            Synapse::TrainingForward(_) => "TrainingForward",
            Synapse::TrainingBackward(_) => "TrainingBackward",
            Synapse::LiveForward(_) => "LiveForward",
            Synapse::LiveBackward(_) => "LiveBackward",
        }
    }

    /// Expected response length; `None` for backward synapses.
    pub fn prediction_size(&self) -> Option<usize> {
        match self {
            Synapse::TrainingForward(p) | Synapse::LiveForward(p) => Some(p.prediction_size),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape_is_tagged() {
        let synapse = Synapse::LiveBackward(BackwardPayload {
            request_uuid: Uuid::nil(),
            stream_id: "sid".to_string(),
            topic_id: 1,
            samples: vec![0.25],
        });

        let json = serde_json::to_value(&synapse).unwrap();
        assert_eq!(json["synapse"], "LiveBackward");
        assert_eq!(json["body"]["samples"][0], 0.25);
        assert_eq!(synapse.prediction_size(), None);
    }
}
