//! Decides what the validator does on each tick.
//!
//! Priority order:
//! 1. Predictions whose target window has elapsed, one request per uuid
//! 2. A live client request, when nothing is pending and the cooldown allows
//! 3. A training request, by chance

use crate::domain::prediction::StoredPrediction;
use crate::domain::requests::{
    ClientRequest, PredictionRequest, Request, RequestTemplate, TrainingRequest,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tracing::{debug, info};

/// Source of the training-request coin flip.
pub trait TrainingDice: Send {
    fn roll(&mut self) -> bool;
}

/// Bernoulli dice over a seedable [`StdRng`].
pub struct SeededDice {
    rng: StdRng,
    probability: f64,
}

impl SeededDice {
    pub fn new(probability: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            probability: probability.clamp(0.0, 1.0),
        }
    }
}

impl TrainingDice for SeededDice {
    fn roll(&mut self) -> bool {
        self.rng.random::<f64>() < self.probability
    }
}

pub struct RequestScheduler {
    template: RequestTemplate,
    client_interval: Duration,
    last_client_request_ms: Option<i64>,
    dice: Box<dyn TrainingDice>,
}

impl RequestScheduler {
    pub fn new(
        template: RequestTemplate,
        client_interval: Duration,
        dice: Box<dyn TrainingDice>,
    ) -> Self {
        Self {
            template,
            client_interval,
            last_client_request_ms: None,
            dice,
        }
    }

    fn client_cooldown_elapsed(&self, now_ms: i64) -> bool {
        match self.last_client_request_ms {
            None => true,
            Some(last) => now_ms - last >= self.client_interval.as_millis() as i64,
        }
    }

    /// Plans the batch for one tick. `pending` is the full store listing.
    pub fn plan(&mut self, pending: &[StoredPrediction], now_ms: i64) -> Vec<Request> {
        let ready: Vec<StoredPrediction> = pending
            .iter()
            .filter(|s| s.record.is_ready(now_ms))
            .cloned()
            .collect();

        if !ready.is_empty() {
            let requests: Vec<Request> = PredictionRequest::group(ready)
                .into_iter()
                .map(Request::Prediction)
                .collect();
            info!(
                "Scheduler: {} prediction request(s) ready for grading",
                requests.len()
            );
            return requests;
        }

        if pending.is_empty() && self.client_cooldown_elapsed(now_ms) {
            self.last_client_request_ms = Some(now_ms);
            info!("Scheduler: Emitting client request");
            return vec![Request::Client(ClientRequest {
                client_id: None,
                template: self.template.clone(),
            })];
        }

        if self.dice.roll() {
            info!("Scheduler: Emitting training request");
            return vec![Request::Training(TrainingRequest {
                template: self.template.clone(),
            })];
        }

        debug!("Scheduler: Nothing to do ({} pending)", pending.len());
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::TimeRange;
    use crate::domain::prediction::PredictionRecord;
    use crate::domain::scaling::{FeatureScale, ScalingEnvelope};
    use uuid::Uuid;

    struct FixedDice(bool);

    impl TrainingDice for FixedDice {
        fn roll(&mut self) -> bool {
            self.0
        }
    }

    fn template() -> RequestTemplate {
        RequestTemplate {
            stream_type: "BTCUSDT".to_string(),
            topic_id: 1,
            feature_ids: vec![0, 1, 2, 3, 4],
            schema_id: 1,
            prediction_size: 3,
        }
    }

    fn scheduler(training: bool) -> RequestScheduler {
        RequestScheduler::new(
            template(),
            Duration::from_secs(60),
            Box::new(FixedDice(training)),
        )
    }

    fn stored(id: &str, uuid: Uuid, end_ms: i64) -> StoredPrediction {
        StoredPrediction {
            id: id.to_string(),
            record: PredictionRecord {
                client_id: "c".to_string(),
                stream_type: "BTCUSDT".to_string(),
                stream_id: "s".to_string(),
                topic_id: 1,
                request_uuid: uuid,
                miner_id: format!("miner-{}", id),
                target_window: TimeRange::new(end_ms - 1_000, end_ms),
                envelope: ScalingEnvelope::new(vec![FeatureScale {
                    min: 1.0,
                    max: 2.0,
                    decimal_places: 1,
                }]),
                predictions: vec![0.5; 3],
            },
        }
    }

    #[test]
    fn test_ready_predictions_take_priority() {
        let mut scheduler = scheduler(true);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let pending = vec![
            stored("1", a, 5_000),
            stored("2", a, 5_000),
            stored("3", b, 6_000),
            stored("4", Uuid::new_v4(), 99_000),
        ];

        let batch = scheduler.plan(&pending, 10_000);
        assert_eq!(batch.len(), 2);
        match &batch[0] {
            Request::Prediction(p) => {
                assert_eq!(p.request_uuid, a);
                assert_eq!(p.record_ids, vec!["1".to_string(), "2".to_string()]);
            }
            other => panic!("expected prediction, got {:?}", other.kind()),
        }
        assert!(batch.iter().all(|r| r.kind() == "prediction"));
    }

    #[test]
    fn test_client_request_when_store_empty() {
        let mut scheduler = scheduler(false);
        let batch = scheduler.plan(&[], 0);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].kind(), "client");

        // cooldown: no second client request within the interval
        assert!(scheduler.plan(&[], 30_000).is_empty());
        assert_eq!(scheduler.plan(&[], 60_000)[0].kind(), "client");
    }

    #[test]
    fn test_pending_but_not_ready_falls_back_to_training() {
        let pending = vec![stored("1", Uuid::new_v4(), 99_000)];

        let mut never = scheduler(false);
        assert!(never.plan(&pending, 10_000).is_empty());

        let mut always = scheduler(true);
        let batch = always.plan(&pending, 10_000);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].kind(), "training");
    }

    #[test]
    fn test_seeded_dice_is_reproducible() {
        let mut a = SeededDice::new(0.5, Some(7));
        let mut b = SeededDice::new(0.5, Some(7));
        let rolls_a: Vec<bool> = (0..32).map(|_| a.roll()).collect();
        let rolls_b: Vec<bool> = (0..32).map(|_| b.roll()).collect();
        assert_eq!(rolls_a, rolls_b);

        let mut never = SeededDice::new(0.0, Some(1));
        assert!((0..100).all(|_| !never.roll()));
        let mut always = SeededDice::new(1.0, Some(1));
        assert!((0..100).all(|_| always.roll()));
    }
}
