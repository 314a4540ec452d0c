//! End-to-end ticks through the validator with in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;
use tsvalidator::application::scheduler::TrainingDice;
use tsvalidator::application::validator::{Validator, ValidatorPorts};
use tsvalidator::config::Config;
use tsvalidator::domain::errors::FetchError;
use tsvalidator::domain::network::{Metagraph, Neuron};
use tsvalidator::domain::ports::PredictionStore;
use tsvalidator::infrastructure::mock::{
    InMemoryLedgerStore, InMemoryPredictionStore, MinerBehaviour, MockMarketDataSource,
    MockMinerTransport, RecordingWeightCommitter, StaticMetagraphSource,
};
use tsvalidator::infrastructure::observability::Metrics;

const STEP: i64 = 5 * 60 * 1000;
const T: i64 = 1_704_067_200_000; // aligned to the 5m grid
const PREDICTION_SIZE: usize = 5;

struct FixedDice(bool);

impl TrainingDice for FixedDice {
    fn roll(&mut self) -> bool {
        self.0
    }
}

struct Harness {
    validator: Validator,
    market: MockMarketDataSource,
    transport: MockMinerTransport,
    store: Arc<InMemoryPredictionStore>,
    ledger: Arc<InMemoryLedgerStore>,
    weights: Arc<RecordingWeightCommitter>,
    metagraph: Arc<StaticMetagraphSource>,
    metrics: Metrics,
}

fn neuron(uid: u16, hotkey: &str) -> Neuron {
    Neuron {
        uid,
        hotkey: hotkey.to_string(),
        endpoint: format!("mock://{}", hotkey),
    }
}

fn config() -> Config {
    let mut config = Config::default();
    config.validator.netuid = 8;
    config.validator.hotkey = "vali".to_string();
    config.validator.rng_seed = Some(17);
    config.validator.template.prediction_size = PREDICTION_SIZE;
    config.market_data.retry_backoff_unit = Duration::ZERO;
    config
}

/// Inputs alternate between 100 and 200; everything from `T` on closes at
/// 150, which scales to exactly 0.5 against the input bounds.
async fn harness(training: bool) -> Harness {
    let market = MockMarketDataSource::with_price(|ts| {
        if ts >= T {
            150.0
        } else if (ts / STEP) % 2 == 0 {
            100.0
        } else {
            200.0
        }
    });

    let transport = MockMinerTransport::new();
    transport.set("vali", MinerBehaviour::Constant(0.0)).await;
    transport.set("close", MinerBehaviour::Constant(0.5)).await;
    transport.set("far", MinerBehaviour::Constant(0.9)).await;
    transport.set("short", MinerBehaviour::Reply(vec![0.5])).await;
    transport.set("down", MinerBehaviour::Unreachable).await;

    let metagraph = Metagraph {
        netuid: 8,
        neurons: vec![
            neuron(0, "vali"),
            neuron(1, "close"),
            neuron(2, "far"),
            neuron(3, "short"),
            neuron(4, "down"),
        ],
    };

    let store = Arc::new(InMemoryPredictionStore::new());
    let ledger = Arc::new(InMemoryLedgerStore::new());
    let weights = Arc::new(RecordingWeightCommitter::new());
    let metrics = Metrics::new().unwrap();
    let metagraph = Arc::new(StaticMetagraphSource::new(metagraph));

    let ports = ValidatorPorts {
        market_data: Arc::new(market.clone()),
        transport: Arc::new(transport.clone()),
        metagraph: metagraph.clone(),
        predictions: store.clone(),
        ledger: ledger.clone(),
        weights: weights.clone(),
    };
    let validator = Validator::with_dice(
        &config(),
        ports,
        metrics.clone(),
        Box::new(FixedDice(training)),
    );

    Harness {
        validator,
        market,
        transport,
        store,
        ledger,
        weights,
        metagraph,
        metrics,
    }
}

fn target_end() -> i64 {
    T + PREDICTION_SIZE as i64 * STEP
}

#[tokio::test]
async fn test_client_then_grading_updates_ledger_and_weights() {
    let h = harness(false).await;

    // Tick 1: empty store, client request goes out
    let summary = h.validator.run_tick(T).await.unwrap();
    assert_eq!((summary.planned, summary.succeeded), (1, 1));
    assert_eq!(h.store.len().await, 2, "only well-formed replies are queued");
    assert_eq!(h.metrics.responses("valid"), 2.0);
    assert_eq!(h.metrics.responses("invalid"), 1.0);
    assert_eq!(h.metrics.responses("missing"), 1.0);

    let pending = h.store.list().await.unwrap();
    assert!(pending.iter().all(|p| p.record.target_window.start_ms == T));
    assert!(pending.iter().all(|p| p.record.target_window.end_ms == target_end()));
    assert!(pending.iter().all(|p| p.record.client_id == "vali"));
    assert!(pending.iter().all(|p| p.record.miner_id != "vali"));

    // Tick 2: predictions not ready, no training
    let summary = h.validator.run_tick(T + 60_000).await.unwrap();
    assert_eq!(summary.planned, 0);

    // Tick 3: target window elapsed, grade
    let summary = h.validator.run_tick(target_end()).await.unwrap();
    assert_eq!((summary.planned, summary.succeeded), (1, 1));
    assert!(h.store.is_empty().await);

    let stream_id = h.validator.identity().stream_id("BTCUSDT");
    let ledger = h.ledger.snapshot().await.unwrap();
    let close = ledger.miner("vali", &stream_id, "close").unwrap();
    let far = ledger.miner("vali", &stream_id, "far").unwrap();
    assert_eq!(close.score_history, vec![1.0]);
    assert_eq!(far.score_history, vec![0.0]);
    assert_eq!(close.win_count, 1);
    assert!((close.win_value_total - 2.0 / 3.0).abs() < 1e-12);

    let commits = h.weights.commits().await;
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].netuid, 8);
    assert_eq!(commits[0].validator_hotkey, "vali");
    let uids: Vec<u16> = commits[0].weights.iter().map(|(uid, _)| *uid).collect();
    assert_eq!(uids, vec![1, 2]);
    let total: f64 = commits[0].weights.iter().map(|(_, w)| w).sum();
    assert!((total - 1.0).abs() < 1e-12);

    assert_eq!(h.transport.received_by_name("LiveBackward").await, 3);
    assert!(
        h.transport
            .received()
            .await
            .iter()
            .all(|(hotkey, _)| hotkey != "vali")
    );
}

#[tokio::test]
async fn test_failed_ground_truth_keeps_records() {
    let h = harness(false).await;
    h.validator.run_tick(T).await.unwrap();
    assert_eq!(h.store.len().await, 2);

    h.market
        .push_failures((0..6).map(|_| FetchError::transient("HTTP 502")))
        .await;
    let summary = h.validator.run_tick(target_end()).await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(h.store.len().await, 2);
    assert!(h.weights.commits().await.is_empty());
    assert_eq!(h.metrics.requests("prediction", "failed"), 1.0);

    // next tick the source is healthy again
    let summary = h.validator.run_tick(target_end() + STEP).await.unwrap();
    assert_eq!(summary.succeeded, 1);
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn test_empty_ground_truth_keeps_records() {
    let h = harness(false).await;
    h.validator.run_tick(T).await.unwrap();

    h.market.set_empty(true);
    let summary = h.validator.run_tick(target_end()).await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(h.store.len().await, 2);
}

#[tokio::test]
async fn test_ledger_failure_still_commits_and_acks() {
    let h = harness(false).await;
    h.validator.run_tick(T).await.unwrap();

    h.ledger.set_fail_saves(true);
    let summary = h.validator.run_tick(target_end()).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert!(h.store.is_empty().await);
    assert_eq!(h.weights.commits().await.len(), 1);
    assert_eq!(h.metrics.ledger_write_failures_total.get(), 1.0);
}

#[tokio::test]
async fn test_weight_commit_failure_does_not_block_ack() {
    let h = harness(false).await;
    h.validator.run_tick(T).await.unwrap();

    h.weights.set_fail(true);
    let summary = h.validator.run_tick(target_end()).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert!(h.store.is_empty().await);
    assert_eq!(
        h.metrics
            .weight_commits_total
            .with_label_values(&["failed"])
            .get(),
        1.0
    );
}

#[tokio::test]
async fn test_training_leaves_ledger_alone() {
    let h = harness(true).await;

    // the client request comes first and fills the queue
    h.validator.run_tick(T).await.unwrap();
    let registered = h.ledger.saves();

    // queue not empty and nothing ready: the dice sends training
    let summary = h.validator.run_tick(T + 60_000).await.unwrap();
    assert_eq!((summary.planned, summary.succeeded), (1, 1));
    assert_eq!(h.metrics.requests("training", "ok"), 1.0);

    assert_eq!(h.transport.received_by_name("TrainingForward").await, 3);
    assert_eq!(h.transport.received_by_name("TrainingBackward").await, 3);
    assert_eq!(h.ledger.saves(), registered);
    assert_eq!(h.store.len().await, 2);
}

#[tokio::test]
async fn test_unregistered_hotkey_is_refused() {
    let h = harness(false).await;
    assert!(h.validator.ensure_registered().await.is_ok());

    h.metagraph
        .replace(Metagraph {
            netuid: 8,
            neurons: vec![neuron(1, "close"), neuron(2, "far")],
        })
        .await;
    let err = h.validator.ensure_registered().await.unwrap_err();
    assert!(err.to_string().contains("not registered"));
}

#[tokio::test]
async fn test_client_tick_without_valid_replies() {
    let h = harness(false).await;
    h.transport.set("close", MinerBehaviour::Silent).await;
    h.transport.set("far", MinerBehaviour::Unreachable).await;

    let summary = h.validator.run_tick(T).await.unwrap();

    assert_eq!((summary.planned, summary.succeeded, summary.failed), (1, 1, 0));
    assert!(h.store.is_empty().await);
    assert_eq!(h.metrics.responses("valid"), 0.0);
    assert_eq!(
        h.metrics.responses("invalid") + h.metrics.responses("missing"),
        4.0
    );

    let stream_id = h.validator.identity().stream_id("BTCUSDT");
    let ledger = h.ledger.snapshot().await.unwrap();
    let stream = ledger.stream("vali", &stream_id).unwrap();
    assert!(stream.miners.is_empty());
}
