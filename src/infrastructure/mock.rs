//! In-process implementations of every port, used by tests.

use crate::domain::errors::{FetchError, TransportError};
use crate::domain::ledger::Ledger;
use crate::domain::market::{Candle, Timeframe};
use crate::domain::network::{Metagraph, Neuron};
use crate::domain::ports::{
    LedgerStore, MarketDataSource, MetagraphSource, MinerTransport, PredictionStore,
    WeightCommitter,
};
use crate::domain::prediction::{PredictionRecord, StoredPrediction};
use crate::domain::synapse::Synapse;
use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

type PriceFn = Arc<dyn Fn(i64) -> f64 + Send + Sync>;

/// Synthetic candle source.
///
/// Produces one candle per timeframe period inside the requested range, with
/// closes given by a price function of the open time. Scripted failures are
/// consumed one per call before any candles are returned.
#[derive(Clone)]
pub struct MockMarketDataSource {
    price: PriceFn,
    failures: Arc<RwLock<VecDeque<FetchError>>>,
    calls: Arc<AtomicUsize>,
    empty: Arc<AtomicBool>,
    newest_first: Arc<AtomicBool>,
}

impl MockMarketDataSource {
    pub fn new() -> Self {
        Self::with_price(|ts| 40_000.0 + ((ts / 60_000) % 97) as f64 * 1.25)
    }

    pub fn with_price(price: impl Fn(i64) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            price: Arc::new(price),
            failures: Arc::new(RwLock::new(VecDeque::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            empty: Arc::new(AtomicBool::new(false)),
            newest_first: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Queues failures returned by the next calls, in order.
    pub async fn push_failures(&self, failures: impl IntoIterator<Item = FetchError>) {
        self.failures.write().await.extend(failures);
    }

    /// Makes every successful call return no candles.
    pub fn set_empty(&self, empty: bool) {
        self.empty.store(empty, Ordering::SeqCst);
    }

    /// Serves the newest `limit` candles of each request, descending, the
    /// way Bybit pages klines.
    pub fn set_newest_first(&self, newest_first: bool) {
        self.newest_first.store(newest_first, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn price_at(&self, timestamp_ms: i64) -> f64 {
        (self.price)(timestamp_ms)
    }
}

impl Default for MockMarketDataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataSource for MockMarketDataSource {
    async fn fetch(
        &self,
        _symbol: &str,
        interval: Timeframe,
        start_ms: i64,
        end_ms: i64,
        limit: usize,
    ) -> std::result::Result<Vec<Candle>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(failure) = self.failures.write().await.pop_front() {
            return Err(failure);
        }
        if self.empty.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }

        let step = interval.to_millis();
        let mut ts = interval.period_start(start_ms);
        if ts < start_ms {
            ts += step;
        }

        let newest_first = self.newest_first.load(Ordering::SeqCst);
        let mut candles = Vec::new();
        while ts <= end_ms && (newest_first || candles.len() < limit) {
            let close = self.price_at(ts);
            candles.push(Candle {
                timestamp: ts,
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 10.0 + (ts / step % 7) as f64,
            });
            ts += step;
        }
        if newest_first {
            candles.reverse();
            candles.truncate(limit);
        }
        Ok(candles)
    }
}

/// Scripted behaviour of one miner behind [`MockMinerTransport`].
#[derive(Debug, Clone)]
pub enum MinerBehaviour {
    /// Answers forward synapses with these exact values
    Reply(Vec<f64>),
    /// Answers with `prediction_size` copies of the value
    Constant(f64),
    /// Answers without a payload
    Silent,
    /// Transport failure
    Unreachable,
}

/// Miner network in memory. Unknown hotkeys are unreachable.
#[derive(Clone, Default)]
pub struct MockMinerTransport {
    behaviours: Arc<RwLock<HashMap<String, MinerBehaviour>>>,
    received: Arc<RwLock<Vec<(String, Synapse)>>>,
}

impl MockMinerTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, hotkey: &str, behaviour: MinerBehaviour) {
        self.behaviours
            .write()
            .await
            .insert(hotkey.to_string(), behaviour);
    }

    /// Every `(hotkey, synapse)` delivered so far, in arrival order.
    pub async fn received(&self) -> Vec<(String, Synapse)> {
        self.received.read().await.clone()
    }

    pub async fn received_by_name(&self, name: &str) -> usize {
        self.received
            .read()
            .await
            .iter()
            .filter(|(_, s)| s.name() == name)
            .count()
    }
}

#[async_trait]
impl MinerTransport for MockMinerTransport {
    async fn query(
        &self,
        target: &Neuron,
        synapse: &Synapse,
    ) -> std::result::Result<Option<Vec<f64>>, TransportError> {
        let behaviour = self.behaviours.read().await.get(&target.hotkey).cloned();
        let unreachable = || TransportError::Unreachable {
            hotkey: target.hotkey.clone(),
            reason: "no such miner".to_string(),
        };

        let Some(behaviour) = behaviour else {
            return Err(unreachable());
        };
        if matches!(behaviour, MinerBehaviour::Unreachable) {
            return Err(unreachable());
        }

        self.received
            .write()
            .await
            .push((target.hotkey.clone(), synapse.clone()));

        let Some(size) = synapse.prediction_size() else {
            return Ok(None);
        };
        Ok(match behaviour {
            MinerBehaviour::Reply(values) => Some(values),
            MinerBehaviour::Constant(value) => Some(vec![value; size]),
            MinerBehaviour::Silent | MinerBehaviour::Unreachable => None,
        })
    }
}

#[derive(Default)]
pub struct InMemoryPredictionStore {
    records: RwLock<BTreeMap<String, PredictionRecord>>,
    next_id: AtomicUsize,
}

impl InMemoryPredictionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl PredictionStore for InMemoryPredictionStore {
    async fn list(&self) -> Result<Vec<StoredPrediction>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .map(|(id, record)| StoredPrediction {
                id: id.clone(),
                record: record.clone(),
            })
            .collect())
    }

    async fn put(&self, record: &PredictionRecord) -> Result<String> {
        let id = format!("rec-{:06}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.records.write().await.insert(id.clone(), record.clone());
        Ok(id)
    }

    async fn ack(&self, ids: &[String]) -> Result<()> {
        let mut records = self.records.write().await;
        for id in ids {
            records.remove(id);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryLedgerStore {
    ledger: RwLock<Option<Ledger>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Last successfully saved ledger.
    pub async fn snapshot(&self) -> Option<Ledger> {
        self.ledger.read().await.clone()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn load(&self) -> Result<Ledger> {
        Ok(self.ledger.read().await.clone().unwrap_or_default())
    }

    async fn save(&self, ledger: &Ledger) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            bail!("ledger storage unavailable");
        }
        *self.ledger.write().await = Some(ledger.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A weight commitment captured by [`RecordingWeightCommitter`].
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedWeights {
    pub netuid: u16,
    pub validator_hotkey: String,
    pub weights: Vec<(u16, f64)>,
}

#[derive(Default)]
pub struct RecordingWeightCommitter {
    commits: RwLock<Vec<CommittedWeights>>,
    fail: AtomicBool,
}

impl RecordingWeightCommitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn commits(&self) -> Vec<CommittedWeights> {
        self.commits.read().await.clone()
    }
}

#[async_trait]
impl WeightCommitter for RecordingWeightCommitter {
    async fn commit(
        &self,
        netuid: u16,
        validator_hotkey: &str,
        weights: &[(u16, f64)],
    ) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("weight submission rejected");
        }
        self.commits.write().await.push(CommittedWeights {
            netuid,
            validator_hotkey: validator_hotkey.to_string(),
            weights: weights.to_vec(),
        });
        Ok(())
    }
}

pub struct StaticMetagraphSource {
    metagraph: RwLock<Metagraph>,
}

impl StaticMetagraphSource {
    pub fn new(metagraph: Metagraph) -> Self {
        Self {
            metagraph: RwLock::new(metagraph),
        }
    }

    pub async fn replace(&self, metagraph: Metagraph) {
        *self.metagraph.write().await = metagraph;
    }
}

#[async_trait]
impl MetagraphSource for StaticMetagraphSource {
    async fn metagraph(&self) -> Result<Metagraph> {
        Ok(self.metagraph.read().await.clone())
    }
}
