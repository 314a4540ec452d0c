use crate::domain::errors::{FetchError, TransportError};
use crate::domain::ledger::Ledger;
use crate::domain::market::{Candle, Timeframe};
use crate::domain::network::{Metagraph, Neuron};
use crate::domain::prediction::{PredictionRecord, StoredPrediction};
use crate::domain::synapse::Synapse;
use anyhow::Result;
use async_trait::async_trait;

/// External candle provider.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetches candles with open time in `[start_ms, end_ms]` (inclusive).
    async fn fetch(
        &self,
        symbol: &str,
        interval: Timeframe,
        start_ms: i64,
        end_ms: i64,
        limit: usize,
    ) -> std::result::Result<Vec<Candle>, FetchError>;
}

/// RPC transport to a single miner. Owns its own bounded wait.
#[async_trait]
pub trait MinerTransport: Send + Sync {
    /// `Ok(None)` means the miner answered without a payload.
    async fn query(
        &self,
        target: &Neuron,
        synapse: &Synapse,
    ) -> std::result::Result<Option<Vec<f64>>, TransportError>;
}

/// Registered neurons of the subnet.
#[async_trait]
pub trait MetagraphSource: Send + Sync {
    async fn metagraph(&self) -> Result<Metagraph>;
}

/// Submits weights to the incentive layer. Fire-and-forget for callers.
#[async_trait]
pub trait WeightCommitter: Send + Sync {
    async fn commit(&self, netuid: u16, validator_hotkey: &str, weights: &[(u16, f64)])
    -> Result<()>;
}

/// Durable queue of pending predictions.
///
/// Records stay listed until acked, so a crash between grading and ack
/// leads to regrading rather than loss.
#[async_trait]
pub trait PredictionStore: Send + Sync {
    async fn list(&self) -> Result<Vec<StoredPrediction>>;

    /// Persists a record and returns its id.
    async fn put(&self, record: &PredictionRecord) -> Result<String>;

    /// Deletes graded records.
    async fn ack(&self, ids: &[String]) -> Result<()>;
}

/// Storage for the single ledger blob.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Missing storage yields an empty ledger.
    async fn load(&self) -> Result<Ledger>;

    /// Replaces the stored ledger as one unit.
    async fn save(&self, ledger: &Ledger) -> Result<()>;
}
