use crate::domain::ledger::Ledger;
use crate::domain::ports::LedgerStore;
use crate::infrastructure::observability::Metrics;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::error;

/// Serializes every read-modify-write of the CMW ledger.
///
/// The lock is held from load to save, so two updates can never interleave
/// and lose each other's writes.
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    lock: Mutex<()>,
    metrics: Option<Metrics>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Loads, applies `mutate` and saves, as one unit.
    pub async fn update<T, F>(&self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut Ledger) -> T + Send,
        T: Send,
    {
        let _guard = self.lock.lock().await;

        let outcome: Result<T> = async {
            let mut ledger = self.store.load().await?;
            let value = mutate(&mut ledger);
            self.store.save(&ledger).await?;
            Ok(value)
        }
        .await;

        if let Err(e) = &outcome {
            error!("LedgerService: Ledger update failed: {:#}", e);
            if let Some(metrics) = &self.metrics {
                metrics.ledger_write_failures_total.inc();
            }
        }
        outcome
    }

    pub async fn snapshot(&self) -> Result<Ledger> {
        let _guard = self.lock.lock().await;
        self.store.load().await
    }
}
