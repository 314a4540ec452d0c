//! The validator proper: one workflow per request kind, driven one tick at a
//! time by [`crate::application::system::Application`].

mod grading;
mod live;
mod training;

use crate::application::assembler::{MarketWindowAssembler, RetryPolicy};
use crate::application::dispatcher::Dispatcher;
use crate::application::ledger_service::LedgerService;
use crate::application::scheduler::{RequestScheduler, SeededDice, TrainingDice};
use crate::application::time_ranges::TimeRangePlanner;
use crate::config::Config;
use crate::domain::errors::MarketDataError;
use crate::domain::market::{TimeRange, TimeSeriesBuffer};
use crate::domain::network::{Neuron, ValidatorIdentity};
use crate::domain::ports::{
    LedgerStore, MarketDataSource, MetagraphSource, MinerTransport, PredictionStore,
    WeightCommitter,
};
use crate::domain::requests::Request;
use crate::domain::scoring::ScoringEngine;
use crate::infrastructure::observability::Metrics;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// External collaborators of the validator.
#[derive(Clone)]
pub struct ValidatorPorts {
    pub market_data: Arc<dyn MarketDataSource>,
    pub transport: Arc<dyn MinerTransport>,
    pub metagraph: Arc<dyn MetagraphSource>,
    pub predictions: Arc<dyn PredictionStore>,
    pub ledger: Arc<dyn LedgerStore>,
    pub weights: Arc<dyn WeightCommitter>,
}

/// Result of one scheduler tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub planned: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct Validator {
    identity: ValidatorIdentity,
    netuid: u16,
    test_only_historical: bool,
    scheduler: Mutex<RequestScheduler>,
    planner: Mutex<TimeRangePlanner>,
    assembler: MarketWindowAssembler,
    dispatcher: Dispatcher,
    scoring: ScoringEngine,
    ledger: LedgerService,
    metagraph: Arc<dyn MetagraphSource>,
    predictions: Arc<dyn PredictionStore>,
    weights: Arc<dyn WeightCommitter>,
    metrics: Metrics,
}

impl Validator {
    pub fn new(config: &Config, ports: ValidatorPorts, metrics: Metrics) -> Self {
        let validator = &config.validator;
        let dice = SeededDice::new(validator.training_probability, validator.rng_seed);
        Self::with_dice(config, ports, metrics, Box::new(dice))
    }

    /// Same as [`Validator::new`] with an explicit training dice.
    pub fn with_dice(
        config: &Config,
        ports: ValidatorPorts,
        metrics: Metrics,
        dice: Box<dyn TrainingDice>,
    ) -> Self {
        let validator = &config.validator;
        let market = &config.market_data;

        let scheduler = RequestScheduler::new(
            validator.template.clone(),
            validator.client_request_interval,
            dice,
        );
        let planner = TimeRangePlanner::new(market, validator.rng_seed);
        let assembler = MarketWindowAssembler::new(
            ports.market_data,
            market.timeframe,
            market.fetch_limit,
            RetryPolicy::new(market.max_retries, market.retry_backoff_unit),
        )
        .with_metrics(metrics.clone());

        Self {
            identity: ValidatorIdentity::new(validator.hotkey.clone()),
            netuid: validator.netuid,
            test_only_historical: validator.test_only_historical,
            scheduler: Mutex::new(scheduler),
            planner: Mutex::new(planner),
            assembler,
            dispatcher: Dispatcher::new(ports.transport).with_metrics(metrics.clone()),
            scoring: config.scoring.engine(),
            ledger: LedgerService::new(ports.ledger).with_metrics(metrics.clone()),
            metagraph: ports.metagraph,
            predictions: ports.predictions,
            weights: ports.weights,
            metrics,
        }
    }

    pub fn identity(&self) -> &ValidatorIdentity {
        &self.identity
    }

    pub fn ledger(&self) -> &LedgerService {
        &self.ledger
    }

    /// Lists the queue, plans a batch and runs it in order.
    ///
    /// A failing request is logged and counted; the rest of the batch still
    /// runs.
    pub async fn run_tick(&self, now_ms: i64) -> Result<TickSummary> {
        self.metrics.ticks_total.inc();

        let pending = self
            .predictions
            .list()
            .await
            .context("Failed to list pending predictions")?;
        self.metrics.pending_predictions.set(pending.len() as f64);

        let batch = self.scheduler.lock().await.plan(&pending, now_ms);
        let mut summary = TickSummary {
            planned: batch.len(),
            ..Default::default()
        };

        for request in batch {
            let kind = request.kind();
            match self.execute(request, now_ms).await {
                Ok(()) => {
                    summary.succeeded += 1;
                    self.metrics.inc_request(kind, "ok");
                }
                Err(e) => {
                    summary.failed += 1;
                    self.metrics.inc_request(kind, "failed");
                    error!("Validator: {} request failed: {:#}", kind, e);
                }
            }
        }
        Ok(summary)
    }

    pub async fn execute(&self, request: Request, now_ms: i64) -> Result<()> {
        match request {
            Request::Training(training) => self.run_training(training, now_ms).await,
            Request::Client(client) => self.run_client(client, now_ms).await,
            Request::Prediction(prediction) => self.run_grading(prediction).await,
        }
    }

    /// Fails unless this validator's hotkey is registered on the subnet.
    pub async fn ensure_registered(&self) -> Result<()> {
        let metagraph = self
            .metagraph
            .metagraph()
            .await
            .context("Failed to load metagraph")?;
        if !metagraph.contains(&self.identity.hotkey) {
            anyhow::bail!(
                "Validator hotkey {} is not registered on netuid {}",
                self.identity.hotkey,
                metagraph.netuid
            );
        }
        info!(
            "Validator: {} registered on netuid {} ({} neuron(s))",
            self.identity.hotkey,
            metagraph.netuid,
            metagraph.neurons.len()
        );
        Ok(())
    }

    /// Registered neurons other than this validator.
    async fn targets(&self) -> Result<Vec<Neuron>> {
        let metagraph = self
            .metagraph
            .metagraph()
            .await
            .context("Failed to load metagraph")?;
        let targets = metagraph.targets_excluding(&self.identity.hotkey);
        info!(
            "Validator: {} target miner(s) on netuid {}",
            targets.len(),
            metagraph.netuid
        );
        Ok(targets)
    }

    /// Assembles `ranges`, failing when nothing came back.
    async fn assemble_non_empty(
        &self,
        symbol: &str,
        ranges: &[TimeRange],
    ) -> std::result::Result<TimeSeriesBuffer, MarketDataError> {
        let buffer = self.assembler.assemble(symbol, ranges).await?;
        if buffer.is_empty() {
            let start_ms = ranges.first().map(|r| r.start_ms).unwrap_or_default();
            let end_ms = ranges.last().map(|r| r.end_ms).unwrap_or_default();
            return Err(MarketDataError::EmptyWindow {
                symbol: symbol.to_string(),
                start_ms,
                end_ms,
            });
        }
        Ok(buffer)
    }

    /// Window right after `end_ms` covering `prediction_size` candles.
    fn target_window(&self, end_ms: i64, prediction_size: usize) -> TimeRange {
        let span = self.assembler.timeframe().span_millis(prediction_size);
        TimeRange::new(end_ms, end_ms + span)
    }
}
