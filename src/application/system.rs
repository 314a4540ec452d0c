use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::application::validator::{TickSummary, Validator, ValidatorPorts};
use crate::config::Config;
use crate::infrastructure::market_data_source;
use crate::infrastructure::miner::HttpMinerTransport;
use crate::infrastructure::observability::{Metrics, MetricsReporter};
use crate::infrastructure::persistence::{
    FileLedgerStore, FilePredictionStore, JournalWeightCommitter, TomlMetagraphSource,
};

pub struct Application {
    pub config: Config,
    pub validator: Arc<Validator>,
    pub metrics: Metrics,
}

impl Application {
    /// Wires the production collaborators from `config`.
    pub async fn build(config: Config) -> Result<Self> {
        info!(
            "Building validator (netuid {}, hotkey {}, provider {:?})...",
            config.validator.netuid, config.validator.hotkey, config.market_data.provider
        );

        let data_dir = &config.validator.data_dir;
        tokio::fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("Failed to create data dir {:?}", data_dir))?;
        info!("Data directory: {:?}", data_dir);

        let ports = ValidatorPorts {
            market_data: market_data_source(&config.market_data),
            transport: Arc::new(HttpMinerTransport::new(
                config.validator.miner_timeout,
                config.validator.hotkey.clone(),
            )),
            metagraph: Arc::new(TomlMetagraphSource::new(
                config.validator.metagraph_path.clone(),
                config.validator.netuid,
            )),
            predictions: Arc::new(FilePredictionStore::new(config.validator.predictions_dir())),
            ledger: Arc::new(FileLedgerStore::new(config.validator.ledger_path())),
            weights: Arc::new(JournalWeightCommitter::new(
                config.validator.weights_journal_path(),
            )),
        };

        let app = Self::with_ports(config, ports)?;
        app.validator
            .ensure_registered()
            .await
            .context("Refusing to start")?;
        Ok(app)
    }

    /// Builds around caller-supplied collaborators.
    pub fn with_ports(config: Config, ports: ValidatorPorts) -> Result<Self> {
        let metrics = Metrics::new().context("Failed to create metrics registry")?;
        let validator = Arc::new(Validator::new(&config, ports, metrics.clone()));
        Ok(Self {
            config,
            validator,
            metrics,
        })
    }

    pub async fn run_once(&self) -> Result<TickSummary> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.validator.run_tick(now_ms).await
    }

    /// Ticks until Ctrl-C.
    pub async fn run(&self) -> Result<()> {
        let tick_interval = self.config.validator.tick_interval;
        anyhow::ensure!(!tick_interval.is_zero(), "Tick interval must be positive");

        if self.config.observability.enabled {
            let reporter =
                MetricsReporter::new(self.metrics.clone(), self.config.observability.interval_secs);
            tokio::spawn(async move { reporter.run().await });
        }

        let mut interval = time::interval(tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Validator running, ticking every {:?}", tick_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_once().await {
                        Ok(summary) if summary.failed > 0 => warn!(
                            "Tick: {} of {} request(s) failed",
                            summary.failed, summary.planned
                        ),
                        Ok(_) => {}
                        Err(e) => error!("Tick failed: {:#}", e),
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested, stopping validator");
                    break;
                }
            }
        }
        Ok(())
    }
}
