//! Time-series prediction validator
//!
//! Periodically sends market windows to registered miners, queues their
//! live predictions, grades them once the predicted window has elapsed and
//! commits top-K weights.
//!
//! # Usage
//! ```sh
//! VALIDATOR_HOTKEY=5F... cargo run --bin validator -- --netuid 8 --metagraph ./metagraph.toml
//! ```
//!
//! Flags override the matching environment variables (see `.env`).

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;
use tsvalidator::application::system::Application;
use tsvalidator::config::Config;

#[derive(Parser)]
#[command(author, version, about = "Time-series prediction validator", long_about = None)]
struct Cli {
    /// Subnet id
    #[arg(long)]
    netuid: Option<u16>,

    /// Serve client requests from historical windows only
    #[arg(long)]
    test_only_historical: bool,

    /// Root for predictions, ledger and weight journal
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Metagraph TOML file
    #[arg(long)]
    metagraph: Option<PathBuf>,

    /// Run a single tick and exit
    #[arg(long)]
    once: bool,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(netuid) = self.netuid {
            config.validator.netuid = netuid;
        }
        if self.test_only_historical {
            config.validator.test_only_historical = true;
        }
        if let Some(data_dir) = self.data_dir {
            if self.metagraph.is_none() && std::env::var("METAGRAPH_PATH").is_err() {
                config.validator.metagraph_path = data_dir.join("metagraph.toml");
            }
            config.validator.data_dir = data_dir;
        }
        if let Some(metagraph) = self.metagraph {
            config.validator.metagraph_path = metagraph;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    let cli = Cli::parse();
    let once = cli.once;

    info!("tsvalidator {} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = Config::from_env()?;
    cli.apply(&mut config);
    info!(
        "Configuration loaded: netuid={}, stream={}, timeframe={}, historical_only={}",
        config.validator.netuid,
        config.validator.template.stream_type,
        config.market_data.timeframe,
        config.validator.test_only_historical
    );

    let app = Application::build(config).await?;

    if once {
        let summary = app.run_once().await?;
        info!(
            "Single tick done: {} planned, {} succeeded, {} failed",
            summary.planned, summary.succeeded, summary.failed
        );
        return Ok(());
    }

    app.run().await?;
    info!("Validator stopped.");
    Ok(())
}
