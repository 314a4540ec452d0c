//! Push-based metrics reporter
//!
//! Periodically outputs metrics as structured JSON to stdout.
//!
//! **Security**: This system only SENDS data, never accepts requests.

use crate::infrastructure::observability::metrics::Metrics;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Metrics snapshot for JSON output
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub ticks: u64,
    pub requests: RequestSnapshot,
    pub responses: ResponseSnapshot,
    pub pending_predictions: u64,
    pub ledger_write_failures: u64,
}

#[derive(Debug, Serialize)]
pub struct RequestSnapshot {
    pub training_ok: u64,
    pub client_ok: u64,
    pub prediction_ok: u64,
    pub failed: u64,
}

#[derive(Debug, Serialize)]
pub struct ResponseSnapshot {
    pub valid: u64,
    pub invalid: u64,
    pub missing: u64,
}

/// Push-based metrics reporter
///
/// Outputs metrics as structured JSON logs on a configurable interval.
/// No HTTP server, no incoming connections - only outbound data.
pub struct MetricsReporter {
    metrics: Metrics,
    start_time: Instant,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(metrics: Metrics, interval_seconds: u64) -> Self {
        Self {
            metrics,
            start_time: Instant::now(),
            interval: Duration::from_secs(interval_seconds),
        }
    }

    /// Run the reporter in a loop, outputting metrics periodically
    pub async fn run(self) {
        info!(
            "MetricsReporter: Starting push-based metrics (interval: {:?})",
            self.interval
        );

        loop {
            tokio::time::sleep(self.interval).await;

            let snapshot = self.collect_snapshot();
            match serde_json::to_string(&snapshot) {
                Ok(json) => {
                    // Prefix so logs can be easily filtered
                    println!("METRICS_JSON:{}", json);
                    info!(
                        "Ticks: {} | Valid responses: {} | Pending predictions: {} | Uptime: {}s",
                        snapshot.ticks,
                        snapshot.responses.valid,
                        snapshot.pending_predictions,
                        snapshot.uptime_seconds
                    );
                }
                Err(e) => warn!("Failed to serialize metrics: {}", e),
            }
        }
    }

    /// Collect current metrics snapshot
    pub fn collect_snapshot(&self) -> MetricsSnapshot {
        let uptime = self.start_time.elapsed().as_secs();
        self.metrics.uptime_seconds.set(uptime as f64);

        let failed: f64 = ["training", "client", "prediction"]
            .iter()
            .map(|kind| self.metrics.requests(kind, "failed"))
            .sum();

        MetricsSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: uptime,
            version: env!("CARGO_PKG_VERSION").to_string(),
            ticks: self.metrics.ticks_total.get() as u64,
            requests: RequestSnapshot {
                training_ok: self.metrics.requests("training", "ok") as u64,
                client_ok: self.metrics.requests("client", "ok") as u64,
                prediction_ok: self.metrics.requests("prediction", "ok") as u64,
                failed: failed as u64,
            },
            responses: ResponseSnapshot {
                valid: self.metrics.responses("valid") as u64,
                invalid: self.metrics.responses("invalid") as u64,
                missing: self.metrics.responses("missing") as u64,
            },
            pending_predictions: self.metrics.pending_predictions.get() as u64,
            ledger_write_failures: self.metrics.ledger_write_failures_total.get() as u64,
        }
    }
}
