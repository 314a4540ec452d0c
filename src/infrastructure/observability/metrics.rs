//! Prometheus metrics definitions for the validator
//!
//! All metrics use the `tsvalidator_` prefix and are read-only.

use prometheus::{
    Counter, CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

pub const SYNAPSE_NAMES: [&str; 4] = [
    "TrainingForward",
    "TrainingBackward",
    "LiveForward",
    "LiveBackward",
];

/// Prometheus metrics for the validator
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Scheduler ticks executed
    pub ticks_total: Counter,
    /// Requests processed by kind and outcome
    pub requests_total: CounterVec,
    /// Miner replies by synapse and status (valid, invalid, missing)
    pub miner_responses_total: CounterVec,
    /// Market-data fetch attempts by outcome
    pub fetch_attempts_total: CounterVec,
    /// Ledger read-modify-write failures
    pub ledger_write_failures_total: Counter,
    /// Weight sets handed to the committer
    pub weight_commits_total: CounterVec,
    /// Prediction records waiting for grading
    pub pending_predictions: Gauge,
    /// Uptime in seconds
    pub uptime_seconds: Gauge,
    /// Fan-out round-trip time
    pub dispatch_latency_seconds: HistogramVec,
}

impl Metrics {
    /// Create a new Metrics instance with all gauges and counters registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let ticks_total = Counter::with_opts(Opts::new(
            "tsvalidator_ticks_total",
            "Scheduler ticks executed",
        ))?;
        registry.register(Box::new(ticks_total.clone()))?;

        let requests_total = CounterVec::new(
            Opts::new(
                "tsvalidator_requests_total",
                "Requests processed by kind and outcome",
            ),
            &["kind", "outcome"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let miner_responses_total = CounterVec::new(
            Opts::new(
                "tsvalidator_miner_responses_total",
                "Miner replies by synapse and status",
            ),
            &["synapse", "status"],
        )?;
        registry.register(Box::new(miner_responses_total.clone()))?;

        let fetch_attempts_total = CounterVec::new(
            Opts::new(
                "tsvalidator_fetch_attempts_total",
                "Market-data fetch attempts by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(fetch_attempts_total.clone()))?;

        let ledger_write_failures_total = Counter::with_opts(Opts::new(
            "tsvalidator_ledger_write_failures_total",
            "Ledger read-modify-write failures",
        ))?;
        registry.register(Box::new(ledger_write_failures_total.clone()))?;

        let weight_commits_total = CounterVec::new(
            Opts::new(
                "tsvalidator_weight_commits_total",
                "Weight sets handed to the committer",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(weight_commits_total.clone()))?;

        let pending_predictions = Gauge::with_opts(Opts::new(
            "tsvalidator_pending_predictions",
            "Prediction records waiting for grading",
        ))?;
        registry.register(Box::new(pending_predictions.clone()))?;

        let uptime_seconds = Gauge::with_opts(Opts::new(
            "tsvalidator_uptime_seconds",
            "Validator uptime in seconds",
        ))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let dispatch_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "tsvalidator_dispatch_latency_seconds",
                "Fan-out round-trip time in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0]),
            &["synapse"],
        )?;
        registry.register(Box::new(dispatch_latency_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            ticks_total,
            requests_total,
            miner_responses_total,
            fetch_attempts_total,
            ledger_write_failures_total,
            weight_commits_total,
            pending_predictions,
            uptime_seconds,
            dispatch_latency_seconds,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn inc_request(&self, kind: &str, outcome: &str) {
        self.requests_total.with_label_values(&[kind, outcome]).inc();
    }

    pub fn add_responses(&self, synapse: &str, status: &str, count: usize) {
        if count > 0 {
            self.miner_responses_total
                .with_label_values(&[synapse, status])
                .inc_by(count as f64);
        }
    }

    pub fn inc_fetch(&self, outcome: &str) {
        self.fetch_attempts_total.with_label_values(&[outcome]).inc();
    }

    pub fn inc_weight_commit(&self, outcome: &str) {
        self.weight_commits_total.with_label_values(&[outcome]).inc();
    }

    pub fn observe_dispatch(&self, synapse: &str, seconds: f64) {
        self.dispatch_latency_seconds
            .with_label_values(&[synapse])
            .observe(seconds);
    }

    /// Total replies with `status` across all synapses
    pub fn responses(&self, status: &str) -> f64 {
        SYNAPSE_NAMES
            .iter()
            .map(|s| {
                self.miner_responses_total
                    .with_label_values(&[*s, status])
                    .get()
            })
            .sum()
    }

    pub fn requests(&self, kind: &str, outcome: &str) -> f64 {
        self.requests_total.with_label_values(&[kind, outcome]).get()
    }
}
