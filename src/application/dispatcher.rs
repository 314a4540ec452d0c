//! Broadcast/collect over the miner transport.
//!
//! Queries run concurrently and each one is bounded by the transport's own
//! timeout, so a slow or dead miner only ever shows up as "missing".

use crate::domain::network::Neuron;
use crate::domain::ports::MinerTransport;
use crate::domain::synapse::Synapse;
use crate::infrastructure::observability::Metrics;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// A well-formed forward response.
#[derive(Debug, Clone, PartialEq)]
pub struct MinerResponse {
    pub uid: u16,
    pub hotkey: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchOutcome {
    /// In target order
    pub responses: Vec<MinerResponse>,
    /// Answered with a payload of the wrong shape
    pub invalid: usize,
    /// No answer: transport error, timeout or empty reply
    pub missing: usize,
}

enum Reply {
    Valid(Vec<f64>),
    Invalid,
    Missing,
}

pub struct Dispatcher {
    transport: Arc<dyn MinerTransport>,
    metrics: Option<Metrics>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn MinerTransport>) -> Self {
        Self {
            transport,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sends a forward synapse to every target and keeps the valid replies.
    pub async fn dispatch(&self, synapse: &Synapse, targets: &[Neuron]) -> DispatchOutcome {
        let expected = synapse.prediction_size().unwrap_or(0);
        let started = Instant::now();

        let replies = join_all(targets.iter().map(|target| async move {
            let reply = match self.transport.query(target, synapse).await {
                Ok(Some(values)) => classify(values, expected),
                Ok(None) => Reply::Missing,
                Err(e) => {
                    debug!("Dispatcher: {} gave no answer: {}", target.hotkey, e);
                    Reply::Missing
                }
            };
            (target, reply)
        }))
        .await;

        let mut outcome = DispatchOutcome::default();
        for (target, reply) in replies {
            match reply {
                Reply::Valid(values) => {
                    debug!("Dispatcher: {} sent {} values", target.hotkey, values.len());
                    outcome.responses.push(MinerResponse {
                        uid: target.uid,
                        hotkey: target.hotkey.clone(),
                        values,
                    });
                }
                Reply::Invalid => {
                    debug!("Dispatcher: {} sent a malformed prediction", target.hotkey);
                    outcome.invalid += 1;
                }
                Reply::Missing => outcome.missing += 1,
            }
        }

        info!(
            "Dispatcher: {} to {} miners -> {} valid, {} invalid, {} missing",
            synapse.name(),
            targets.len(),
            outcome.responses.len(),
            outcome.invalid,
            outcome.missing
        );

        if let Some(metrics) = &self.metrics {
            let name = synapse.name();
            metrics.add_responses(name, "valid", outcome.responses.len());
            metrics.add_responses(name, "invalid", outcome.invalid);
            metrics.add_responses(name, "missing", outcome.missing);
            metrics.observe_dispatch(name, started.elapsed().as_secs_f64());
        }
        outcome
    }

    /// Sends a feedback synapse and ignores the replies. Returns the number
    /// of miners that acknowledged delivery.
    pub async fn broadcast(&self, synapse: &Synapse, targets: &[Neuron]) -> usize {
        let started = Instant::now();
        let results = join_all(
            targets
                .iter()
                .map(|target| self.transport.query(target, synapse)),
        )
        .await;

        let delivered = results.iter().filter(|r| r.is_ok()).count();
        info!(
            "Dispatcher: {} delivered to {}/{} miners",
            synapse.name(),
            delivered,
            targets.len()
        );

        if let Some(metrics) = &self.metrics {
            let name = synapse.name();
            metrics.add_responses(name, "delivered", delivered);
            metrics.add_responses(name, "missing", targets.len() - delivered);
            metrics.observe_dispatch(name, started.elapsed().as_secs_f64());
        }
        delivered
    }
}

fn classify(values: Vec<f64>, expected: usize) -> Reply {
    if values.is_empty() {
        Reply::Missing
    } else if values.len() != expected || values.iter().any(|v| !v.is_finite()) {
        Reply::Invalid
    } else {
        Reply::Valid(values)
    }
}
