//! JSON-over-HTTP miner transport
//!
//! Each synapse is POSTed to `<endpoint>/<SynapseName>`. Forward synapses
//! expect `{"predictions": [...]}` back; backward synapses accept any 2xx.
//! The client timeout bounds every query, there are no per-miner retries.

use crate::domain::errors::TransportError;
use crate::domain::network::Neuron;
use crate::domain::ports::MinerTransport;
use crate::domain::synapse::Synapse;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct MinerReply {
    #[serde(default)]
    predictions: Option<Vec<f64>>,
}

pub struct HttpMinerTransport {
    client: Client,
    timeout: Duration,
    validator_hotkey: String,
}

impl HttpMinerTransport {
    pub fn new(timeout: Duration, validator_hotkey: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(2)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            timeout,
            validator_hotkey: validator_hotkey.into(),
        }
    }

    fn map_error(&self, target: &Neuron, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout {
                hotkey: target.hotkey.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else if err.is_decode() {
            TransportError::Decode {
                hotkey: target.hotkey.clone(),
                reason: err.to_string(),
            }
        } else {
            TransportError::Unreachable {
                hotkey: target.hotkey.clone(),
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl MinerTransport for HttpMinerTransport {
    async fn query(
        &self,
        target: &Neuron,
        synapse: &Synapse,
    ) -> Result<Option<Vec<f64>>, TransportError> {
        let url = format!(
            "{}/{}",
            target.endpoint.trim_end_matches('/'),
            synapse.name()
        );

        let response = self
            .client
            .post(&url)
            .header("X-Validator-Hotkey", &self.validator_hotkey)
            .json(synapse)
            .send()
            .await
            .map_err(|e| self.map_error(target, e))?;

        if !response.status().is_success() {
            return Err(TransportError::Unreachable {
                hotkey: target.hotkey.clone(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        if synapse.prediction_size().is_none() {
            return Ok(None);
        }

        let reply: MinerReply = response.json().await.map_err(|e| self.map_error(target, e))?;
        Ok(reply.predictions)
    }
}
