//! Network participants: registered neurons and the validator's identity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A registered network participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neuron {
    pub uid: u16,
    pub hotkey: String,
    /// Base URL of the neuron's RPC endpoint
    pub endpoint: String,
}

/// Snapshot of the registered neurons on a subnet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metagraph {
    pub netuid: u16,
    #[serde(default)]
    pub neurons: Vec<Neuron>,
}

impl Metagraph {
    pub fn contains(&self, hotkey: &str) -> bool {
        self.neurons.iter().any(|n| n.hotkey == hotkey)
    }

    pub fn uid_of(&self, hotkey: &str) -> Option<u16> {
        self.neurons
            .iter()
            .find(|n| n.hotkey == hotkey)
            .map(|n| n.uid)
    }

    /// Every neuron except `own_hotkey`, in registration order.
    pub fn targets_excluding(&self, own_hotkey: &str) -> Vec<Neuron> {
        self.neurons
            .iter()
            .filter(|n| n.hotkey != own_hotkey)
            .cloned()
            .collect()
    }
}

/// Stable identity of this validator, used as ledger and commitment key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorIdentity {
    pub hotkey: String,
}

impl ValidatorIdentity {
    pub fn new(hotkey: impl Into<String>) -> Self {
        Self {
            hotkey: hotkey.into(),
        }
    }

    /// Stream id for `stream_type` as seen by this validator.
    ///
    /// First 16 hex chars of SHA-256(stream_type || hotkey); stable across
    /// restarts and processes.
    pub fn stream_id(&self, stream_type: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(stream_type.as_bytes());
        hasher.update(self.hotkey.as_bytes());
        let digest = hex::encode(hasher.finalize());
        digest[..16].to_string()
    }
}
