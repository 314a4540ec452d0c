//! Client → Stream → Miner performance ledger (CMW).
//!
//! The ledger is the only durable state shared across ticks. It is always
//! loaded, mutated and written back as a whole; see
//! [`crate::application::ledger_service::LedgerService`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinerEntry {
    pub score_history: Vec<f64>,
    pub win_count: u64,
    pub win_value_total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamEntry {
    pub topic_id: u32,
    #[serde(default)]
    pub miners: BTreeMap<String, MinerEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientEntry {
    #[serde(default)]
    pub streams: BTreeMap<String, StreamEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub clients: BTreeMap<String, ClientEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures the client and stream exist. Returns `true` if anything was created.
    pub fn register_stream(&mut self, client_id: &str, stream_id: &str, topic_id: u32) -> bool {
        let client = self.clients.entry(client_id.to_string()).or_default();
        if client.streams.contains_key(stream_id) {
            return false;
        }
        client.streams.insert(
            stream_id.to_string(),
            StreamEntry {
                topic_id,
                miners: BTreeMap::new(),
            },
        );
        true
    }

    /// Records one graded response.
    ///
    /// The score is always appended; a positive `win_value` also counts as a win.
    pub fn record(
        &mut self,
        client_id: &str,
        stream_id: &str,
        topic_id: u32,
        miner_id: &str,
        scaled_score: f64,
        win_value: f64,
    ) {
        let stream = self
            .clients
            .entry(client_id.to_string())
            .or_default()
            .streams
            .entry(stream_id.to_string())
            .or_insert_with(|| StreamEntry {
                topic_id,
                miners: BTreeMap::new(),
            });

        let miner = stream.miners.entry(miner_id.to_string()).or_default();
        miner.score_history.push(scaled_score);
        if win_value > 0.0 {
            miner.win_count += 1;
            miner.win_value_total += win_value;
        }
    }

    pub fn client(&self, client_id: &str) -> Option<&ClientEntry> {
        self.clients.get(client_id)
    }

    pub fn stream(&self, client_id: &str, stream_id: &str) -> Option<&StreamEntry> {
        self.client(client_id)?.streams.get(stream_id)
    }

    pub fn miner(&self, client_id: &str, stream_id: &str, miner_id: &str) -> Option<&MinerEntry> {
        self.stream(client_id, stream_id)?.miners.get(miner_id)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_creates_entries_lazily() {
        let mut ledger = Ledger::new();
        ledger.record("c1", "s1", 1, "m1", 0.75, 0.0);

        let miner = ledger.miner("c1", "s1", "m1").unwrap();
        assert_eq!(miner.score_history, vec![0.75]);
        assert_eq!(miner.win_count, 0);
        assert_eq!(miner.win_value_total, 0.0);
        assert_eq!(ledger.stream("c1", "s1").unwrap().topic_id, 1);
    }

    #[test]
    fn test_wins_only_counted_for_positive_weight() {
        let mut ledger = Ledger::new();
        ledger.record("c1", "s1", 1, "m1", 1.0, 0.4);
        ledger.record("c1", "s1", 1, "m1", 0.2, 0.0);
        ledger.record("c1", "s1", 1, "m1", 0.9, 0.1);

        let miner = ledger.miner("c1", "s1", "m1").unwrap();
        assert_eq!(miner.score_history, vec![1.0, 0.2, 0.9]);
        assert_eq!(miner.win_count, 2);
        assert!((miner.win_value_total - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_register_stream_is_idempotent() {
        let mut ledger = Ledger::new();
        assert!(ledger.register_stream("c1", "s1", 3));
        ledger.record("c1", "s1", 3, "m1", 0.5, 0.0);
        assert!(!ledger.register_stream("c1", "s1", 3));

        // existing miners survive re-registration
        assert!(ledger.miner("c1", "s1", "m1").is_some());
    }

    #[test]
    fn test_json_roundtrip_is_lossless() {
        let mut ledger = Ledger::new();
        ledger.register_stream("client-a", "empty-stream", 7);
        ledger.record("client-a", "s1", 1, "m1", 0.1 + 0.2, 0.333_333_333_333_333_3);
        ledger.record("client-a", "s1", 1, "m2", 1.0 / 3.0, 0.0);
        ledger.record("client-b", "s9", 2, "m1", 2.0_f64.sqrt() / 10.0, 1e-17);

        let json = ledger.to_json().unwrap();
        let back = Ledger::from_json(&json).unwrap();
        assert_eq!(back, ledger);
    }
}
