//! Metagraph snapshot read from a TOML file, re-read on every call so an
//! operator (or a sync sidecar) can update registrations without a restart.
//!
//! ```toml
//! netuid = 1
//!
//! [[neurons]]
//! uid = 0
//! hotkey = "5F..."
//! endpoint = "http://10.0.0.5:8091"
//! ```

use crate::domain::network::Metagraph;
use crate::domain::ports::MetagraphSource;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::path::PathBuf;

pub struct TomlMetagraphSource {
    path: PathBuf,
    netuid: u16,
}

impl TomlMetagraphSource {
    pub fn new(path: impl Into<PathBuf>, netuid: u16) -> Self {
        Self {
            path: path.into(),
            netuid,
        }
    }
}

pub fn parse_metagraph(content: &str, netuid: u16) -> Result<Metagraph> {
    let metagraph: Metagraph = toml::from_str(content).context("Failed to parse metagraph TOML")?;
    if metagraph.netuid != netuid {
        bail!(
            "Metagraph file is for netuid {}, validator runs on {}",
            metagraph.netuid,
            netuid
        );
    }
    Ok(metagraph)
}

#[async_trait]
impl MetagraphSource for TomlMetagraphSource {
    async fn metagraph(&self) -> Result<Metagraph> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read metagraph {:?}", self.path))?;
        parse_metagraph(&content, self.netuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
netuid = 3

[[neurons]]
uid = 0
hotkey = "validator"
endpoint = "http://127.0.0.1:8090"

[[neurons]]
uid = 5
hotkey = "miner-a"
endpoint = "http://127.0.0.1:8091"
"#;

    #[test]
    fn test_parse() {
        let metagraph = parse_metagraph(SAMPLE, 3).unwrap();
        assert_eq!(metagraph.neurons.len(), 2);
        assert_eq!(metagraph.uid_of("miner-a"), Some(5));
    }

    #[test]
    fn test_netuid_mismatch() {
        assert!(parse_metagraph(SAMPLE, 4).is_err());
    }

    #[test]
    fn test_no_neurons() {
        let metagraph = parse_metagraph("netuid = 3", 3).unwrap();
        assert!(metagraph.neurons.is_empty());
    }
}
