//! Weight commitment journal.
//!
//! Chain submission is out of scope here; every commitment is appended as one
//! JSON line to `weights.jsonl` so an external submitter can tail it.

use crate::domain::ports::WeightCommitter;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightCommitment {
    pub timestamp: i64,
    pub netuid: u16,
    pub validator_hotkey: String,
    pub uids: Vec<u16>,
    pub weights: Vec<f64>,
}

pub struct JournalWeightCommitter {
    path: PathBuf,
}

impl JournalWeightCommitter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl WeightCommitter for JournalWeightCommitter {
    async fn commit(
        &self,
        netuid: u16,
        validator_hotkey: &str,
        weights: &[(u16, f64)],
    ) -> Result<()> {
        let commitment = WeightCommitment {
            timestamp: chrono::Utc::now().timestamp_millis(),
            netuid,
            validator_hotkey: validator_hotkey.to_string(),
            uids: weights.iter().map(|(uid, _)| *uid).collect(),
            weights: weights.iter().map(|(_, w)| *w).collect(),
        };

        let mut line =
            serde_json::to_string(&commitment).context("Failed to serialize weight commitment")?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create journal directory")?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open weight journal {:?}", self.path))?;
        file.write_all(line.as_bytes())
            .await
            .context("Failed to append weight commitment")?;
        file.flush().await?;

        info!(
            "JournalWeightCommitter: Committed {} weights on netuid {}",
            commitment.uids.len(),
            netuid
        );
        Ok(())
    }
}
