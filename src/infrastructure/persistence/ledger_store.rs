//! CMW ledger persisted as a single JSON blob.
//!
//! Saves go through a temp file and a rename, and the previous blob is kept
//! next to it as `<name>.bak`.

use crate::domain::errors::LedgerError;
use crate::domain::ledger::Ledger;
use crate::domain::ports::LedgerStore;
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info};

pub struct FileLedgerStore {
    file_path: PathBuf,
}

impl FileLedgerStore {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    pub fn backup_path(&self) -> PathBuf {
        self.file_path.with_extension("json.bak")
    }
}

#[async_trait]
impl LedgerStore for FileLedgerStore {
    async fn load(&self) -> Result<Ledger> {
        let content = match fs::read_to_string(&self.file_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("FileLedgerStore: No ledger at {:?}, starting empty", self.file_path);
                return Ok(Ledger::new());
            }
            Err(e) => {
                return Err(LedgerError::Read {
                    reason: format!("{:?}: {}", self.file_path, e),
                }
                .into());
            }
        };

        if content.trim().is_empty() {
            return Ok(Ledger::new());
        }

        let ledger = Ledger::from_json(&content).map_err(|e| LedgerError::Corrupt {
            reason: format!("{:?}: {}", self.file_path, e),
        })?;
        Ok(ledger)
    }

    async fn save(&self, ledger: &Ledger) -> Result<()> {
        let write_err = |reason: String| LedgerError::Write { reason };

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| write_err(format!("create {:?}: {}", parent, e)))?;
        }

        let content = ledger
            .to_json()
            .map_err(|e| write_err(format!("serialize: {}", e)))?;

        if fs::try_exists(&self.file_path).await.unwrap_or(false) {
            fs::copy(&self.file_path, self.backup_path())
                .await
                .map_err(|e| write_err(format!("backup: {}", e)))?;
        }

        let temp_path = self.file_path.with_extension("tmp");
        fs::write(&temp_path, content)
            .await
            .map_err(|e| write_err(format!("write {:?}: {}", temp_path, e)))?;
        fs::rename(&temp_path, &self.file_path)
            .await
            .map_err(|e| write_err(format!("rename {:?}: {}", temp_path, e)))?;

        info!("FileLedgerStore: Saved ledger to {:?}", self.file_path);
        Ok(())
    }
}
