//! File-backed prediction queue.
//!
//! One JSON file per [`PredictionRecord`] under the predictions directory,
//! named `<uuid>.json`. Files are written atomically (temp file + rename) so
//! a listing never observes a half-written record. Temp files orphaned by a
//! crash between write and rename are swept by `list` once they are stale.

use crate::domain::ports::PredictionStore;
use crate::domain::prediction::{PredictionRecord, StoredPrediction};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// Age after which an unrenamed temp file is treated as orphaned
const STALE_TEMP_AGE: Duration = Duration::from_secs(60);

pub struct FilePredictionStore {
    dir: PathBuf,
}

impl FilePredictionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    async fn sweep_if_stale(path: &Path) {
        let age = match fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified.elapsed().unwrap_or_default(),
            Err(_) => return,
        };
        if age < STALE_TEMP_AGE {
            return;
        }
        match fs::remove_file(path).await {
            Ok(()) => warn!("FilePredictionStore: Removed orphaned temp file {:?}", path),
            Err(e) => warn!("FilePredictionStore: Failed to remove {:?}: {}", path, e),
        }
    }
}

#[async_trait]
impl PredictionStore for FilePredictionStore {
    async fn list(&self) -> Result<Vec<StoredPrediction>> {
        if !fs::try_exists(&self.dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to read predictions dir {:?}", self.dir))?;

        let mut stored = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            match path.extension().and_then(|e| e.to_str()) {
                Some("json") => {}
                Some("tmp") => {
                    Self::sweep_if_stale(&path).await;
                    continue;
                }
                _ => continue,
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };

            let content = match fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("FilePredictionStore: Failed to read {:?}: {}", path, e);
                    continue;
                }
            };
            match serde_json::from_str::<PredictionRecord>(&content) {
                Ok(record) => stored.push(StoredPrediction { id, record }),
                Err(e) => warn!("FilePredictionStore: Skipping corrupt record {:?}: {}", path, e),
            }
        }

        stored.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(stored)
    }

    async fn put(&self, record: &PredictionRecord) -> Result<String> {
        fs::create_dir_all(&self.dir)
            .await
            .context("Failed to create predictions directory")?;

        let id = Uuid::new_v4().to_string();
        let content =
            serde_json::to_string(record).context("Failed to serialize prediction record")?;

        let path = self.path_for(&id);
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, content)
            .await
            .context("Failed to write temp prediction file")?;
        fs::rename(&temp_path, &path)
            .await
            .context("Failed to rename prediction file")?;

        debug!("FilePredictionStore: Stored prediction {} from {}", id, record.miner_id);
        Ok(id)
    }

    async fn ack(&self, ids: &[String]) -> Result<()> {
        for id in ids {
            let path = self.path_for(id);
            match fs::remove_file(&path).await {
                Ok(()) => {}
                // already gone: a previous attempt acked it
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to remove {:?}", path));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::TimeRange;
    use crate::domain::scaling::{FeatureScale, ScalingEnvelope};
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_dir() -> PathBuf {
        let unique_id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "tsvalidator_predictions_{}_{}",
            std::process::id(),
            unique_id
        ))
    }

    fn record(miner: &str) -> PredictionRecord {
        PredictionRecord {
            client_id: "client".to_string(),
            stream_type: "BTCUSDT".to_string(),
            stream_id: "sid".to_string(),
            topic_id: 1,
            request_uuid: Uuid::new_v4(),
            miner_id: miner.to_string(),
            target_window: TimeRange::new(0, 300_000),
            envelope: ScalingEnvelope::new(vec![FeatureScale {
                min: 41_000.5,
                max: 42_000.25,
                decimal_places: 2,
            }]),
            predictions: vec![0.1, 0.7, 1.0 / 3.0],
        }
    }

    #[tokio::test]
    async fn test_missing_dir_lists_nothing() {
        let store = FilePredictionStore::new(temp_dir());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_list_ack() {
        let dir = temp_dir();
        let store = FilePredictionStore::new(&dir);

        let first = record("m1");
        let id1 = store.put(&first).await.unwrap();
        let id2 = store.put(&record("m2")).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        let found = listed.iter().find(|s| s.id == id1).unwrap();
        assert_eq!(found.record, first);

        store.ack(&[id1.clone()]).await.unwrap();
        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id2);

        // acking twice is harmless
        store.ack(&[id1]).await.unwrap();

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_corrupt_files_are_skipped() {
        let dir = temp_dir();
        let store = FilePredictionStore::new(&dir);
        store.put(&record("m1")).await.unwrap();
        std::fs::write(dir.join("garbage.json"), "{not json").unwrap();

        assert_eq!(store.list().await.unwrap().len(), 1);

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_stale_temp_files_are_swept() {
        let dir = temp_dir();
        let store = FilePredictionStore::new(&dir);
        store.put(&record("m1")).await.unwrap();

        let stale = dir.join("orphan.tmp");
        std::fs::write(&stale, "{").unwrap();
        let hour_ago = std::time::SystemTime::now() - Duration::from_secs(3600);
        std::fs::File::options()
            .write(true)
            .open(&stale)
            .unwrap()
            .set_modified(hour_ago)
            .unwrap();
        let fresh = dir.join("in-flight.tmp");
        std::fs::write(&fresh, "{").unwrap();

        assert_eq!(store.list().await.unwrap().len(), 1);
        assert!(!stale.exists());
        assert!(fresh.exists());

        std::fs::remove_dir_all(dir).ok();
    }
}
