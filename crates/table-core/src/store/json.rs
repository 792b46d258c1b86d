//! File-backed match store: one pretty-printed JSON file per match.

use super::atomic::{atomic_read_json, atomic_write_json};
use super::MatchStore;
use crate::config::PathsConfig;
use crate::error::{Result, TableError};
use crate::models::{MatchId, MatchRecord};
use async_trait::async_trait;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Match store keeping `<dir>/<match id>.json`.
#[derive(Debug, Clone)]
pub struct JsonMatchStore {
    dir: PathBuf,
    max_age: Duration,
}

impl JsonMatchStore {
    /// Create a store rooted at `dir`. Records untouched for longer than
    /// `max_age` count as irrelevant.
    pub fn new(dir: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            dir: dir.into(),
            max_age,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, match_id: &MatchId) -> Result<PathBuf> {
        let id = match_id.as_str();
        let safe = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(TableError::InvalidParams {
                field: "match_id".to_string(),
                message: format!("{:?} cannot be used as a record name", id),
            });
        }
        Ok(self
            .dir
            .join(format!("{}.{}", id, PathsConfig::MATCH_RECORD_EXTENSION)))
    }

    fn sweep(dir: &Path, max_age: Duration) -> Result<usize> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(TableError::io_with_path(e, dir)),
        };

        let now = Utc::now();
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PathsConfig::MATCH_RECORD_EXTENSION)
            {
                continue;
            }
            let record: MatchRecord = match atomic_read_json(&path) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Skipping unreadable match record {}: {}", path.display(), e);
                    continue;
                }
            };
            let age = (now - record.updated_at).to_std().unwrap_or(Duration::ZERO);
            if age > max_age {
                fs::remove_file(&path).map_err(|e| TableError::io_with_path(e, &path))?;
                debug!(match_id = %record.id, "Deleted irrelevant match record");
                removed += 1;
            }
        }
        Ok(removed)
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TableError::Other(format!("match store task failed: {}", e)))?
}

#[async_trait]
impl MatchStore for JsonMatchStore {
    async fn load_match(&self, match_id: &MatchId) -> Result<MatchRecord> {
        let path = self.record_path(match_id)?;
        let id = match_id.clone();
        blocking(move || {
            atomic_read_json::<MatchRecord>(&path)?.ok_or(TableError::MatchNotFound {
                match_id: id.to_string(),
            })
        })
        .await
    }

    async fn save_match(&self, record: &MatchRecord) -> Result<()> {
        let path = self.record_path(&record.id)?;
        let mut record = record.clone();
        record.updated_at = Utc::now();
        blocking(move || atomic_write_json(&path, &record)).await
    }

    async fn delete_irrelevant_matches(&self) -> Result<usize> {
        let dir = self.dir.clone();
        let max_age = self.max_age;
        let removed = blocking(move || Self::sweep(&dir, max_age)).await?;
        info!("Deleted {} irrelevant match records", removed);
        Ok(removed)
    }
}
