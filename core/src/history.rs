//! Crash-safe query/response log persisted as a single JSON document.
//!
//! Every write serializes the full log to a temporary sibling file and renames
//! it over the canonical path, so an interrupted write leaves the previously
//! committed log intact. Reads fall back to the temporary file when the
//! canonical one is missing or unreadable, and to an empty log when both are.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::ErrorKind;
use crate::utils::now_epoch_ms;

pub const HISTORY_FILE_NAME: &str = "history.json";
const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub query: String,
    pub response: String,
    pub timestamp: String,
    #[serde(default)]
    pub favorited: bool,
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to read history file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse history file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to serialize history: {0}")]
    Serialize(serde_json::Error),
    #[error("failed to write history file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

impl HistoryError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::PersistenceError
    }
}

pub struct HistoryStore {
    path: PathBuf,
    temp_path: PathBuf,
    last_id: AtomicU64,
    write_guard: Mutex<()>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let temp_path = temp_sibling(&path);
        Self {
            path,
            temp_path,
            last_id: AtomicU64::new(0),
            write_guard: Mutex::new(()),
        }
    }

    /// Store at `<dir>/history.json`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(HISTORY_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Records a successful exchange at the head of the log. Returns `None`
    /// when the log could not be persisted; the failure is logged.
    pub async fn append(&self, query: &str, response: &str) -> Option<HistoryEntry> {
        let _guard = self.write_guard.lock().await;
        let mut log = self.load().await;
        let entry = HistoryEntry {
            id: self.next_id().to_string(),
            query: query.to_string(),
            response: response.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            favorited: false,
        };
        log.insert(0, entry.clone());

        match self.persist(&log).await {
            Ok(()) => {
                info!(id = entry.id.as_str(), entries = log.len(), "history entry appended");
                Some(entry)
            }
            Err(err) => {
                warn!(kind = %err.kind(), "failed to append history entry: {err}");
                None
            }
        }
    }

    /// Newest-first log; empty when nothing has been recorded or nothing is readable.
    pub async fn read_all(&self) -> Vec<HistoryEntry> {
        self.load().await
    }

    pub async fn favorites(&self) -> Vec<HistoryEntry> {
        self.load()
            .await
            .into_iter()
            .filter(|entry| entry.favorited)
            .collect()
    }

    /// Flips the favorite flag of `id`. Unknown ids are a no-op.
    pub async fn toggle_favorite(&self, id: &str) -> Option<HistoryEntry> {
        let _guard = self.write_guard.lock().await;
        let mut log = self.load().await;
        let entry = log.iter_mut().find(|entry| entry.id == id)?;
        entry.favorited = !entry.favorited;
        let updated = entry.clone();

        match self.persist(&log).await {
            Ok(()) => Some(updated),
            Err(err) => {
                warn!(id, kind = %err.kind(), "failed to persist favorite toggle: {err}");
                None
            }
        }
    }

    fn next_id(&self) -> u64 {
        let now = now_epoch_ms();
        let mut previous = self.last_id.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(previous + 1);
            match self.last_id.compare_exchange(
                previous,
                candidate,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => previous = actual,
            }
        }
    }

    async fn load(&self) -> Vec<HistoryEntry> {
        let primary_err = match read_log(&self.path).await {
            Ok(Some(log)) => {
                self.observe_ids(&log);
                return log;
            }
            Ok(None) => None,
            Err(err) => Some(err),
        };

        match read_log(&self.temp_path).await {
            Ok(Some(log)) => {
                match &primary_err {
                    Some(err) => warn!("recovered history from temporary file after: {err}"),
                    None => warn!("recovered history from temporary file; canonical file missing"),
                }
                self.observe_ids(&log);
                log
            }
            Ok(None) => {
                if let Some(err) = primary_err {
                    warn!(kind = %err.kind(), "history unreadable, starting empty: {err}");
                }
                Vec::new()
            }
            Err(temp_err) => {
                match primary_err {
                    Some(err) => warn!(
                        kind = %err.kind(),
                        "history and its temporary copy are unreadable, starting empty: {err}; {temp_err}"
                    ),
                    None => warn!(
                        kind = %temp_err.kind(),
                        "temporary history copy is unreadable, starting empty: {temp_err}"
                    ),
                }
                Vec::new()
            }
        }
    }

    // Keeps generated ids ahead of anything already on disk.
    fn observe_ids(&self, log: &[HistoryEntry]) {
        if let Some(max_id) = log.iter().filter_map(|entry| entry.id.parse::<u64>().ok()).max() {
            self.last_id.fetch_max(max_id, Ordering::Relaxed);
        }
    }

    async fn persist(&self, log: &[HistoryEntry]) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| HistoryError::Write {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        let serialized = serde_json::to_vec_pretty(log).map_err(HistoryError::Serialize)?;
        let write_err = |source| HistoryError::Write {
            path: self.temp_path.clone(),
            source,
        };

        let mut file = tokio::fs::File::create(&self.temp_path)
            .await
            .map_err(write_err)?;
        file.write_all(&serialized).await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        drop(file);

        tokio::fs::rename(&self.temp_path, &self.path)
            .await
            .map_err(|source| HistoryError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| HISTORY_FILE_NAME.into());
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

async fn read_log(path: &Path) -> Result<Option<Vec<HistoryEntry>>, HistoryError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(HistoryError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_slice::<Vec<HistoryEntry>>(&bytes)
        .map(Some)
        .map_err(|source| HistoryError::Parse {
            path: path.to_path_buf(),
            source,
        })
}
