//! File-backed persistence for confirmation latency runs.
//!
//! Two JSON documents live in the data directory:
//!
//! - `latest.json`: the percentiles of the most recent run, overwritten on
//!   every run.
//! - `history.json`: an oldest-first array of per-run percentiles, appended to
//!   on every run and truncated to the most recent `history_cap` entries.

mod error;
pub mod summary;

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};

pub use error::{Result, StoreError};
pub use summary::{HistoryWindow, WindowSummary, summarize_window};

/// Maximum number of history entries kept on disk.
pub const DEFAULT_HISTORY_CAP: usize = 1440;

pub const LATEST_FILE: &str = "latest.json";
pub const HISTORY_FILE: &str = "history.json";

/// Whole-millisecond percentiles as they are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundedLatency {
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
}

/// Contents of `latest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestSnapshot {
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    /// Local wall-clock time of the run, ISO-8601.
    pub updated: NaiveDateTime,
}

impl LatestSnapshot {
    pub fn new(latency: RoundedLatency, updated: NaiveDateTime) -> Self {
        Self {
            p50: latency.p50,
            p95: latency.p95,
            p99: latency.p99,
            updated,
        }
    }
}

/// One element of `history.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Local `HH:MM` label of the run.
    pub time: String,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
}

impl HistoryEntry {
    pub fn new(latency: RoundedLatency, at: NaiveDateTime) -> Self {
        Self {
            time: at.format("%H:%M").to_string(),
            p50: latency.p50,
            p95: latency.p95,
            p99: latency.p99,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResultStore {
    data_dir: PathBuf,
    history_cap: usize,
}

impl ResultStore {
    pub fn new(data_dir: impl Into<PathBuf>, history_cap: usize) -> Self {
        Self {
            data_dir: data_dir.into(),
            history_cap,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn history_cap(&self) -> usize {
        self.history_cap
    }

    pub fn latest_path(&self) -> PathBuf {
        self.data_dir.join(LATEST_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(HISTORY_FILE)
    }

    /// Overwrites `latest.json` and appends one entry to `history.json`.
    ///
    /// The history is read before anything is written, so a history that
    /// cannot be loaded leaves `latest.json` untouched. Returns the length of
    /// the history after truncation.
    pub fn record(&self, latency: RoundedLatency, at: NaiveDateTime) -> Result<usize> {
        self.ensure_data_dir()?;
        let history = self.extend_history(HistoryEntry::new(latency, at))?;

        self.write_latest(&LatestSnapshot::new(latency, at))?;
        info!(path = ?self.latest_path(), "updated latest snapshot");

        write_json_atomic(&self.history_path(), &history)?;
        info!(path = ?self.history_path(), entries = history.len(), "updated history");

        Ok(history.len())
    }

    pub fn load_latest(&self) -> Result<Option<LatestSnapshot>> {
        let path = self.latest_path();
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    /// Reads the history, oldest first.
    ///
    /// A missing file is an empty history. A file that does not parse, including
    /// one that is not UTF-8, is copied to a fresh `history.json.backup[.N]` and
    /// treated as empty. Failing to make that copy is an error.
    pub fn load_history(&self) -> Result<Vec<HistoryEntry>> {
        let path = self.history_path();
        if !path.exists() {
            debug!(?path, "no history file, starting empty");
            return Ok(Vec::new());
        }

        let contents = fs::read(&path).map_err(|e| StoreError::io(&path, e))?;
        match serde_json::from_slice::<Vec<HistoryEntry>>(&contents) {
            Ok(history) => Ok(history),
            Err(e) => {
                let backup_path = free_backup_path(&path);
                warn!(
                    error = %e,
                    ?backup_path,
                    "history file corrupted, backing it up and starting empty"
                );
                back_up(&path, &backup_path)?;
                Ok(Vec::new())
            }
        }
    }

    pub fn write_latest(&self, latest: &LatestSnapshot) -> Result<()> {
        write_json_atomic(&self.latest_path(), latest)
    }

    /// Appends `entry` and drops the oldest entries beyond the cap.
    pub fn append_history(&self, entry: HistoryEntry) -> Result<usize> {
        let history = self.extend_history(entry)?;
        write_json_atomic(&self.history_path(), &history)?;
        Ok(history.len())
    }

    fn extend_history(&self, entry: HistoryEntry) -> Result<Vec<HistoryEntry>> {
        let mut history = self.load_history()?;
        history.push(entry);
        truncate_oldest(&mut history, self.history_cap);
        Ok(history)
    }

    fn ensure_data_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir).map_err(|e| StoreError::io(&self.data_dir, e))
    }
}

/// Keeps the last `cap` elements, preserving order.
pub fn truncate_oldest<T>(items: &mut Vec<T>, cap: usize) {
    if items.len() > cap {
        let excess = items.len() - cap;
        items.drain(..excess);
    }
}

fn back_up(path: &Path, backup_path: &Path) -> Result<()> {
    fs::copy(path, backup_path).map_err(|e| StoreError::io(backup_path, e))?;
    Ok(())
}

/// First of `history.json.backup`, `history.json.backup.1`, ... that does not exist yet.
fn free_backup_path(path: &Path) -> PathBuf {
    let first = path.with_extension("json.backup");
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| path.with_extension(format!("json.backup.{n}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_slice(&contents).map_err(|e| StoreError::serialization(path, e))
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }

    let contents =
        serde_json::to_string_pretty(value).map_err(|e| StoreError::serialization(path, e))?;

    let temp_path = path.with_extension("json.tmp");
    {
        let mut temp_file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| StoreError::io(&temp_path, e))?;

        temp_file
            .write_all(contents.as_bytes())
            .map_err(|e| StoreError::io(&temp_path, e))?;

        temp_file
            .sync_all()
            .map_err(|e| StoreError::io(&temp_path, e))?;
    }

    fs::rename(&temp_path, path).map_err(|e| StoreError::io(path, e))?;
    debug!(?path, "wrote file atomically");
    Ok(())
}
