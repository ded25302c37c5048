//! Per-content-directory settings.
//!
//! Settings are read from `.bramble/config.json` inside the content
//! directory, then environment variables override individual values:
//!
//! - `BRAMBLE_WORKERS` - worker threads per pipeline stage
//! - `BRAMBLE_READ_ONLY` - `1`/`true` disables saving pages

use crate::error::{ContentError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::info;

/// Directory (inside the content root) holding Bramble's own files.
pub const SETTINGS_DIR: &str = ".bramble";

/// Settings file name inside [`SETTINGS_DIR`].
pub const SETTINGS_FILE: &str = "config.json";

/// Default bounded wait when popping crawl work, in milliseconds.
pub const DEFAULT_POP_TIMEOUT_MS: u64 = 100;

/// Default period of search progress events, in milliseconds.
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 1000;

/// Default period of the change-watch poll, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Shortest accepted search query, in characters.
pub const DEFAULT_MIN_QUERY_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Worker threads per pipeline stage; 0 means one per CPU.
    pub workers: usize,
    pub pop_timeout_ms: u64,
    pub progress_interval_ms: u64,
    pub poll_interval_ms: u64,
    pub min_query_len: usize,
    /// Reject page saves.
    pub read_only: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workers: 0,
            pop_timeout_ms: DEFAULT_POP_TIMEOUT_MS,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            min_query_len: DEFAULT_MIN_QUERY_LEN,
            read_only: false,
        }
    }
}

impl Settings {
    /// Path of the settings file for a content directory.
    pub fn file_path(content_dir: &Path) -> PathBuf {
        content_dir.join(SETTINGS_DIR).join(SETTINGS_FILE)
    }

    /// Loads settings with priority: environment > settings file > defaults.
    pub fn load(content_dir: &Path) -> Result<Self> {
        let mut settings = Self::load_file(content_dir)?.unwrap_or_default();
        settings.apply_env();
        Ok(settings)
    }

    /// Reads the settings file. Returns `Ok(None)` if there is none.
    fn load_file(content_dir: &Path) -> Result<Option<Self>> {
        let path = Self::file_path(content_dir);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ContentError::io(&path, e)),
        };
        let settings = serde_json::from_str(&text)
            .map_err(|source| ContentError::Config { path: path.clone(), source })?;
        info!("settings loaded from {}", path.display());
        Ok(Some(settings))
    }

    fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("BRAMBLE_WORKERS") {
            if let Ok(workers) = val.parse() {
                self.workers = workers;
            }
        }
        if let Ok(val) = std::env::var("BRAMBLE_READ_ONLY") {
            self.read_only = matches!(val.as_str(), "1" | "true" | "yes");
        }
    }

    /// Writes the default settings file unless one already exists.
    ///
    /// Returns false if the file was already there.
    pub fn write_default(content_dir: &Path) -> Result<bool> {
        let path = Self::file_path(content_dir);
        if path.exists() {
            return Ok(false);
        }
        let dir = content_dir.join(SETTINGS_DIR);
        fs::create_dir_all(&dir).map_err(|e| ContentError::io(&dir, e))?;
        let text = serde_json::to_string_pretty(&Self::default())
            .map_err(|source| ContentError::Config { path: path.clone(), source })?;
        fs::write(&path, text).map_err(|e| ContentError::io(&path, e))?;
        Ok(true)
    }

    /// Worker threads per stage, resolving 0 to the available parallelism.
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }

    pub fn pop_timeout(&self) -> Duration {
        Duration::from_millis(self.pop_timeout_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
