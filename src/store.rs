//! JSON persistence. Each artifact is one document in the data directory,
//! replaced wholesale on write.
//!
//! Persistence failures never abort a scan: `save_or_log` logs the error and
//! the in-memory result is still returned to the caller.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

// Artifact file names
pub const SCAN_RESULTS: &str = "scan_results.json";
pub const MORNING_GOLIST: &str = "morning_golist.json";
pub const SCAN_HISTORY: &str = "scan_history.json";
pub const BACKTEST_RESULTS: &str = "backtest_results.json";
pub const GAP_HISTORY: &str = "gap_history.json";
pub const MODEL_WEIGHTS: &str = "model_weights.json";
pub const TIME_HEATMAP: &str = "time_heatmap.json";
pub const EARNINGS_HISTORY: &str = "earnings_history.json";
pub const TRADE_LOG: &str = "trade_log.json";

/// File-backed store rooted at the configured data directory.
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Open a store, creating the data directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating data directory {}", dir.display()))?;
        Ok(JsonStore { dir })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Load an artifact; None when the file does not exist or fails to parse.
    /// A corrupt file is logged and treated as absent.
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.path(name);
        let raw = match fs::read_to_string(&path) {
            Ok(r) => r,
            Err(_) => return None,
        };
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(err) => {
                warn!(file = name, error = %err, "failed to parse stored artifact");
                None
            }
        }
    }

    pub fn load_or_default<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        self.load(name).unwrap_or_default()
    }

    /// Replace an artifact wholesale.
    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value).context("serializing artifact")?;
        fs::write(self.path(name), json)
            .with_context(|| format!("writing {}", self.path(name).display()))
    }

    /// Save, logging instead of propagating on failure.
    pub fn save_or_log<T: Serialize>(&self, name: &str, value: &T) {
        if let Err(err) = self.save(name, value) {
            warn!(file = name, error = %err, "failed to persist artifact");
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
