//! Typed configuration for the mining engine (§6).
//!
//! Shaped after the teacher's own config crates: a plain `serde`-deserializable
//! struct with defaults, loaded once from TOML and validated/clamped at
//! construction rather than re-checked on every read.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The maximum throttle-timer interval (§4.7): at `throttle == 1.0` the
/// queue handler is still re-armed every `MAX_INTERVAL`, it just never runs
/// sooner than that.
pub const MAX_THROTTLE_INTERVAL: Duration = Duration::from_millis(10);

/// Quiet window (§4.2) the monitor uses to coalesce bursts of raw OS events
/// for the same path into a single logical change.
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 0.0 (fastest) ..= 1.0 (slowest). Clamped on load.
    pub throttle: f64,
    /// Maximum number of concurrent extractions.
    pub process_pool_limit: usize,
    /// Delay before the first crawl starts.
    pub initial_sleep_seconds: u64,
    /// Reduces `process_pool_limit` to 1 and shrinks internal buffers.
    pub low_memory: bool,
    pub monitor_include: Vec<PathBuf>,
    pub monitor_exclude: Vec<PathBuf>,
    pub crawl_roots: Vec<PathBuf>,
    /// Run read-only: the pool still executes extractors, but the controller
    /// never issues a `batch_update` to the store.
    pub disable_indexing: bool,
    /// ISO-639-1 code, passed through to extractors untouched.
    pub language: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            throttle: 0.0,
            process_pool_limit: 1,
            initial_sleep_seconds: 0,
            low_memory: false,
            monitor_include: Vec::new(),
            monitor_exclude: Vec::new(),
            crawl_roots: Vec::new(),
            disable_indexing: false,
            language: "en".to_string(),
        }
    }
}

impl Config {
    /// Parses a config from a TOML document, applying [`Config::normalize`].
    pub fn from_str(s: &str) -> Result<Self> {
        let mut config: Self =
            toml::from_str(s).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.normalize();
        Ok(config)
    }

    /// Reads and parses a config from a TOML file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_str(&contents)
    }

    /// Clamps/derives fields so the rest of the engine can assume invariants
    /// hold (throttle in range, pool limit >= 1) instead of re-validating on
    /// every access.
    pub fn normalize(&mut self) {
        self.throttle = self.throttle.clamp(0.0, 1.0);
        if self.low_memory {
            self.process_pool_limit = 1;
        }
        self.process_pool_limit = self.process_pool_limit.max(1);
    }

    /// The throttle timer interval for the current throttle value (§4.7).
    #[must_use]
    pub fn throttle_interval(&self) -> Duration {
        MAX_THROTTLE_INTERVAL.mul_f64(self.throttle)
    }
}
