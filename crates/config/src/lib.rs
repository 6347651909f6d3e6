//! # Config - Oracle Node Configuration
//!
//! Two layers of settings:
//!
//! - [`ConsolidationParams`]: the tunables every consolidation run reads
//!   (window size and sample-count bounds).
//! - [`NodeConfig`]: where the node keeps its log, how it syncs, and the
//!   defaults used when a report is transmitted.
//!
//! ## Sources
//!
//! Defaults, then an optional TOML file named by `ORACLE_CONFIG`, then
//! individual environment variables:
//!
//! ```text
//! ORACLE_CONFIG                 TOML file path            (optional)
//! ORACLE_DATA_DIR               data directory            (default: "data")
//! ORACLE_WAL_SYNC               fsync every WAL append    (default: "true")
//! ORACLE_IN_MEMORY              no WAL at all             (default: "false")
//! ORACLE_CHANNEL                default transmit channel  (default: "channel-0")
//! ORACLE_TRANSMIT_TIMEOUT_SECS  packet timeout            (default: 600)
//! ORACLE_MIN_ITEMS              min samples to consolidate (default: 3)
//! ORACLE_MAX_ITEMS              max samples per window     (default: 16)
//! ORACLE_WINDOW_SECS            window width in seconds    (default: 3600)
//! ```
//!
//! An environment value that does not parse is ignored with a warning and
//! the previous layer's value is kept.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_MIN_ITEM_COUNT: u32 = 3;
pub const DEFAULT_MAX_ITEM_COUNT: u32 = 16;
pub const DEFAULT_INTERVAL_WIDTH: u64 = 60 * 60;
pub const DEFAULT_CHANNEL: &str = "channel-0";
pub const DEFAULT_TRANSMIT_TIMEOUT_SECS: u64 = 10 * 60;

/// Parameters read at the start of every consolidation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationParams {
    /// Fewer usable samples than this fails the run.
    pub min_item_count: u32,
    /// Upper bound on samples drawn from the window.
    pub max_item_count: u32,
    /// Window width in seconds, counted back from the newest sample.
    pub interval_width: u64,
}

impl Default for ConsolidationParams {
    fn default() -> Self {
        Self {
            min_item_count: DEFAULT_MIN_ITEM_COUNT,
            max_item_count: DEFAULT_MAX_ITEM_COUNT,
            interval_width: DEFAULT_INTERVAL_WIDTH,
        }
    }
}

/// Read path for consolidation parameters.
pub trait ParamsSource {
    fn params(&self) -> ConsolidationParams;
}

impl ParamsSource for ConsolidationParams {
    fn params(&self) -> ConsolidationParams {
        *self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub data_dir: PathBuf,
    pub wal_sync: bool,
    pub in_memory: bool,
    pub channel: String,
    pub transmit_timeout_secs: u64,
    pub params: ConsolidationParams,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            wal_sync: true,
            in_memory: false,
            channel: DEFAULT_CHANNEL.to_string(),
            transmit_timeout_secs: DEFAULT_TRANSMIT_TIMEOUT_SECS,
            params: ConsolidationParams::default(),
        }
    }
}

impl NodeConfig {
    /// Loads configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::load_from(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which stands in for the
    /// environment.
    pub fn load_from<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = match lookup("ORACLE_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(dir) = lookup("ORACLE_DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Some(channel) = lookup("ORACLE_CHANNEL") {
            cfg.channel = channel;
        }
        override_parsed(&lookup, "ORACLE_WAL_SYNC", &mut cfg.wal_sync);
        override_parsed(&lookup, "ORACLE_IN_MEMORY", &mut cfg.in_memory);
        override_parsed(
            &lookup,
            "ORACLE_TRANSMIT_TIMEOUT_SECS",
            &mut cfg.transmit_timeout_secs,
        );
        override_parsed(&lookup, "ORACLE_MIN_ITEMS", &mut cfg.params.min_item_count);
        override_parsed(&lookup, "ORACLE_MAX_ITEMS", &mut cfg.params.max_item_count);
        override_parsed(&lookup, "ORACLE_WINDOW_SECS", &mut cfg.params.interval_width);

        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Path of the write-ahead log inside `data_dir`.
    #[must_use]
    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("oracle.wal")
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(v) => *slot = v,
            Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable config value"),
        }
    }
}
