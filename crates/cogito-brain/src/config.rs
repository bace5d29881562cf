//! Configuration loading and management for the cogito daemon.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use cogito_types::CycleKind;

/// Top-level daemon configuration (loaded from TOML).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MindConfig {
    /// General daemon settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Cycle timing.
    #[serde(default)]
    pub cycles: CycleConfig,

    /// Starting levels for a freshly initialized cognitive state.
    #[serde(default)]
    pub levels: LevelsConfig,

    /// Change feed settings.
    #[serde(default)]
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Log level filter.
    pub log_level: String,
    /// Grace period for in-flight steps during shutdown (milliseconds).
    pub shutdown_grace_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            shutdown_grace_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the redb database holding the cognitive state.
    pub redb_path: PathBuf,
    /// Path to the SQLite database holding the record collections.
    pub sqlite_path: PathBuf,
    /// Path to the journal directory.
    pub journal_dir: PathBuf,
    /// Maximum journal file size before rotation (bytes).
    pub journal_max_size: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            redb_path: PathBuf::from("data/state.redb"),
            sqlite_path: PathBuf::from("data/records.sqlite"),
            journal_dir: PathBuf::from("data/journal"),
            journal_max_size: 16 * 1024 * 1024, // 16 MiB
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind the HTTP API to.
    pub bind: String,
    /// TCP port for the HTTP API.
    pub port: u16,
    /// Allow cross-origin requests (browser dashboards on another port).
    #[serde(default)]
    pub permissive_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 7420,
            permissive_cors: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Delay between thinking steps (milliseconds).
    pub thinking_interval_ms: u64,
    /// Delay between learning steps (milliseconds).
    pub learning_interval_ms: u64,
    /// Delay between theorizing steps (milliseconds).
    pub theorizing_interval_ms: u64,
    /// Delay between autonomous dispatches (milliseconds).
    pub autonomous_interval_ms: u64,
    /// Topic used when the autonomous dispatcher picks an analysis.
    pub autonomous_topic: String,
    /// Resume the persisted mode's chain at startup.
    pub resume_on_start: bool,
    /// Capacity of the scheduler's ready queue.
    pub queue_capacity: usize,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            thinking_interval_ms: 2_000,
            learning_interval_ms: 3_000,
            theorizing_interval_ms: 5_000,
            autonomous_interval_ms: 4_000,
            autonomous_topic: "Autonomous Intelligence".into(),
            resume_on_start: true,
            queue_capacity: 256,
        }
    }
}

impl CycleConfig {
    /// Delay before the next step of `cycle`; `None` for one-shot cycles.
    pub fn interval(&self, cycle: CycleKind) -> Option<Duration> {
        let ms = match cycle {
            CycleKind::Thinking => self.thinking_interval_ms,
            CycleKind::Learning => self.learning_interval_ms,
            CycleKind::Theorizing => self.theorizing_interval_ms,
            CycleKind::Autonomous => self.autonomous_interval_ms,
            CycleKind::DeepAnalysis => return None,
        };
        Some(Duration::from_millis(ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelsConfig {
    pub learning_rate: f64,
    pub creativity_level: f64,
    pub curiosity_level: f64,
}

impl Default for LevelsConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            creativity_level: 0.7,
            curiosity_level: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Broadcast buffer per subscriber; slow subscribers skip ahead.
    pub capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

impl MindConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| "failed to parse config TOML")?;
        Ok(config)
    }

    /// Load or create default configuration.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}
