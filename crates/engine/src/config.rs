//! Database configuration, loaded from a `docdb.toml` file in the
//! database's data directory.
//!
//! On first open, a default file is written if absent. To change
//! settings, edit the file and reopen the database.

use docdb_core::Error;
use docdb_durability::{DurabilityMode, WalConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name placed in the database's data directory.
pub const CONFIG_FILE_NAME: &str = "docdb.toml";

fn default_partition_count() -> usize {
    8
}
fn default_shard_count() -> usize {
    256
}
fn default_queue_capacity() -> usize {
    1024
}
fn default_worker_count() -> usize {
    4
}
fn default_memory_limit_bytes() -> u64 {
    512 * 1024 * 1024
}
fn default_max_segment_size_mb() -> u64 {
    64
}
fn default_checkpoint_interval_mb() -> u64 {
    16
}
fn default_max_checkpoints() -> usize {
    8
}
fn default_keep_segments() -> usize {
    2
}
fn default_compaction_size_threshold_mb() -> u64 {
    128
}
fn default_compaction_tombstone_ratio() -> f64 {
    0.3
}
fn default_healing_interval_secs() -> u64 {
    60
}
fn default_healing_max_batch_size() -> usize {
    64
}
fn default_true() -> bool {
    true
}

/// WAL and checkpoint settings, mirroring spec's `wal.*` configuration
/// keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalSettings {
    /// `wal.fsync_on_commit` — fsync after every commit marker. Default
    /// durability boundary; disabling trades durability for throughput.
    #[serde(default = "default_true")]
    pub fsync_on_commit: bool,
    /// Maximum bytes per WAL segment before rotation.
    #[serde(default = "default_max_segment_size_mb")]
    pub max_segment_size_mb: u64,
    /// `wal.checkpoint.interval_mb` — bytes written between automatic
    /// checkpoints.
    #[serde(default = "default_checkpoint_interval_mb")]
    pub checkpoint_interval_mb: u64,
    /// `wal.checkpoint.auto_create` — whether checkpoints are triggered
    /// automatically.
    #[serde(default = "default_true")]
    pub checkpoint_auto_create: bool,
    /// `wal.checkpoint.max_checkpoints` — retained checkpoint count.
    #[serde(default = "default_max_checkpoints")]
    pub max_checkpoints: usize,
    /// `wal.trim_after_checkpoint` — whether superseded segments are
    /// deleted after a checkpoint.
    #[serde(default = "default_true")]
    pub trim_after_checkpoint: bool,
    /// `wal.keep_segments` — minimum number of most-recent segments
    /// retained regardless of checkpoint position.
    #[serde(default = "default_keep_segments")]
    pub keep_segments: usize,
}

impl Default for WalSettings {
    fn default() -> WalSettings {
        WalSettings {
            fsync_on_commit: true,
            max_segment_size_mb: default_max_segment_size_mb(),
            checkpoint_interval_mb: default_checkpoint_interval_mb(),
            checkpoint_auto_create: true,
            max_checkpoints: default_max_checkpoints(),
            trim_after_checkpoint: true,
            keep_segments: default_keep_segments(),
        }
    }
}

impl WalSettings {
    /// Converts these settings into the durability crate's `WalConfig`.
    pub fn to_wal_config(&self) -> WalConfig {
        WalConfig {
            max_segment_size_bytes: self.max_segment_size_mb * 1024 * 1024,
            durability: if self.fsync_on_commit {
                DurabilityMode::Strict
            } else {
                DurabilityMode::buffered_default()
            },
            checkpoint_interval_bytes: self.checkpoint_interval_mb * 1024 * 1024,
            checkpoint_auto_create: self.checkpoint_auto_create,
            max_checkpoints: self.max_checkpoints,
            trim_after_checkpoint: self.trim_after_checkpoint,
            keep_segments: self.keep_segments,
        }
    }
}

/// `db.compaction_*` settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompactionSettings {
    /// `db.compaction_size_threshold_mb` — data file size that triggers
    /// compaction.
    #[serde(default = "default_compaction_size_threshold_mb")]
    pub size_threshold_mb: u64,
    /// `db.compaction_tombstone_ratio` — tombstone fraction that
    /// triggers compaction.
    #[serde(default = "default_compaction_tombstone_ratio")]
    pub tombstone_ratio: f64,
}

impl Default for CompactionSettings {
    fn default() -> CompactionSettings {
        CompactionSettings {
            size_threshold_mb: default_compaction_size_threshold_mb(),
            tombstone_ratio: default_compaction_tombstone_ratio(),
        }
    }
}

/// `healing.*` settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealingSettings {
    /// `healing.enabled`.
    #[serde(default)]
    pub enabled: bool,
    /// `healing.interval` in seconds, between background scans.
    #[serde(default = "default_healing_interval_secs")]
    pub interval_secs: u64,
    /// `healing.on_read_corruption` — attempt a synchronous heal when a
    /// read surfaces `CorruptRecord`.
    #[serde(default)]
    pub on_read_corruption: bool,
    /// `healing.max_batch_size` — documents healed per background pass.
    #[serde(default = "default_healing_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for HealingSettings {
    fn default() -> HealingSettings {
        HealingSettings {
            enabled: false,
            interval_secs: default_healing_interval_secs(),
            on_read_corruption: false,
            max_batch_size: default_healing_max_batch_size(),
        }
    }
}

/// Database configuration loaded from `docdb.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Number of partitions; `partition_id = doc_id mod partition_count`.
    #[serde(default = "default_partition_count")]
    pub partition_count: usize,
    /// Number of shards per collection index.
    #[serde(default = "default_shard_count")]
    pub shard_count: usize,
    /// Bounded task queue capacity per worker pool.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Fixed worker thread count for the task pool.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Per-database memory cap in bytes.
    #[serde(default = "default_memory_limit_bytes")]
    pub memory_limit_bytes: u64,
    /// WAL and checkpoint settings.
    #[serde(default)]
    pub wal: WalSettings,
    /// Compaction trigger settings.
    #[serde(default)]
    pub compaction: CompactionSettings,
    /// Healing service settings.
    #[serde(default)]
    pub healing: HealingSettings,
}

impl Default for DatabaseConfig {
    fn default() -> DatabaseConfig {
        DatabaseConfig {
            partition_count: default_partition_count(),
            shard_count: default_shard_count(),
            queue_capacity: default_queue_capacity(),
            worker_count: default_worker_count(),
            memory_limit_bytes: default_memory_limit_bytes(),
            wal: WalSettings::default(),
            compaction: CompactionSettings::default(),
            healing: HealingSettings::default(),
        }
    }
}

impl DatabaseConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# docdb database configuration
partition_count = 8
shard_count = 256
queue_capacity = 1024
worker_count = 4
memory_limit_bytes = 536870912

[wal]
fsync_on_commit = true
max_segment_size_mb = 64
checkpoint_interval_mb = 16
checkpoint_auto_create = true
max_checkpoints = 8
trim_after_checkpoint = true
keep_segments = 2

[compaction]
size_threshold_mb = 128
tombstone_ratio = 0.3

[healing]
enabled = false
interval_secs = 60
on_read_corruption = false
max_batch_size = 64
"#
    }

    /// Reads and parses configuration from a file path.
    pub fn from_file(path: &Path) -> Result<DatabaseConfig, Error> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| Error::InvalidJSON {
            reason: format!("invalid config file '{}': {e}", path.display()),
        })
    }

    /// Writes the default config file if one does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<(), Error> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|source| Error::FileWrite {
                path: path.display().to_string(),
                source,
            })?;
        }
        Ok(())
    }
}
