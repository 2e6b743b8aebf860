//! WAL-level configuration: segment rotation, durability mode, and
//! checkpoint/trim cadence. `docdb-engine`'s `DatabaseConfig` builds one
//! of these per partition from the database-wide TOML configuration.

use crate::durability_mode::DurabilityMode;

/// Configuration consumed by `WalWriter`, `CheckpointManager`, and
/// `WalTrimmer`.
#[derive(Debug, Clone)]
pub struct WalConfig {
    /// Segment rotation threshold, in bytes (`wal.max_file_size_mb`).
    pub max_segment_size_bytes: u64,
    /// Durability mode derived from `wal.fsync_on_commit`.
    pub durability: DurabilityMode,
    /// Bytes written since the last checkpoint before one is triggered
    /// (`wal.checkpoint.interval_mb`).
    pub checkpoint_interval_bytes: u64,
    /// Whether checkpoints are created automatically when the interval
    /// is exceeded (`wal.checkpoint.auto_create`).
    pub checkpoint_auto_create: bool,
    /// Maximum number of checkpoint records retained before the oldest
    /// is superseded (`wal.checkpoint.max_checkpoints`).
    pub max_checkpoints: usize,
    /// Whether segments are deleted after a checkpoint covers them
    /// (`wal.trim_after_checkpoint`).
    pub trim_after_checkpoint: bool,
    /// Number of most-recent segments always kept regardless of
    /// checkpoint position (`wal.trim_after_checkpoint.keep_segments`).
    pub keep_segments: usize,
}

impl Default for WalConfig {
    fn default() -> WalConfig {
        WalConfig {
            max_segment_size_bytes: 64 * 1024 * 1024,
            durability: DurabilityMode::default(),
            checkpoint_interval_bytes: 16 * 1024 * 1024,
            checkpoint_auto_create: true,
            max_checkpoints: 8,
            trim_after_checkpoint: true,
            keep_segments: 2,
        }
    }
}
