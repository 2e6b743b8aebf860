//! Trigger policy for partition compaction: decides *when* a rewrite is
//! warranted (data-file size or tombstone ratio crossing a configured
//! threshold) and reports what a completed pass did. The rewrite itself
//! lives on [`crate::partition::Partition::compact`], which owns the
//! locks and files a compaction needs to touch.

use chrono::{DateTime, Utc};
use docdb_core::Error;

use crate::config::CompactionSettings;
use crate::partition::Partition;

/// Outcome of one completed compaction pass.
#[derive(Debug, Clone, Copy)]
pub struct CompactionStats {
    /// Data file size before the rewrite.
    pub bytes_before: u64,
    /// Data file size after the rewrite.
    pub bytes_after: u64,
    /// Number of live versions copied into the new file.
    pub live_versions_rewritten: usize,
    /// When this pass completed.
    pub last_compaction: DateTime<Utc>,
}

/// True when the data file is large enough, or tombstoned densely
/// enough, to warrant a rewrite.
pub fn should_compact(
    data_file_bytes: u64,
    live_count: usize,
    tombstone_count: usize,
    settings: &CompactionSettings,
) -> bool {
    let size_trigger = data_file_bytes >= settings.size_threshold_mb * 1024 * 1024;
    let total = live_count + tombstone_count;
    let ratio_trigger = total > 0 && (tombstone_count as f64 / total as f64) > settings.tombstone_ratio;
    size_trigger || ratio_trigger
}

/// Runs a compaction pass on `partition` if its current size or
/// tombstone ratio crosses `settings`' thresholds; a no-op otherwise.
pub fn maybe_compact(
    partition: &Partition,
    settings: &CompactionSettings,
) -> Result<Option<CompactionStats>, Error> {
    let data_file_bytes = partition.data_file_len()?;
    let (live, tombstoned) = partition.index().total_counts();
    if !should_compact(data_file_bytes, live, tombstoned, settings) {
        return Ok(None);
    }
    partition.compact().map(Some)
}
