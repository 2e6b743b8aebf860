//! Bounds recovery replay: a checkpoint record lets recovery skip every
//! WAL record before it.

/// Decides when a checkpoint should be triggered and tracks how many
/// have been created so the oldest can be superseded once
/// `max_checkpoints` is reached.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    interval_bytes: u64,
    auto_create: bool,
    max_checkpoints: usize,
    checkpoints_created: usize,
    bytes_since_checkpoint: u64,
    last_checkpoint_tx: Option<u64>,
}

impl CheckpointManager {
    /// Builds a manager with the given interval (bytes written to the
    /// WAL between checkpoints), auto-create policy, and retained
    /// checkpoint count.
    pub fn new(interval_bytes: u64, auto_create: bool, max_checkpoints: usize) -> CheckpointManager {
        CheckpointManager {
            interval_bytes,
            auto_create,
            max_checkpoints,
            checkpoints_created: 0,
            bytes_since_checkpoint: 0,
            last_checkpoint_tx: None,
        }
    }

    /// Records that `bytes` more have been written to the WAL since the
    /// last checkpoint.
    pub fn record_bytes_written(&mut self, bytes: u64) {
        self.bytes_since_checkpoint += bytes;
    }

    /// True when auto-create is enabled and the interval has been
    /// exceeded.
    pub fn should_checkpoint(&self) -> bool {
        self.auto_create && self.bytes_since_checkpoint >= self.interval_bytes
    }

    /// Records that a checkpoint for `tx_id` was just written, resetting
    /// the byte counter.
    pub fn record_checkpoint(&mut self, tx_id: u64) {
        self.last_checkpoint_tx = Some(tx_id);
        self.bytes_since_checkpoint = 0;
        self.checkpoints_created += 1;
    }

    /// The transaction id of the most recently recorded checkpoint.
    pub fn last_checkpoint_tx(&self) -> Option<u64> {
        self.last_checkpoint_tx
    }

    /// Total checkpoints created since this manager was constructed.
    pub fn checkpoints_created(&self) -> usize {
        self.checkpoints_created
    }

    /// Configured retention count, consulted by callers pruning older
    /// on-disk checkpoint bookkeeping, if any is kept beyond the WAL
    /// itself.
    pub fn max_checkpoints(&self) -> usize {
        self.max_checkpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triggers_once_interval_is_exceeded() {
        let mut mgr = CheckpointManager::new(1000, true, 8);
        mgr.record_bytes_written(500);
        assert!(!mgr.should_checkpoint());
        mgr.record_bytes_written(600);
        assert!(mgr.should_checkpoint());
    }

    #[test]
    fn recording_a_checkpoint_resets_the_counter() {
        let mut mgr = CheckpointManager::new(1000, true, 8);
        mgr.record_bytes_written(1500);
        assert!(mgr.should_checkpoint());
        mgr.record_checkpoint(42);
        assert!(!mgr.should_checkpoint());
        assert_eq!(mgr.last_checkpoint_tx(), Some(42));
    }

    #[test]
    fn disabled_auto_create_never_triggers() {
        let mut mgr = CheckpointManager::new(10, false, 8);
        mgr.record_bytes_written(10_000);
        assert!(!mgr.should_checkpoint());
    }
}
