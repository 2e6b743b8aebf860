//! Durability mode for WAL commit markers.
//!
//! Controls when the commit marker is fsynced and the trade-off between
//! latency and the durability window a crash can lose.

/// Durability mode for WAL writes.
///
/// | Mode | Use case |
/// |------|----------|
/// | InMemory | tests, benches; no WAL persistence at all |
/// | Strict | `wal.fsync_on_commit = true`: fsync every commit marker |
/// | Batched | fsync every N commits or every T milliseconds |
/// | Async | background thread fsyncs periodically |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    /// No WAL persistence; all data lost on crash. Never used for a
    /// durable `open()`, only for test/benchmark harnesses.
    InMemory,

    /// fsync the commit marker on every commit. This is the engine's
    /// hardened default (`wal.fsync_on_commit = true`).
    Strict,

    /// fsync every N commits or every T milliseconds, whichever first.
    Batched {
        /// Maximum time between fsyncs, in milliseconds.
        interval_ms: u64,
        /// Maximum commits between fsyncs.
        batch_size: usize,
    },

    /// A background thread fsyncs on a fixed interval regardless of
    /// commit volume.
    Async {
        /// Time between fsyncs, in milliseconds.
        interval_ms: u64,
    },
}

impl DurabilityMode {
    /// False only for `InMemory`: every other mode writes to the WAL.
    pub fn requires_wal(&self) -> bool {
        !matches!(self, DurabilityMode::InMemory)
    }

    /// True only for `Strict`: fsync must happen before `write_commit_marker`
    /// returns.
    pub fn requires_immediate_fsync(&self) -> bool {
        matches!(self, DurabilityMode::Strict)
    }

    /// Human-readable description, used in logs and `Database::stats()`.
    pub fn description(&self) -> &'static str {
        match self {
            DurabilityMode::InMemory => "no WAL persistence (fastest, all data lost on crash)",
            DurabilityMode::Strict => "fsync every commit (hardened, slowest)",
            DurabilityMode::Batched { .. } => "batched fsync (balanced speed/safety)",
            DurabilityMode::Async { .. } => "background fsync (fastest durable mode)",
        }
    }

    /// `Batched { interval_ms: 100, batch_size: 1000 }`, the recommended
    /// non-strict default.
    pub fn buffered_default() -> DurabilityMode {
        DurabilityMode::Batched {
            interval_ms: 100,
            batch_size: 1000,
        }
    }
}

impl Default for DurabilityMode {
    fn default() -> DurabilityMode {
        DurabilityMode::Strict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inmemory_mode_skips_wal_and_fsync() {
        let mode = DurabilityMode::InMemory;
        assert!(!mode.requires_wal());
        assert!(!mode.requires_immediate_fsync());
    }

    #[test]
    fn strict_mode_requires_wal_and_fsync() {
        let mode = DurabilityMode::Strict;
        assert!(mode.requires_wal());
        assert!(mode.requires_immediate_fsync());
    }

    #[test]
    fn batched_and_async_require_wal_but_not_immediate_fsync() {
        let batched = DurabilityMode::Batched {
            interval_ms: 100,
            batch_size: 1000,
        };
        assert!(batched.requires_wal());
        assert!(!batched.requires_immediate_fsync());

        let async_mode = DurabilityMode::Async { interval_ms: 50 };
        assert!(async_mode.requires_wal());
        assert!(!async_mode.requires_immediate_fsync());
    }

    #[test]
    fn default_is_strict_matching_fsync_on_commit_default() {
        assert_eq!(DurabilityMode::default(), DurabilityMode::Strict);
    }

    #[test]
    fn buffered_default_matches_documented_values() {
        match DurabilityMode::buffered_default() {
            DurabilityMode::Batched {
                interval_ms,
                batch_size,
            } => {
                assert_eq!(interval_ms, 100);
                assert_eq!(batch_size, 1000);
            }
            _ => panic!("expected Batched"),
        }
    }
}
