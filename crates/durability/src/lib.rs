//! Segmented write-ahead log, 2PC coordinator log, checkpointing, WAL
//! trimming, and crash recovery.
//!
//! This crate only understands the WAL's own framing; it has no
//! knowledge of the data file or the in-memory index. `docdb-engine`
//! applies the [`recovery::RecoveryResult`] it produces to reconstruct
//! partition state on open.

#![warn(missing_docs)]

mod checkpoint;
mod config;
mod coordinator_log;
mod durability_mode;
mod format;
mod reader;
pub mod recovery;
mod segment;
mod trimmer;
mod writer;

pub use checkpoint::CheckpointManager;
pub use config::WalConfig;
pub use coordinator_log::CoordinatorLog;
pub use durability_mode::DurabilityMode;
pub use format::{CoordinatorRecord, SegmentHeader, WalRecord, COORDINATOR_RECORD_SIZE};
pub use reader::WalReader;
pub use recovery::{RecoveredTransaction, RecoveryResult};
pub use segment::WalSegment;
pub use trimmer::WalTrimmer;
pub use writer::WalWriter;
