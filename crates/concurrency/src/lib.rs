//! MVCC snapshots, transaction handles, the bounded commit history, and
//! SSI-lite conflict detection.
//!
//! This crate has no knowledge of the data file, the WAL, or the
//! sharded index: [`manager::TransactionManager::commit`] takes the
//! actual durability and index work as a closure, so the conflict
//! check and the apply step run atomically under one commit mutex
//! without this crate depending on `docdb-storage` or
//! `docdb-durability`.

#![warn(missing_docs)]

mod commit_history;
mod conflict;
mod manager;
mod mvcc;
mod transaction;

pub use commit_history::{CommitHistory, CommitRecord, DEFAULT_HISTORY_CAPACITY, DEFAULT_SCAN_WINDOW};
pub use conflict::conflicts;
pub use manager::TransactionManager;
pub use mvcc::Mvcc;
pub use transaction::{PendingOp, Transaction, TxState};
