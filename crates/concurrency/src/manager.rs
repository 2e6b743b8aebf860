//! The `TransactionManager`: owns the MVCC counter, the commit history,
//! and the registry of open transactions, and serializes commits
//! through a single mutex per spec's description of the commit path
//! ("the MVCC counter and CommitHistory are per-database; mutated only
//! under the commit mutex").
//!
//! This crate has no knowledge of the data file, the WAL, or the index,
//! so `commit()` takes the actual durability/index work as a closure
//! supplied by the caller (`docdb-engine`), invoked while the commit
//! mutex is held. This keeps conflict-check-and-apply atomic with
//! respect to other commits without this crate depending on storage or
//! durability.

use crate::commit_history::{CommitHistory, CommitRecord};
use crate::conflict::conflicts;
use crate::mvcc::Mvcc;
use crate::transaction::{Transaction, TxState};
use docdb_core::{Error, OpType, TxId};
use parking_lot::Mutex;
use std::collections::HashMap;

struct CommitState {
    mvcc: Mvcc,
    history: CommitHistory,
    committed_count: u64,
}

/// Coordinates transaction lifecycles and SSI-lite conflict detection
/// for one database.
pub struct TransactionManager {
    open: Mutex<HashMap<u64, Transaction>>,
    commit_state: Mutex<CommitState>,
}

impl TransactionManager {
    /// A fresh manager with no committed history, counter starting at
    /// zero.
    pub fn new() -> TransactionManager {
        TransactionManager {
            open: Mutex::new(HashMap::new()),
            commit_state: Mutex::new(CommitState {
                mvcc: Mvcc::new(),
                history: CommitHistory::new(),
                committed_count: 0,
            }),
        }
    }

    /// Restores a manager after recovery, with the MVCC counter resumed
    /// from the highest transaction id seen in the WAL.
    pub fn restore(mvcc_counter: u64) -> TransactionManager {
        TransactionManager {
            open: Mutex::new(HashMap::new()),
            commit_state: Mutex::new(CommitState {
                mvcc: Mvcc::with_counter(mvcc_counter),
                history: CommitHistory::new(),
                committed_count: 0,
            }),
        }
    }

    /// Begins a transaction: allocates a fresh id and a snapshot at the
    /// highest transaction id already committed (or being committed
    /// ahead of it — any tx with id `<= snapshot` either committed or
    /// never will).
    pub fn begin(&self) -> TxId {
        let mut state = self.commit_state.lock();
        let snapshot = state.mvcc.current_snapshot();
        let id = state.mvcc.next_tx();
        drop(state);
        self.open.lock().insert(id.0, Transaction::begin(id, snapshot));
        id
    }

    /// The snapshot a given open transaction reads at.
    ///
    /// Panics if `tx_id` is not a currently open transaction: calling
    /// this with an unknown or already-finalized id is a caller bug in
    /// the engine layer, not a user-facing error.
    pub fn snapshot_of(&self, tx_id: TxId) -> TxId {
        self.open
            .lock()
            .get(&tx_id.0)
            .unwrap_or_else(|| panic!("snapshot_of: transaction {} is not open", tx_id.0))
            .snapshot_tx
    }

    /// Records a read of `(collection, doc_id)` into `tx_id`'s read set.
    ///
    /// Panics if `tx_id` is not open (see [`Self::snapshot_of`]).
    pub fn record_read(&self, tx_id: TxId, collection: &str, doc_id: u64) {
        let mut open = self.open.lock();
        let tx = open
            .get_mut(&tx_id.0)
            .unwrap_or_else(|| panic!("record_read: transaction {} is not open", tx_id.0));
        tx.record_read(collection, doc_id);
    }

    /// Queues a WAL record template against `tx_id`.
    ///
    /// Panics if `tx_id` is not open (see [`Self::snapshot_of`]).
    pub fn add_op(&self, tx_id: TxId, collection: &str, op_type: OpType, doc_id: u64, payload: Vec<u8>) {
        let mut open = self.open.lock();
        let tx = open
            .get_mut(&tx_id.0)
            .unwrap_or_else(|| panic!("add_op: transaction {} is not open", tx_id.0));
        tx.add_op(collection, op_type, doc_id, payload);
    }

    /// Abandons a transaction without effect. Operations queued against
    /// it are simply dropped; nothing was ever emitted. Idempotent: a
    /// transaction already finalized (committed, or previously rolled
    /// back) is a no-op.
    pub fn rollback(&self, tx_id: TxId) {
        self.open.lock().remove(&tx_id.0);
    }

    /// Runs the commit protocol for `tx_id`:
    ///
    /// 1. Compute the transaction's write set.
    /// 2. Scan commit history for transactions committed after this
    ///    transaction's snapshot (bounded scan window).
    /// 3. If the read/write sets intersect in either direction, fail
    ///    with [`Error::SerializationFailure`] and leave the transaction
    ///    open (the caller may retry or abandon it).
    /// 4. Otherwise invoke `apply`, which is responsible for emitting
    ///    WAL records, the commit marker, and publishing index entries.
    ///    On success, append this commit to history and finalize the
    ///    transaction.
    ///
    /// `apply` runs while the commit mutex is held, so no concurrently
    /// committing transaction can observe a commit-history window that
    /// omits this one, per the single-commit-mutex invariant.
    ///
    /// Panics if `tx_id` is not open (see [`Self::snapshot_of`]).
    pub fn commit<F>(&self, tx_id: TxId, apply: F) -> Result<u64, Error>
    where
        F: FnOnce(&Transaction) -> Result<(), Error>,
    {
        let tx = self
            .open
            .lock()
            .get(&tx_id.0)
            .cloned()
            .unwrap_or_else(|| panic!("commit: transaction {} is not open", tx_id.0));
        debug_assert!(tx.is_open(), "commit: transaction {} is not Open", tx_id.0);

        let mut commit_state = self.commit_state.lock();
        let write_set = tx.write_set();
        let has_conflict = conflicts(
            &tx.read_set,
            &write_set,
            commit_state.history.scan_since(tx.snapshot_tx.0),
        );
        if has_conflict {
            return Err(Error::SerializationFailure { tx_id: tx_id.0 });
        }

        apply(&tx)?;

        commit_state.history.push(CommitRecord {
            tx_id: tx_id.0,
            read_set: tx.read_set.clone(),
            write_set,
        });
        commit_state.committed_count += 1;
        let committed_count = commit_state.committed_count;
        drop(commit_state);

        if let Some(open_tx) = self.open.lock().get_mut(&tx_id.0) {
            open_tx.state = TxState::Committed;
        }
        self.open.lock().remove(&tx_id.0);
        Ok(committed_count)
    }

    /// Number of transactions currently open (begun but neither
    /// committed nor rolled back).
    pub fn open_count(&self) -> usize {
        self.open.lock().len()
    }

    /// Number of transactions committed so far.
    pub fn committed_count(&self) -> u64 {
        self.commit_state.lock().committed_count
    }
}

impl Default for TransactionManager {
    fn default() -> TransactionManager {
        TransactionManager::new()
    }
}
