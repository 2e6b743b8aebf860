//! The transaction handle: `{id, snapshot_tx, operations, state,
//! read_set}`. `snapshot_tx` is the MVCC counter observed at `Begin`
//! minus one.

use docdb_core::{OpType, TxId};
use std::collections::HashSet;

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Accepting reads and operations; not yet finalized.
    Open,
    /// Finalized durably; operations have been emitted to the WAL.
    Committed,
    /// Finalized without effect; operations were never emitted.
    RolledBack,
}

/// One WAL record template queued by a transaction, to be emitted at
/// commit with this transaction's id.
#[derive(Debug, Clone)]
pub struct PendingOp {
    /// Target collection.
    pub collection: String,
    /// Operation type.
    pub op_type: OpType,
    /// Target document id.
    pub doc_id: u64,
    /// Payload bytes, copy-owned at the time the op was added.
    pub payload: Vec<u8>,
}

/// A single-transaction handle tracking its read set and queued
/// operations.
#[derive(Debug, Clone)]
pub struct Transaction {
    /// This transaction's id, allocated at `begin()`.
    pub id: TxId,
    /// The snapshot this transaction reads at: the MVCC counter observed
    /// at `begin()` minus one.
    pub snapshot_tx: TxId,
    /// Queued WAL record templates, in the order `add_op` was called.
    pub operations: Vec<PendingOp>,
    /// Every `(collection, doc_id)` pair read through this transaction.
    pub read_set: HashSet<(String, u64)>,
    /// Current lifecycle state.
    pub state: TxState,
}

impl Transaction {
    /// Begins a new transaction with the given id and snapshot.
    pub fn begin(id: TxId, snapshot_tx: TxId) -> Transaction {
        Transaction {
            id,
            snapshot_tx,
            operations: Vec::new(),
            read_set: HashSet::new(),
            state: TxState::Open,
        }
    }

    /// Records a read of `(collection, doc_id)` into the read set.
    pub fn record_read(&mut self, collection: &str, doc_id: u64) {
        self.read_set.insert((collection.to_string(), doc_id));
    }

    /// Appends a queued WAL record template.
    pub fn add_op(&mut self, collection: &str, op_type: OpType, doc_id: u64, payload: Vec<u8>) {
        self.operations.push(PendingOp {
            collection: collection.to_string(),
            op_type,
            doc_id,
            payload,
        });
    }

    /// The set of `(collection, doc_id)` pairs this transaction writes,
    /// deduplicated from `operations`.
    pub fn write_set(&self) -> HashSet<(String, u64)> {
        self.operations
            .iter()
            .map(|op| (op.collection.clone(), op.doc_id))
            .collect()
    }

    /// True while the transaction is still open.
    pub fn is_open(&self) -> bool {
        self.state == TxState::Open
    }
}
