//! The document version model: `{doc_id, created_tx, deleted_tx?, offset,
//! length}`. Versions are immutable once published; an "update" publishes
//! a new version that replaces the index entry for that doc-id, and a
//! delete publishes a tombstone version with `deleted_tx == created_tx`.

use docdb_core::{DocId, TxId};

/// One immutable document version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentVersion {
    /// Document this version belongs to.
    pub doc_id: DocId,
    /// Transaction that published this version.
    pub created_tx: TxId,
    /// Transaction that tombstoned this version, if any.
    pub deleted_tx: Option<TxId>,
    /// Offset of the payload record in the partition's data file.
    pub offset: u64,
    /// Length of the payload record.
    pub length: u32,
}

impl DocumentVersion {
    /// Builds a live (non-tombstone) version.
    pub fn live(doc_id: DocId, created_tx: TxId, offset: u64, length: u32) -> DocumentVersion {
        DocumentVersion {
            doc_id,
            created_tx,
            deleted_tx: None,
            offset,
            length,
        }
    }

    /// Builds a tombstone version: `deleted_tx == created_tx == tx`.
    pub fn tombstone(doc_id: DocId, tx: TxId) -> DocumentVersion {
        DocumentVersion {
            doc_id,
            created_tx: tx,
            deleted_tx: Some(tx),
            offset: 0,
            length: 0,
        }
    }

    /// True when this version has not been tombstoned.
    pub fn is_live(&self) -> bool {
        self.deleted_tx.is_none()
    }

    /// Visibility rule: `created_tx <= snapshot AND (deleted_tx absent OR
    /// deleted_tx > snapshot)`.
    pub fn visible_at(&self, snapshot: TxId) -> bool {
        self.created_tx <= snapshot && self.deleted_tx.map_or(true, |d| d > snapshot)
    }
}
