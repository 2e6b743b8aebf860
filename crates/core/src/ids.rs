use std::fmt;

/// A 64-bit document identifier, unique within a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocId(pub u64);

impl DocId {
    /// Computes the partition this document routes to under hash-routing
    /// by `doc_id mod partition_count`.
    pub fn partition_of(self, partition_count: u64) -> PartitionId {
        debug_assert!(partition_count > 0, "partition_count must be nonzero");
        PartitionId(self.0 % partition_count)
    }
}

impl From<u64> for DocId {
    fn from(v: u64) -> Self {
        DocId(v)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A monotonically increasing transaction identifier assigned by MVCC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxId(pub u64);

impl TxId {
    /// The sentinel used before any transaction has committed.
    pub const ZERO: TxId = TxId(0);

    /// Returns the next transaction id.
    pub fn next(self) -> TxId {
        TxId(self.0 + 1)
    }
}

impl From<u64> for TxId {
    fn from(v: u64) -> Self {
        TxId(v)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one shard of documents by `doc_id mod partition_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionId(pub u64);

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
