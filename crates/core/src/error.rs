use thiserror::Error;

/// Convenience alias used throughout docdb for fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Every error code exposed to callers of the engine, per the external
/// interfaces contract. Variants carry enough context to build a useful
/// message without forcing callers to downcast.
#[derive(Debug, Error)]
pub enum Error {
    /// The database handle was used after `close()` or before `open()`.
    #[error("database is not open")]
    DBNotOpen,

    /// Read or update of a document id that has no visible version.
    #[error("document {doc_id} not found in collection '{collection}'")]
    DocNotFound {
        /// Collection the lookup was scoped to.
        collection: String,
        /// The document id that was not found.
        doc_id: u64,
    },

    /// Create of a document id that already has a live version.
    #[error("document {doc_id} already exists in collection '{collection}'")]
    DocExists {
        /// Collection the create was scoped to.
        collection: String,
        /// The document id that already exists.
        doc_id: u64,
    },

    /// Payload is not syntactically valid JSON, or is empty.
    #[error("payload is not valid JSON: {reason}")]
    InvalidJSON {
        /// Parser error or boundary violation description.
        reason: String,
    },

    /// Payload parsed as JSON but is not a top-level object.
    #[error("payload must be a JSON object")]
    NotJSONObject,

    /// A patch path failed to parse or walk the document.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The offending path string.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A patch operation was rejected before any WAL write occurred.
    #[error("invalid patch: {reason}")]
    InvalidPatch {
        /// Why the patch was rejected.
        reason: String,
    },

    /// CreateCollection on a name that already exists.
    #[error("collection '{0}' already exists")]
    CollectionExists(String),

    /// Operation referenced a collection that does not exist.
    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    /// DeleteCollection on a collection that still has live documents.
    #[error("collection '{0}' is not empty")]
    CollectionNotEmpty(String),

    /// Payload exceeds the 16 MiB bound.
    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge {
        /// Size of the rejected payload.
        size: usize,
        /// The configured limit.
        limit: usize,
    },

    /// Per-database memory cap would be exceeded by this reservation.
    #[error("memory limit exceeded: requested {requested} bytes, {available} available")]
    MemoryLimit {
        /// Bytes requested.
        requested: usize,
        /// Bytes remaining in the budget.
        available: usize,
    },

    /// The worker pool has been stopped and no longer accepts tasks.
    #[error("worker pool has been stopped")]
    PoolStopped,

    /// The worker pool's bounded task queue is full.
    #[error("worker pool task queue is full")]
    QueueFull,

    /// A partition id outside `[0, partition_count)` was requested.
    #[error("invalid partition id {partition_id} (partition_count = {partition_count})")]
    InvalidPartition {
        /// The offending partition id.
        partition_id: u64,
        /// The configured partition count.
        partition_count: u64,
    },

    /// SSI-lite detected a read-write or write-read conflict at commit time.
    #[error("transaction {tx_id} conflicts with a concurrently committed transaction")]
    SerializationFailure {
        /// The transaction that lost the race.
        tx_id: u64,
    },

    /// A data-file record failed its verification byte or CRC check.
    #[error("corrupt record at offset {offset}: {reason}")]
    CorruptRecord {
        /// Offset of the corrupt record.
        offset: u64,
        /// Why the record was rejected.
        reason: String,
    },

    /// A WAL record's CRC32 did not match its payload (fatal, not at tail).
    #[error("corrupt WAL record in segment {segment}: {reason}")]
    CorruptWAL {
        /// Segment file the corrupt record was found in.
        segment: String,
        /// Why the record was rejected.
        reason: String,
    },

    /// Underlying file could not be opened.
    #[error("failed to open file '{path}': {source}")]
    FileOpen {
        /// Path that failed to open.
        path: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Underlying file could not be read.
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path that failed to read.
        path: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Underlying file could not be written.
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path that failed to write.
        path: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Underlying file could not be fsynced.
    #[error("failed to fsync file '{path}': {source}")]
    FileSync {
        /// Path that failed to sync.
        path: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Validation errors are caller mistakes: bad names, bad JSON, invalid
    /// paths, oversized payloads. They never touch the WAL.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidJSON { .. }
                | Error::NotJSONObject
                | Error::InvalidPath { .. }
                | Error::InvalidPatch { .. }
                | Error::PayloadTooLarge { .. }
        )
    }

    /// Resource errors (memory cap, queue full, pool stopped) may be
    /// retried by the caller once pressure relieves.
    pub fn is_resource(&self) -> bool {
        matches!(
            self,
            Error::MemoryLimit { .. } | Error::QueueFull | Error::PoolStopped
        )
    }

    /// True for the SSI-lite commit-time conflict outcome. The transaction
    /// is left `Open`; the caller is expected to roll back and retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::SerializationFailure { .. })
    }

    /// True for checksum/verification failures that the healing service
    /// can potentially repair from WAL history.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::CorruptRecord { .. } | Error::CorruptWAL { .. })
    }

    /// Transient IO classes that the retry controller will retry with
    /// bounded attempts: `FileWrite` and `FileSync`. `FileOpen`/`FileRead`
    /// are not retried automatically since they usually indicate a
    /// structural problem (missing directory, permissions).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::FileWrite { .. } | Error::FileSync { .. })
    }

    /// True for the not-found/exists family of ordinary CRUD outcomes.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::DocNotFound { .. } | Error::CollectionNotFound(_)
        )
    }
}
