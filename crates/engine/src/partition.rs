//! A partition owns one shard of documents, hash-routed by
//! `doc_id mod partition_count`: its own data file, WAL, checkpoint and
//! trim bookkeeping, version index, collection registry, and memory
//! budget.
//!
//! Exactly one writer touches a partition at a time via
//! [`Partition::apply_commit`], which [`docdb_concurrency::TransactionManager::commit`]
//! invokes as its closure while holding the commit mutex — so the
//! SSI-lite conflict check and the WAL/data-file/index writes happen
//! atomically. Reads never take that lock; they only take a brief,
//! per-read lock on the data file itself to serialize the underlying
//! file cursor, and otherwise run against the lock-sharded index.

use chrono::{DateTime, Utc};
use docdb_concurrency::Transaction;
use docdb_core::{DocId, Error, OpType, PartitionId, TxId};
use docdb_durability::{
    recovery, CheckpointManager, RecoveredTransaction, RecoveryResult, WalConfig, WalRecord, WalTrimmer, WalWriter,
};
use docdb_storage::{CollectionRegistry, DataFile, DocumentVersion, ShardedIndex};
use parking_lot::{Mutex, MutexGuard};
use std::path::{Path, PathBuf};

use crate::compactor::CompactionStats;
use crate::config::DatabaseConfig;
use crate::memory::MemoryBudget;

struct WriteState {
    wal: WalWriter,
    checkpoint: CheckpointManager,
    trimmer: WalTrimmer,
    trim_after_checkpoint: bool,
}

/// One hash-routed shard of a database.
pub struct Partition {
    id: PartitionId,
    database_id: String,
    database_uuid: [u8; 16],
    write_state: Mutex<WriteState>,
    data_file: Mutex<DataFile>,
    index: ShardedIndex,
    registry: CollectionRegistry,
    memory: MemoryBudget,
    last_compaction: Mutex<Option<DateTime<Utc>>>,
}

impl Partition {
    /// Opens (creating if absent) the partition's data file and WAL
    /// under `partition_dir`.
    pub fn open(
        id: PartitionId,
        partition_dir: impl AsRef<Path>,
        database_id: String,
        database_uuid: [u8; 16],
        config: &DatabaseConfig,
    ) -> Result<Partition, Error> {
        let partition_dir = partition_dir.as_ref();
        std::fs::create_dir_all(partition_dir).map_err(|source| Error::FileOpen {
            path: partition_dir.display().to_string(),
            source,
        })?;

        let data_file = DataFile::open(partition_dir.join("data.bin"))?;
        let wal_config: WalConfig = config.wal.to_wal_config();
        let wal = WalWriter::open(partition_dir.join("wal"), database_uuid, wal_config)?;
        let checkpoint = CheckpointManager::new(
            config.wal.checkpoint_interval_mb * 1024 * 1024,
            config.wal.checkpoint_auto_create,
            config.wal.max_checkpoints,
        );
        let trimmer = WalTrimmer::new(config.wal.keep_segments);

        Ok(Partition {
            id,
            database_id,
            database_uuid,
            write_state: Mutex::new(WriteState {
                wal,
                checkpoint,
                trimmer,
                trim_after_checkpoint: config.wal.trim_after_checkpoint,
            }),
            data_file: Mutex::new(data_file),
            index: ShardedIndex::with_shard_count(config.shard_count),
            registry: CollectionRegistry::new(),
            memory: MemoryBudget::new(config.memory_limit_bytes as usize),
            last_compaction: Mutex::new(None),
        })
    }

    /// This partition's id.
    pub fn id(&self) -> PartitionId {
        self.id
    }

    /// Replays this partition's WAL, rewriting committed payloads into
    /// the data file and publishing versions into the index. Returns the
    /// full replay result, including any `pending` transactions that
    /// left data here without a local commit marker — the caller
    /// resumes the MVCC counter at `max_tx_id + 1` and consults
    /// `pending` against the coordinator log for cross-partition
    /// transactions (see [`Partition::apply_decided_pending`]).
    pub fn recover(&self) -> Result<RecoveryResult, Error> {
        let wal_dir = {
            let write_state = self.write_state.lock();
            write_state.wal.wal_dir().to_path_buf()
        };
        let result = recovery::recover(&wal_dir, self.database_uuid)?;

        let mut data_file = self.data_file.lock();
        for tx in &result.committed {
            for record in &tx.records {
                self.apply_recovered_record(&mut data_file, TxId(tx.tx_id), record)?;
            }
        }
        data_file.sync()?;
        Ok(result)
    }

    /// Applies `pending` transactions whose coordinator decision was
    /// "commit", for the cross-partition crash window where this
    /// partition's own WAL never received its local `Commit` marker but
    /// the transaction's data records are already durable here.
    pub fn apply_decided_pending(
        &self,
        pending: &[RecoveredTransaction],
        decisions: &std::collections::HashMap<u64, bool>,
    ) -> Result<(), Error> {
        let mut data_file = self.data_file.lock();
        for tx in pending {
            if decisions.get(&tx.tx_id) == Some(&true) {
                for record in &tx.records {
                    self.apply_recovered_record(&mut data_file, TxId(tx.tx_id), record)?;
                }
            }
        }
        data_file.sync()
    }

    fn apply_recovered_record(
        &self,
        data_file: &mut DataFile,
        tx_id: TxId,
        record: &WalRecord,
    ) -> Result<(), Error> {
        match record.op_type {
            OpType::CreateCollection => {
                self.registry.ensure(&record.collection)?;
            }
            OpType::DeleteCollection => {
                // Best effort: a dangling delete in the WAL for a
                // collection whose documents were also replayed away is
                // not itself a recovery failure.
                let _ = self.registry.delete(&record.collection);
            }
            OpType::Delete => {
                if self
                    .index
                    .get_raw(&record.collection, DocId(record.doc_id))
                    .is_some()
                {
                    self.index.publish(
                        &record.collection,
                        DocumentVersion::tombstone(DocId(record.doc_id), tx_id),
                    );
                    self.registry.decrement_doc_count(&record.collection);
                }
            }
            OpType::Create | OpType::Update | OpType::Patch => {
                if let Err(err) = self.memory.reserve(record.payload.len()) {
                    tracing::warn!(
                        partition = self.id.0,
                        doc_id = record.doc_id,
                        error = %err,
                        "recovered document exceeds the memory cap; continuing without a reservation"
                    );
                }
                let offset = data_file.write_no_sync(&record.payload)?;
                let existed = self
                    .index
                    .get_raw(&record.collection, DocId(record.doc_id))
                    .map(|v| v.is_live())
                    .unwrap_or(false);
                self.index.publish(
                    &record.collection,
                    DocumentVersion::live(DocId(record.doc_id), tx_id, offset, record.payload.len() as u32),
                );
                if !existed {
                    self.registry.increment_doc_count(&record.collection);
                }
            }
            OpType::Commit | OpType::Checkpoint => {}
        }
        Ok(())
    }

    /// Reads the version of `(collection, doc_id)` visible at `snapshot`.
    pub fn read(&self, collection: &str, doc_id: u64, snapshot: TxId) -> Result<Option<Vec<u8>>, Error> {
        let Some(version) = self.index.get(collection, DocId(doc_id), snapshot) else {
            return Ok(None);
        };
        let mut data_file = self.data_file.lock();
        Ok(Some(data_file.read(version.offset, version.length)?))
    }

    /// Reads the current physical version regardless of snapshot
    /// visibility, for the validator, healer, and compactor.
    pub fn read_raw(&self, collection: &str, doc_id: u64) -> Result<Option<Vec<u8>>, Error> {
        let Some(version) = self.index.get_raw(collection, DocId(doc_id)) else {
            return Ok(None);
        };
        if !version.is_live() {
            return Ok(None);
        }
        let mut data_file = self.data_file.lock();
        Ok(Some(data_file.read(version.offset, version.length)?))
    }

    /// The version index backing this partition.
    pub fn index(&self) -> &ShardedIndex {
        &self.index
    }

    /// The collection registry backing this partition.
    pub fn registry(&self) -> &CollectionRegistry {
        &self.registry
    }

    /// The memory budget backing this partition.
    pub fn memory(&self) -> &MemoryBudget {
        &self.memory
    }

    /// Current size of the data file, re-stat'd from the filesystem.
    pub fn data_file_len(&self) -> Result<u64, Error> {
        self.data_file.lock().len()
    }

    /// The directory this partition's WAL segments live under, for the
    /// healer's raw record scan.
    pub fn wal_dir(&self) -> PathBuf {
        self.write_state.lock().wal.wal_dir().to_path_buf()
    }

    /// The database UUID stamped into every WAL segment header, needed
    /// to open an independent `WalReader` over this partition's WAL.
    pub fn database_uuid(&self) -> [u8; 16] {
        self.database_uuid
    }

    /// Appends `payload` as a healed record, publishing a new live
    /// version under `created_tx`, and returns the resulting version.
    /// Used by the healer once it has located a replacement payload in
    /// the WAL; does not itself touch the WAL (the corrupt record is
    /// already durable there under its original transaction).
    pub fn heal_with_payload(
        &self,
        collection: &str,
        doc_id: u64,
        created_tx: TxId,
        payload: &[u8],
    ) -> Result<DocumentVersion, Error> {
        let _write_state = self.write_state.lock();
        let offset = {
            let mut data_file = self.data_file.lock();
            data_file.write(payload)?
        };
        let version = DocumentVersion::live(DocId(doc_id), created_tx, offset, payload.len() as u32);
        self.index.publish(collection, version);
        Ok(version)
    }

    /// Timestamp of the most recently completed compaction, if any.
    pub fn last_compaction(&self) -> Option<DateTime<Utc>> {
        *self.last_compaction.lock()
    }

    /// Rewrites the data file, keeping only live payloads and dropping
    /// tombstones whose bytes are no longer referenced by anything.
    ///
    /// Holds the write mutex for the whole pass so no commit can
    /// interleave with the rewrite; the bulk copy itself reads through
    /// an independent file handle so concurrent readers (which only
    /// take the brief `data_file` lock) are not blocked until the final
    /// rename-and-reopen swap.
    pub fn compact(&self) -> Result<CompactionStats, Error> {
        let _write_state = self.write_state.lock();

        let original_path = self.data_file.lock().path().to_path_buf();
        let bytes_before = self.data_file.lock().len()?;
        let compact_path = sibling_compact_path(&original_path);

        let mut new_file = DataFile::open(&compact_path)?;
        let mut read_file = DataFile::open(&original_path)?;
        let mut rewritten: Vec<(String, DocumentVersion)> = Vec::new();
        let mut first_error: Option<Error> = None;

        self.index.for_each_collection(|collection, versions| {
            if first_error.is_some() {
                return;
            }
            for version in versions {
                if !version.is_live() {
                    continue;
                }
                let outcome = read_file
                    .read(version.offset, version.length)
                    .and_then(|payload| new_file.write_no_sync(&payload));
                match outcome {
                    Ok(new_offset) => rewritten.push((
                        collection.to_string(),
                        DocumentVersion::live(version.doc_id, version.created_tx, new_offset, version.length),
                    )),
                    Err(err) => first_error = Some(err),
                }
            }
        });

        if let Some(err) = first_error {
            let _ = std::fs::remove_file(&compact_path);
            return Err(err);
        }

        new_file.sync()?;
        drop(new_file);
        drop(read_file);

        std::fs::rename(&compact_path, &original_path).map_err(|source| Error::FileWrite {
            path: original_path.display().to_string(),
            source,
        })?;
        let reopened = DataFile::open(&original_path)?;
        *self.data_file.lock() = reopened;

        let live_versions_rewritten = rewritten.len();
        for (collection, version) in &rewritten {
            self.index.publish(collection, *version);
        }

        let mut tombstones: Vec<(String, DocId)> = Vec::new();
        self.index.for_each_collection(|collection, versions| {
            for version in versions {
                if !version.is_live() {
                    tombstones.push((collection.to_string(), version.doc_id));
                }
            }
        });
        for (collection, doc_id) in tombstones {
            self.index.remove(&collection, doc_id);
        }

        let bytes_after = self.data_file.lock().len()?;
        let stamped = Utc::now();
        *self.last_compaction.lock() = Some(stamped);

        Ok(CompactionStats {
            bytes_before,
            bytes_after,
            live_versions_rewritten,
            last_compaction: stamped,
        })
    }

    /// Writes one transaction's queued operations to the WAL and data
    /// file, staging the index publishes a caller applies afterward.
    /// Does not write the commit marker. On failure, already-reserved
    /// memory for this call is released before the error is returned.
    fn write_ops(
        &self,
        write_state: &mut WriteState,
        tx: &Transaction,
    ) -> Result<(Vec<(String, DocumentVersion, bool)>, usize, u64), Error> {
        let mut reserved_total: usize = 0;
        let mut bytes_written: u64 = 0;
        let mut publishes: Vec<(String, DocumentVersion, bool)> = Vec::new();

        let outcome = (|| -> Result<(), Error> {
            for op in &tx.operations {
                match op.op_type {
                    OpType::CreateCollection => {
                        self.registry.ensure(&op.collection)?;
                        let record = WalRecord {
                            tx_id: tx.id.0,
                            db_id: self.database_id.clone(),
                            collection: op.collection.clone(),
                            op_type: OpType::CreateCollection,
                            doc_id: 0,
                            payload: Vec::new(),
                        };
                        bytes_written += record_size(&record);
                        write_state.wal.append(&record)?;
                    }
                    OpType::DeleteCollection => {
                        self.registry.delete(&op.collection)?;
                        let record = WalRecord {
                            tx_id: tx.id.0,
                            db_id: self.database_id.clone(),
                            collection: op.collection.clone(),
                            op_type: OpType::DeleteCollection,
                            doc_id: 0,
                            payload: Vec::new(),
                        };
                        bytes_written += record_size(&record);
                        write_state.wal.append(&record)?;
                    }
                    OpType::Delete => {
                        let existed = self
                            .index
                            .get_raw(&op.collection, DocId(op.doc_id))
                            .map(|v| v.is_live())
                            .unwrap_or(false);
                        let record = WalRecord {
                            tx_id: tx.id.0,
                            db_id: self.database_id.clone(),
                            collection: op.collection.clone(),
                            op_type: OpType::Delete,
                            doc_id: op.doc_id,
                            payload: Vec::new(),
                        };
                        bytes_written += record_size(&record);
                        write_state.wal.append(&record)?;
                        if existed {
                            publishes.push((
                                op.collection.clone(),
                                DocumentVersion::tombstone(DocId(op.doc_id), tx.id),
                                false,
                            ));
                        }
                    }
                    OpType::Create | OpType::Update | OpType::Patch => {
                        self.memory.reserve(op.payload.len())?;
                        reserved_total += op.payload.len();
                        let offset = {
                            let mut data_file = self.data_file.lock();
                            data_file.write(&op.payload)?
                        };
                        let record = WalRecord {
                            tx_id: tx.id.0,
                            db_id: self.database_id.clone(),
                            collection: op.collection.clone(),
                            op_type: op.op_type,
                            doc_id: op.doc_id,
                            payload: op.payload.clone(),
                        };
                        bytes_written += record_size(&record);
                        write_state.wal.append(&record)?;
                        let is_new = self
                            .index
                            .get_raw(&op.collection, DocId(op.doc_id))
                            .map(|v| !v.is_live())
                            .unwrap_or(true);
                        publishes.push((
                            op.collection.clone(),
                            DocumentVersion::live(DocId(op.doc_id), tx.id, offset, op.payload.len() as u32),
                            is_new,
                        ));
                    }
                    OpType::Commit | OpType::Checkpoint => {
                        debug_assert!(false, "Commit/Checkpoint are never queued as pending ops");
                    }
                }
            }
            Ok(())
        })();

        if let Err(err) = outcome {
            self.memory.release(reserved_total);
            return Err(err);
        }
        Ok((publishes, reserved_total, bytes_written))
    }

    fn publish_all(&self, publishes: Vec<(String, DocumentVersion, bool)>) {
        for (collection, version, is_new) in publishes {
            let is_delete = !version.is_live();
            self.index.publish(&collection, version);
            if is_delete {
                self.registry.decrement_doc_count(&collection);
            } else if is_new {
                self.registry.increment_doc_count(&collection);
            }
        }
    }

    fn post_commit(&self, write_state: &mut WriteState, tx_id: u64, bytes_written: u64) {
        write_state.checkpoint.record_bytes_written(bytes_written);
        if write_state.checkpoint.should_checkpoint() {
            self.maybe_checkpoint(write_state, tx_id);
        }
    }

    /// Applies one committed transaction's queued operations: the write
    /// path proper. Intended to be passed as the `apply` closure to
    /// [`docdb_concurrency::TransactionManager::commit`], which holds the
    /// commit mutex for the duration of this call.
    pub fn apply_commit(&self, tx: &Transaction) -> Result<(), Error> {
        let mut write_state = self.write_state.lock();
        let (publishes, reserved_total, bytes_written) = self.write_ops(&mut write_state, tx)?;

        if let Err(err) = write_state.wal.write_commit_marker(tx.id.0) {
            self.memory.release(reserved_total);
            return Err(err);
        }

        self.publish_all(publishes);
        self.post_commit(&mut write_state, tx.id.0, bytes_written);
        Ok(())
    }

    /// Phase one of a cross-partition transaction: durably writes this
    /// partition's share of `tx`'s data records with no commit marker,
    /// holding the write lock until the returned [`PreparedCommit`] is
    /// finalized or discarded so no other writer can interleave.
    pub fn prepare(&self, tx: &Transaction) -> Result<PreparedCommit<'_>, Error> {
        let mut write_state = self.write_state.lock();
        let (publishes, reserved_total, bytes_written) = self.write_ops(&mut write_state, tx)?;
        Ok(PreparedCommit {
            partition: self,
            write_state,
            publishes,
            reserved_total,
            bytes_written,
            tx_id: tx.id,
        })
    }

    /// Zeroes the verification byte of the record at `offset`, simulating
    /// the torn write the validator/healer scenario exercises.
    #[doc(hidden)]
    pub fn corrupt_for_test(&self, offset: u64, length: u32) -> Result<(), Error> {
        self.data_file.lock().corrupt_verification_byte_for_test(offset, length)
    }

    fn maybe_checkpoint(&self, write_state: &mut WriteState, tx_id: u64) {
        if let Err(err) = write_state.wal.write_checkpoint(tx_id) {
            tracing::warn!(partition = self.id.0, error = %err, "checkpoint write failed; will retry on a later commit");
            return;
        }
        write_state.checkpoint.record_checkpoint(tx_id);
        if !write_state.trim_after_checkpoint {
            return;
        }
        let Ok(segments) = write_state.wal.list_segments() else {
            return;
        };
        let Some(current) = segments.last().and_then(|p| segment_number(p)) else {
            return;
        };
        if let Err(err) = write_state.trimmer.trim(&segments, current) {
            tracing::warn!(partition = self.id.0, error = %err, "WAL trim failed after checkpoint");
        }
    }
}

/// A partition's durable stake in a cross-partition transaction: its
/// data records are on disk with no commit marker yet, and its write
/// lock is held until [`PreparedCommit::finalize`] or
/// [`PreparedCommit::discard`] decides the outcome.
pub struct PreparedCommit<'p> {
    partition: &'p Partition,
    write_state: MutexGuard<'p, WriteState>,
    publishes: Vec<(String, DocumentVersion, bool)>,
    reserved_total: usize,
    bytes_written: u64,
    tx_id: TxId,
}

impl<'p> PreparedCommit<'p> {
    /// Writes the commit marker and publishes the staged versions. Call
    /// only once the coordinator's decision for this transaction is
    /// durable.
    pub fn finalize(mut self) -> Result<(), Error> {
        if let Err(err) = self.write_state.wal.write_commit_marker(self.tx_id.0) {
            self.partition.memory.release(self.reserved_total);
            return Err(err);
        }
        let publishes = std::mem::take(&mut self.publishes);
        self.partition.publish_all(publishes);
        self.partition
            .post_commit(&mut self.write_state, self.tx_id.0, self.bytes_written);
        Ok(())
    }

    /// Abandons this partition's share of the transaction. The data
    /// records already on disk are left as orphans; recovery ignores
    /// them because no commit marker ever names this transaction here.
    pub fn discard(self) {
        self.partition.memory.release(self.reserved_total);
    }
}

/// The sibling path a compaction rewrite is staged under before the
/// atomic rename over the original.
fn sibling_compact_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".compact");
    PathBuf::from(os)
}

fn record_size(record: &WalRecord) -> u64 {
    record.encode_body().len() as u64 + 8
}

/// Parses the sequence number out of a `wal-NNNNNN.seg` path, mirroring
/// the naming convention `WalWriter` itself writes segments under.
fn segment_number(path: &Path) -> Option<u64> {
    path.file_stem()?
        .to_str()?
        .strip_prefix("wal-")?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docdb_concurrency::TransactionManager;
    use tempfile::tempdir;

    fn test_config() -> DatabaseConfig {
        let mut config = DatabaseConfig::default();
        config.shard_count = 4;
        config
    }

    fn open_partition(dir: &Path) -> Partition {
        Partition::open(PartitionId(0), dir, "t1".to_string(), [7u8; 16], &test_config()).unwrap()
    }

    #[test]
    fn create_then_read_is_visible_after_commit() {
        let dir = tempdir().unwrap();
        let partition = open_partition(dir.path());
        let mgr = TransactionManager::new();

        let tx_id = mgr.begin();
        mgr.add_op(tx_id, "_default", OpType::Create, 1, br#"{"a":1}"#.to_vec());
        mgr.commit(tx_id, |tx| partition.apply_commit(tx)).unwrap();

        let doc = partition.read("_default", 1, tx_id).unwrap().unwrap();
        assert_eq!(doc, br#"{"a":1}"#);
    }

    #[test]
    fn delete_tombstones_and_hides_the_document() {
        let dir = tempdir().unwrap();
        let partition = open_partition(dir.path());
        let mgr = TransactionManager::new();

        let create_tx = mgr.begin();
        mgr.add_op(create_tx, "_default", OpType::Create, 1, br#"{"a":1}"#.to_vec());
        mgr.commit(create_tx, |tx| partition.apply_commit(tx)).unwrap();

        let delete_tx = mgr.begin();
        mgr.add_op(delete_tx, "_default", OpType::Delete, 1, Vec::new());
        mgr.commit(delete_tx, |tx| partition.apply_commit(tx)).unwrap();

        assert!(partition.read("_default", 1, create_tx).unwrap().is_some());
        assert!(partition.read("_default", 1, delete_tx).unwrap().is_none());
    }

    #[test]
    fn failed_apply_releases_its_memory_reservation() {
        let dir = tempdir().unwrap();
        let mut config = test_config();
        config.memory_limit_bytes = 4; // smaller than any real payload
        let partition = Partition::open(PartitionId(0), dir.path(), "t1".to_string(), [1u8; 16], &config).unwrap();
        let mgr = TransactionManager::new();

        let tx_id = mgr.begin();
        mgr.add_op(tx_id, "_default", OpType::Create, 1, br#"{"a":1}"#.to_vec());
        let err = mgr.commit(tx_id, |tx| partition.apply_commit(tx)).unwrap_err();
        assert!(matches!(err, Error::MemoryLimit { .. }));
        assert_eq!(partition.memory().used(), 0);
    }

    #[test]
    fn recover_restores_committed_documents_into_a_fresh_partition() {
        let dir = tempdir().unwrap();
        let database_uuid = [3u8; 16];
        let tx_id = {
            let partition = Partition::open(
                PartitionId(0),
                dir.path(),
                "t1".to_string(),
                database_uuid,
                &test_config(),
            )
            .unwrap();
            let mgr = TransactionManager::new();
            let tx_id = mgr.begin();
            mgr.add_op(tx_id, "_default", OpType::Create, 1, br#"{"a":1}"#.to_vec());
            mgr.commit(tx_id, |tx| partition.apply_commit(tx)).unwrap();
            tx_id
        };

        let reopened = Partition::open(
            PartitionId(0),
            dir.path(),
            "t1".to_string(),
            database_uuid,
            &test_config(),
        )
        .unwrap();
        let recovered = reopened.recover().unwrap();
        assert_eq!(recovered.max_tx_id, tx_id.0);
        let doc = reopened.read("_default", 1, tx_id).unwrap().unwrap();
        assert_eq!(doc, br#"{"a":1}"#);
    }

    #[test]
    fn compact_drops_tombstones_and_preserves_live_payloads() {
        let dir = tempdir().unwrap();
        let partition = open_partition(dir.path());
        let mgr = TransactionManager::new();

        let tx1 = mgr.begin();
        mgr.add_op(tx1, "_default", OpType::Create, 1, br#"{"a":1}"#.to_vec());
        mgr.add_op(tx1, "_default", OpType::Create, 2, br#"{"b":2}"#.to_vec());
        mgr.commit(tx1, |tx| partition.apply_commit(tx)).unwrap();

        let tx2 = mgr.begin();
        mgr.add_op(tx2, "_default", OpType::Delete, 2, Vec::new());
        mgr.commit(tx2, |tx| partition.apply_commit(tx)).unwrap();

        assert_eq!(partition.index().total_counts(), (1, 1));

        let stats = partition.compact().unwrap();
        assert_eq!(stats.live_versions_rewritten, 1);
        assert!(stats.bytes_after <= stats.bytes_before);
        assert_eq!(partition.index().total_counts(), (1, 0));

        let latest = mgr.begin();
        let doc = partition.read("_default", 1, latest).unwrap().unwrap();
        assert_eq!(doc, br#"{"a":1}"#);
        assert!(partition.last_compaction().is_some());
    }

    #[test]
    fn create_collection_and_delete_collection_round_trip() {
        let dir = tempdir().unwrap();
        let partition = open_partition(dir.path());
        let mgr = TransactionManager::new();

        let tx_id = mgr.begin();
        mgr.add_op(tx_id, "orders", OpType::CreateCollection, 0, Vec::new());
        mgr.commit(tx_id, |tx| partition.apply_commit(tx)).unwrap();
        assert!(partition.registry().exists("orders"));

        let tx_id = mgr.begin();
        mgr.add_op(tx_id, "orders", OpType::DeleteCollection, 0, Vec::new());
        mgr.commit(tx_id, |tx| partition.apply_commit(tx)).unwrap();
        assert!(!partition.registry().exists("orders"));
    }
}
