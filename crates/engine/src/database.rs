//! The top-level handle: owns every partition, the per-database
//! transaction manager, the coordinator log for cross-partition
//! transactions, the worker pool, and the background maintenance loop
//! that drives compaction and healing. This is the surface
//! `docdb-api` wraps.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use docdb_concurrency::{PendingOp, Transaction, TransactionManager};
use docdb_core::{
    validate_collection_name, validate_database_name, DocId, Error, JsonPatch, JsonValue, OpType, PartitionId, TxId,
};
use docdb_durability::CoordinatorLog;
use parking_lot::Mutex;
use rayon::prelude::*;
use uuid::Uuid;

use crate::compactor::{self, CompactionStats};
use crate::config::{DatabaseConfig, CONFIG_FILE_NAME};
use crate::healer;
use crate::healing_service::{HealingService, HealingStats};
use crate::partition::Partition;
use crate::patch;
use crate::retry::{with_retry, RetryConfig};
use crate::worker_pool::WorkerPool;

const DATABASE_ID_FILE_NAME: &str = "database.id";
const COORDINATOR_LOG_FILE_NAME: &str = "coordinator.log";

/// An explicit, possibly multi-document transaction handle obtained
/// from [`Database::begin_transaction`]. Must be finished with
/// [`Database::commit`] or [`Database::rollback`]; dropping it without
/// either leaves the transaction open until the database closes.
pub struct DbTransaction {
    id: TxId,
}

/// A snapshot of one open database's activity, for diagnostics and
/// operational dashboards.
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    /// Number of hash-routed partitions.
    pub partitions: usize,
    /// Transactions begun but not yet committed or rolled back.
    pub open_transactions: usize,
    /// Total transactions committed since this process opened the
    /// database (resets on restart; durable history lives in the WAL).
    pub committed_transactions: u64,
    /// Bytes currently reserved against the memory cap, summed across
    /// partitions.
    pub memory_used_bytes: usize,
    /// The configured memory cap.
    pub memory_limit_bytes: usize,
    /// Live documents, summed across partitions.
    pub live_documents: usize,
    /// Tombstoned (deleted, not yet compacted away) documents.
    pub tombstoned_documents: usize,
    /// Healing service counters.
    pub healing: HealingStats,
}

/// An embeddable, single-node document database.
pub struct Database {
    name: String,
    data_dir: PathBuf,
    config: DatabaseConfig,
    partitions: Vec<Arc<Partition>>,
    txn_manager: TransactionManager,
    coordinator_log: Mutex<CoordinatorLog>,
    pool: Arc<WorkerPool>,
    healing: Arc<HealingService>,
    retry: RetryConfig,
    stop_maintenance: Arc<AtomicBool>,
    maintenance_handle: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Database {
    /// Opens (creating if absent) the database named `name` under
    /// `data_dir`. Replays every partition's WAL, reconciles any
    /// cross-partition transactions against the coordinator log, and
    /// restores the MVCC counter past the highest transaction id seen
    /// anywhere.
    pub fn open(name: &str, data_dir: impl AsRef<Path>) -> Result<Database, Error> {
        validate_database_name(name)?;
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir).map_err(|source| Error::FileOpen {
            path: data_dir.display().to_string(),
            source,
        })?;

        let config_path = data_dir.join(CONFIG_FILE_NAME);
        DatabaseConfig::write_default_if_missing(&config_path)?;
        let config = DatabaseConfig::from_file(&config_path)?;

        let database_uuid = load_or_create_uuid(&data_dir)?;

        let mut partitions = Vec::with_capacity(config.partition_count);
        for i in 0..config.partition_count {
            let partition_dir = data_dir.join(format!("p{i}"));
            let partition = Partition::open(PartitionId(i as u64), partition_dir, name.to_string(), database_uuid, &config)?;
            partitions.push(Arc::new(partition));
        }

        let coordinator_path = data_dir.join(COORDINATOR_LOG_FILE_NAME);
        let decisions = CoordinatorLog::replay(&coordinator_path)?;
        let coordinator_log = CoordinatorLog::open(&coordinator_path)?;

        let mut max_tx_id: u64 = 0;
        let mut pending_by_partition = Vec::with_capacity(partitions.len());
        for partition in &partitions {
            let result = partition.recover()?;
            max_tx_id = max_tx_id.max(result.max_tx_id);
            pending_by_partition.push(result.pending);
        }
        for (partition, pending) in partitions.iter().zip(pending_by_partition.iter()) {
            partition.apply_decided_pending(pending, &decisions)?;
        }

        let txn_manager = TransactionManager::restore(max_tx_id + 1);
        let pool = Arc::new(WorkerPool::new(config.worker_count, config.queue_capacity));
        let healing = Arc::new(HealingService::new(config.healing.clone()));
        let stop_maintenance = Arc::new(AtomicBool::new(false));
        let maintenance_handle = spawn_maintenance(
            partitions.clone(),
            Arc::clone(&healing),
            config.compaction.clone(),
            Arc::clone(&pool),
            Arc::clone(&stop_maintenance),
        );

        Ok(Database {
            name: name.to_string(),
            data_dir,
            config,
            partitions,
            txn_manager,
            coordinator_log: Mutex::new(coordinator_log),
            pool,
            healing,
            retry: RetryConfig::default(),
            stop_maintenance,
            maintenance_handle: Mutex::new(Some(maintenance_handle)),
            closed: AtomicBool::new(false),
        })
    }

    /// This database's logical name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The data directory this database was opened under.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Stops the background maintenance loop and the worker pool.
    /// Idempotent; also run automatically on drop.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stop_maintenance.store(true, Ordering::Release);
        if let Some(handle) = self.maintenance_handle.lock().take() {
            let _ = handle.join();
        }
        self.pool.shutdown();
    }

    fn partition_for(&self, doc_id: u64) -> &Arc<Partition> {
        let index = DocId(doc_id).partition_of(self.partitions.len() as u64).0 as usize;
        &self.partitions[index]
    }

    /// Reads the current value of `(collection, doc_id)`, attempting an
    /// on-read heal if the healing service is configured for it and the
    /// stored record turns out to be corrupt.
    pub fn get(&self, collection: &str, doc_id: u64) -> Result<Option<Vec<u8>>, Error> {
        let collection = validate_collection_name(collection)?;
        let tx_id = self.txn_manager.begin();
        let snapshot = self.txn_manager.snapshot_of(tx_id);
        self.txn_manager.record_read(tx_id, &collection, doc_id);
        let partition = self.partition_for(doc_id);
        let result = partition.read(&collection, doc_id, snapshot);
        self.txn_manager.rollback(tx_id);

        match result {
            Err(err) if err.is_corruption() && self.healing.try_heal_on_read(partition, &collection, doc_id) => {
                partition.read(&collection, doc_id, snapshot)
            }
            other => other,
        }
    }

    /// Creates a new document, or overwrites the current one if a live
    /// version already exists at `doc_id` — identical to `update` at
    /// the storage layer, distinguished only by the WAL op code it is
    /// recorded under.
    pub fn create(&self, collection: &str, doc_id: u64, payload: &[u8]) -> Result<u64, Error> {
        self.write_document(collection, doc_id, payload, OpType::Create)
    }

    /// Replaces the current value of `(collection, doc_id)` with
    /// `payload`.
    pub fn update(&self, collection: &str, doc_id: u64, payload: &[u8]) -> Result<u64, Error> {
        self.write_document(collection, doc_id, payload, OpType::Update)
    }

    fn write_document(&self, collection: &str, doc_id: u64, payload: &[u8], op_type: OpType) -> Result<u64, Error> {
        let collection = validate_collection_name(collection)?;
        JsonValue::parse_document(payload)?;
        self.run_single_op(&collection, op_type, doc_id, payload.to_vec())
    }

    /// Deletes the document at `(collection, doc_id)`. A delete of an
    /// already-absent or already-deleted document is a harmless no-op
    /// at the storage layer (no live version exists to tombstone).
    pub fn delete(&self, collection: &str, doc_id: u64) -> Result<u64, Error> {
        let collection = validate_collection_name(collection)?;
        self.run_single_op(&collection, OpType::Delete, doc_id, Vec::new())
    }

    /// Applies `patch` to the current value of `(collection, doc_id)`
    /// and writes the resulting post-image. Fails with `DocNotFound` if
    /// no live version exists to patch.
    pub fn patch(&self, collection: &str, doc_id: u64, patch: &JsonPatch) -> Result<u64, Error> {
        let collection = validate_collection_name(collection)?;
        with_retry(&self.retry, || {
            let tx_id = self.txn_manager.begin();
            let snapshot = self.txn_manager.snapshot_of(tx_id);
            let partition = self.partition_for(doc_id);
            self.txn_manager.record_read(tx_id, &collection, doc_id);

            let current = match partition.read(&collection, doc_id, snapshot) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    self.txn_manager.rollback(tx_id);
                    return Err(Error::DocNotFound {
                        collection: collection.clone(),
                        doc_id,
                    });
                }
                Err(err) => {
                    self.txn_manager.rollback(tx_id);
                    return Err(err);
                }
            };

            let resolved = match patch::resolve_patch(&current, patch) {
                Ok(bytes) => bytes,
                Err(err) => {
                    self.txn_manager.rollback(tx_id);
                    return Err(err);
                }
            };

            self.txn_manager.add_op(tx_id, &collection, OpType::Patch, doc_id, resolved);
            self.commit_transaction(tx_id).map_err(|err| {
                self.txn_manager.rollback(tx_id);
                err
            })
        })
    }

    fn run_single_op(&self, collection: &str, op_type: OpType, doc_id: u64, payload: Vec<u8>) -> Result<u64, Error> {
        with_retry(&self.retry, || {
            let tx_id = self.txn_manager.begin();
            self.txn_manager.add_op(tx_id, collection, op_type, doc_id, payload.clone());
            self.commit_transaction(tx_id).map_err(|err| {
                self.txn_manager.rollback(tx_id);
                err
            })
        })
    }

    /// Creates a new collection. Fails with `CollectionExists` if one
    /// is already registered under this name.
    pub fn create_collection(&self, name: &str) -> Result<(), Error> {
        let normalized = validate_collection_name(name)?;
        if self.partitions[0].registry().exists(&normalized) {
            return Err(Error::CollectionExists(normalized));
        }
        self.run_single_op(&normalized, OpType::CreateCollection, 0, Vec::new())?;
        Ok(())
    }

    /// Deletes an empty collection. Fails with `CollectionNotFound` if
    /// absent anywhere, or `CollectionNotEmpty` if any partition still
    /// holds live documents under it.
    pub fn delete_collection(&self, name: &str) -> Result<(), Error> {
        let normalized = validate_collection_name(name)?;
        for partition in &self.partitions {
            match partition.registry().metadata(&normalized) {
                None => return Err(Error::CollectionNotFound(normalized)),
                Some(meta) if meta.doc_count > 0 => return Err(Error::CollectionNotEmpty(normalized)),
                Some(_) => {}
            }
        }
        self.run_single_op(&normalized, OpType::DeleteCollection, 0, Vec::new())?;
        Ok(())
    }

    /// Begins an explicit transaction spanning any number of documents,
    /// possibly across partitions. Use [`Self::tx_get`]/`tx_create`/
    /// `tx_update`/`tx_delete`/`tx_patch` to queue work against it, then
    /// finish with [`Self::commit`] or [`Self::rollback`].
    pub fn begin_transaction(&self) -> DbTransaction {
        DbTransaction {
            id: self.txn_manager.begin(),
        }
    }

    /// Reads `(collection, doc_id)` at `tx`'s snapshot, recording the
    /// read into its read set for SSI-lite conflict detection at commit.
    pub fn tx_get(&self, tx: &DbTransaction, collection: &str, doc_id: u64) -> Result<Option<Vec<u8>>, Error> {
        let collection = validate_collection_name(collection)?;
        let snapshot = self.txn_manager.snapshot_of(tx.id);
        self.txn_manager.record_read(tx.id, &collection, doc_id);
        self.partition_for(doc_id).read(&collection, doc_id, snapshot)
    }

    /// Queues a create within `tx`.
    pub fn tx_create(&self, tx: &DbTransaction, collection: &str, doc_id: u64, payload: &[u8]) -> Result<(), Error> {
        self.tx_write(tx, collection, doc_id, payload, OpType::Create)
    }

    /// Queues an update within `tx`.
    pub fn tx_update(&self, tx: &DbTransaction, collection: &str, doc_id: u64, payload: &[u8]) -> Result<(), Error> {
        self.tx_write(tx, collection, doc_id, payload, OpType::Update)
    }

    fn tx_write(
        &self,
        tx: &DbTransaction,
        collection: &str,
        doc_id: u64,
        payload: &[u8],
        op_type: OpType,
    ) -> Result<(), Error> {
        let collection = validate_collection_name(collection)?;
        JsonValue::parse_document(payload)?;
        self.txn_manager.add_op(tx.id, &collection, op_type, doc_id, payload.to_vec());
        Ok(())
    }

    /// Queues a delete within `tx`.
    pub fn tx_delete(&self, tx: &DbTransaction, collection: &str, doc_id: u64) -> Result<(), Error> {
        let collection = validate_collection_name(collection)?;
        self.txn_manager.add_op(tx.id, &collection, OpType::Delete, doc_id, Vec::new());
        Ok(())
    }

    /// Reads the document's current value within `tx`'s snapshot, applies
    /// `patch`, and queues the result as an update. Fails with
    /// `DocNotFound` if there is nothing to patch.
    pub fn tx_patch(&self, tx: &DbTransaction, collection: &str, doc_id: u64, patch: &JsonPatch) -> Result<(), Error> {
        let collection = validate_collection_name(collection)?;
        let current = self
            .tx_get(tx, &collection, doc_id)?
            .ok_or_else(|| Error::DocNotFound {
                collection: collection.clone(),
                doc_id,
            })?;
        let resolved = patch::resolve_patch(&current, patch)?;
        self.txn_manager.add_op(tx.id, &collection, OpType::Patch, doc_id, resolved);
        Ok(())
    }

    /// Commits `tx`: checks for SSI-lite conflicts against the bounded
    /// recent-commit window and, if clear, durably applies every queued
    /// operation. Transactions whose operations span more than one
    /// partition go through the coordinator log first.
    pub fn commit(&self, tx: DbTransaction) -> Result<u64, Error> {
        self.commit_transaction(tx.id).map_err(|err| {
            self.txn_manager.rollback(tx.id);
            err
        })
    }

    /// Abandons `tx` without effect.
    pub fn rollback(&self, tx: DbTransaction) {
        self.txn_manager.rollback(tx.id);
    }

    fn commit_transaction(&self, tx_id: TxId) -> Result<u64, Error> {
        let partition_count = self.partitions.len() as u64;
        self.txn_manager.commit(tx_id, |tx| {
            let mut touched: BTreeSet<u64> = BTreeSet::new();
            for op in &tx.operations {
                touched.extend(partitions_for_op(op, partition_count));
            }

            if touched.len() <= 1 {
                if let Some(&pid) = touched.iter().next() {
                    return self.partitions[pid as usize].apply_commit(tx);
                }
                return Ok(());
            }

            // Cross-partition transaction: every touched partition stages
            // its share durably (data records, no commit marker) before
            // the coordinator's decision is written. Only once every
            // partition has prepared does the decision become durable,
            // and only then does each partition finalize. A crash at any
            // point before the decision is written leaves every prepared
            // partition's records as harmless orphans (no commit marker
            // ever names them there); a crash after leaves recovery able
            // to apply them via `RecoveryResult::pending` +
            // `Partition::apply_decided_pending`.
            let mut prepared = Vec::with_capacity(touched.len());
            for &pid in &touched {
                let filtered = filtered_tx_for_partition(tx, pid, partition_count);
                match self.partitions[pid as usize].prepare(&filtered) {
                    Ok(commit) => prepared.push(commit),
                    Err(err) => {
                        for commit in prepared {
                            commit.discard();
                        }
                        return Err(err);
                    }
                }
            }

            if let Err(err) = self.coordinator_log.lock().append_decision(tx.id.0, true) {
                for commit in prepared {
                    commit.discard();
                }
                return Err(err);
            }

            for commit in prepared {
                commit.finalize()?;
            }
            Ok(())
        })
    }

    /// Runs a compaction pass on every partition unconditionally,
    /// regardless of the configured trigger thresholds. Partitions are
    /// independent (each owns its own data file and index), so the
    /// passes run in parallel across a rayon pool rather than one at a
    /// time.
    pub fn compact_all(&self) -> Result<Vec<CompactionStats>, Error> {
        self.partitions.par_iter().map(|p| p.compact()).collect()
    }

    /// Repairs `(collection, doc_id)` from WAL history immediately,
    /// independent of the background healing loop.
    pub fn heal(&self, collection: &str, doc_id: u64) -> Result<(), Error> {
        let collection = validate_collection_name(collection)?;
        healer::heal(self.partition_for(doc_id), &collection, doc_id)
    }

    /// A snapshot of current activity across every partition.
    pub fn stats(&self) -> DatabaseStats {
        let mut live_documents = 0;
        let mut tombstoned_documents = 0;
        let mut memory_used_bytes = 0;
        for partition in &self.partitions {
            let (live, tombstoned) = partition.index().total_counts();
            live_documents += live;
            tombstoned_documents += tombstoned;
            memory_used_bytes += partition.memory().used();
        }
        DatabaseStats {
            partitions: self.partitions.len(),
            open_transactions: self.txn_manager.open_count(),
            committed_transactions: self.txn_manager.committed_count(),
            memory_used_bytes,
            memory_limit_bytes: self.config.memory_limit_bytes as usize,
            live_documents,
            tombstoned_documents,
            healing: self.healing.stats(),
        }
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.close();
    }
}

/// Every partition id an operation touches: a single routed partition
/// for ordinary document ops, or every partition for collection-level
/// metadata ops, since each partition keeps its own collection
/// registry.
fn partitions_for_op(op: &PendingOp, partition_count: u64) -> Vec<u64> {
    match op.op_type {
        OpType::CreateCollection | OpType::DeleteCollection => (0..partition_count).collect(),
        _ => vec![DocId(op.doc_id).partition_of(partition_count).0],
    }
}

/// Builds the view of `tx` that partition `partition_id` should apply:
/// only the operations routed to it.
fn filtered_tx_for_partition(tx: &Transaction, partition_id: u64, partition_count: u64) -> Transaction {
    let mut filtered = tx.clone();
    filtered.operations = tx
        .operations
        .iter()
        .filter(|op| partitions_for_op(op, partition_count).contains(&partition_id))
        .cloned()
        .collect();
    filtered
}

fn load_or_create_uuid(data_dir: &Path) -> Result<[u8; 16], Error> {
    let path = data_dir.join(DATABASE_ID_FILE_NAME);
    if let Ok(bytes) = std::fs::read(&path) {
        if bytes.len() == 16 {
            let mut uuid = [0u8; 16];
            uuid.copy_from_slice(&bytes);
            return Ok(uuid);
        }
    }
    let uuid = *Uuid::new_v4().as_bytes();
    std::fs::write(&path, uuid).map_err(|source| Error::FileWrite {
        path: path.display().to_string(),
        source,
    })?;
    Ok(uuid)
}

fn spawn_maintenance(
    partitions: Vec<Arc<Partition>>,
    healing: Arc<HealingService>,
    compaction: crate::config::CompactionSettings,
    pool: Arc<WorkerPool>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("docdb-maintenance".to_string())
        .spawn(move || {
            while !stop.load(Ordering::Acquire) {
                // Partitions are independent, so one tick's healing scan
                // and compaction check run across a rayon pool rather
                // than one partition at a time.
                partitions.par_iter().for_each(|partition| {
                    if healing.enabled() {
                        healing.run_background_scan(Arc::clone(partition), &pool);
                    }
                    match compactor::maybe_compact(partition, &compaction) {
                        Ok(Some(stats)) => tracing::info!(
                            partition = partition.id().0,
                            bytes_before = stats.bytes_before,
                            bytes_after = stats.bytes_after,
                            "compaction completed"
                        ),
                        Ok(None) => {}
                        Err(err) => {
                            tracing::warn!(partition = partition.id().0, error = %err, "compaction pass failed")
                        }
                    }
                });

                let tick = healing.interval().min(Duration::from_secs(5)).max(Duration::from_millis(200));
                let started = Instant::now();
                while started.elapsed() < tick && !stop.load(Ordering::Acquire) {
                    thread::sleep(Duration::from_millis(200));
                }
            }
        })
        .expect("failed to spawn docdb maintenance thread")
}
