//! Per-partition, per-collection index: `collection name -> sharded map
//! doc_id -> current version`. Each shard has its own reader/writer lock
//! so that concurrent readers across different doc-ids never contend,
//! and writers only exclude readers of the one shard they touch.

use docdb_core::{DocId, TxId};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::HashMap;

use crate::version::DocumentVersion;

/// Default number of shards per collection.
pub const DEFAULT_SHARD_COUNT: usize = 256;

struct CollectionShards {
    shards: Vec<RwLock<FxHashMap<u64, DocumentVersion>>>,
}

impl CollectionShards {
    fn new(shard_count: usize) -> CollectionShards {
        let mut shards = Vec::with_capacity(shard_count);
        for _ in 0..shard_count {
            shards.push(RwLock::new(FxHashMap::default()));
        }
        CollectionShards { shards }
    }

    fn shard_for(&self, doc_id: DocId) -> &RwLock<FxHashMap<u64, DocumentVersion>> {
        let idx = (doc_id.0 as usize) % self.shards.len();
        &self.shards[idx]
    }
}

/// The sharded, per-collection version index owned by one partition.
pub struct ShardedIndex {
    shard_count: usize,
    collections: RwLock<HashMap<String, CollectionShards>>,
}

impl ShardedIndex {
    /// Builds an empty index with the default shard count.
    pub fn new() -> ShardedIndex {
        ShardedIndex::with_shard_count(DEFAULT_SHARD_COUNT)
    }

    /// Builds an empty index with an explicit shard count, mainly for
    /// tests that want to exercise shard-boundary behavior cheaply.
    pub fn with_shard_count(shard_count: usize) -> ShardedIndex {
        ShardedIndex {
            shard_count,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a collection if it is not already present. Idempotent.
    pub fn ensure_collection(&self, collection: &str) {
        let exists = self.collections.read().contains_key(collection);
        if exists {
            return;
        }
        let mut collections = self.collections.write();
        collections
            .entry(collection.to_string())
            .or_insert_with(|| CollectionShards::new(self.shard_count));
    }

    /// Removes a collection entirely. Callers must have already verified
    /// it is empty; this does not check.
    pub fn remove_collection(&self, collection: &str) {
        self.collections.write().remove(collection);
    }

    /// True if the collection has been registered.
    pub fn has_collection(&self, collection: &str) -> bool {
        self.collections.read().contains_key(collection)
    }

    /// Publishes a new version, replacing whatever version previously
    /// occupied that doc-id's slot. Registers the collection if absent.
    pub fn publish(&self, collection: &str, version: DocumentVersion) {
        self.ensure_collection(collection);
        let collections = self.collections.read();
        let shards = collections
            .get(collection)
            .expect("just ensured collection exists");
        let mut shard = shards.shard_for(version.doc_id).write();
        shard.insert(version.doc_id.0, version);
    }

    /// Returns the version visible to `snapshot`, if any, applying the
    /// standard visibility rule.
    pub fn get(
        &self,
        collection: &str,
        doc_id: DocId,
        snapshot: TxId,
    ) -> Option<DocumentVersion> {
        let collections = self.collections.read();
        let shards = collections.get(collection)?;
        let shard = shards.shard_for(doc_id).read();
        shard
            .get(&doc_id.0)
            .filter(|v| v.visible_at(snapshot))
            .copied()
    }

    /// Returns the raw current version regardless of visibility, used by
    /// the validator/healer/compactor which operate on physical state
    /// rather than a reader's snapshot.
    pub fn get_raw(&self, collection: &str, doc_id: DocId) -> Option<DocumentVersion> {
        let collections = self.collections.read();
        let shards = collections.get(collection)?;
        let shard = shards.shard_for(doc_id).read();
        shard.get(&doc_id.0).copied()
    }

    /// Removes a single doc-id's entry entirely, used by the compactor
    /// to drop tombstones once their bytes have been reclaimed.
    pub fn remove(&self, collection: &str, doc_id: DocId) {
        let collections = self.collections.read();
        let Some(shards) = collections.get(collection) else {
            return;
        };
        shards.shard_for(doc_id).write().remove(&doc_id.0);
    }

    /// Live and tombstoned counts summed across every registered
    /// collection.
    pub fn total_counts(&self) -> (usize, usize) {
        let names = self.collection_names();
        let mut live = 0;
        let mut tombstoned = 0;
        for name in names {
            live += self.live_count(&name);
            tombstoned += self.tombstoned_count(&name);
        }
        (live, tombstoned)
    }

    /// Number of live (non-tombstone) versions in `collection`.
    pub fn live_count(&self, collection: &str) -> usize {
        let collections = self.collections.read();
        match collections.get(collection) {
            Some(shards) => shards
                .shards
                .iter()
                .map(|s| s.read().values().filter(|v| v.is_live()).count())
                .sum(),
            None => 0,
        }
    }

    /// Number of tombstoned versions in `collection`.
    pub fn tombstoned_count(&self, collection: &str) -> usize {
        let collections = self.collections.read();
        match collections.get(collection) {
            Some(shards) => shards
                .shards
                .iter()
                .map(|s| s.read().values().filter(|v| !v.is_live()).count())
                .sum(),
            None => 0,
        }
    }

    /// Names of all registered collections.
    pub fn collection_names(&self) -> Vec<String> {
        self.collections.read().keys().cloned().collect()
    }

    /// Iterates every collection, then every shard within it, invoking
    /// `f` with a snapshot of each shard's versions. Each shard is
    /// cloned out from under its lock before the callback runs so that
    /// `f` never executes while holding a shard lock.
    pub fn for_each_collection<F>(&self, mut f: F)
    where
        F: FnMut(&str, &[DocumentVersion]),
    {
        let names = self.collection_names();
        for name in names {
            let collections = self.collections.read();
            let Some(shards) = collections.get(&name) else {
                continue;
            };
            let mut snapshot = Vec::new();
            for shard in &shards.shards {
                snapshot.extend(shard.read().values().copied());
            }
            drop(collections);
            f(&name, &snapshot);
        }
    }
}

impl Default for ShardedIndex {
    fn default() -> ShardedIndex {
        ShardedIndex::new()
    }
}
