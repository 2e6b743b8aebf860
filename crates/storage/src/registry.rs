//! Collection name validation and metadata tracking. The reserved
//! `_default` collection is pre-registered and can never be deleted.

use chrono::{DateTime, Utc};
use docdb_core::{validate_collection_name, Error};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::info;

const DEFAULT_COLLECTION: &str = "_default";

/// Metadata tracked per collection.
#[derive(Debug, Clone)]
pub struct CollectionMeta {
    /// Collection name.
    pub name: String,
    /// When the collection was created.
    pub created_at: DateTime<Utc>,
    /// Cached live document count, maintained incrementally by the write
    /// path via `increment_doc_count`/`decrement_doc_count`.
    pub doc_count: usize,
}

/// Tracks collection existence and metadata for one partition.
pub struct CollectionRegistry {
    collections: RwLock<HashMap<String, CollectionMeta>>,
}

impl CollectionRegistry {
    /// Builds a registry with the reserved `_default` collection already
    /// present.
    pub fn new() -> CollectionRegistry {
        let mut map = HashMap::new();
        map.insert(
            DEFAULT_COLLECTION.to_string(),
            CollectionMeta {
                name: DEFAULT_COLLECTION.to_string(),
                created_at: Utc::now(),
                doc_count: 0,
            },
        );
        CollectionRegistry {
            collections: RwLock::new(map),
        }
    }

    /// Validates `name`, normalizing empty to `_default`, and registers
    /// it if not already present. Returns `CollectionExists` if it is.
    pub fn create(&self, name: &str) -> Result<String, Error> {
        let normalized = validate_collection_name(name)?;
        let mut collections = self.collections.write();
        if collections.contains_key(&normalized) {
            return Err(Error::CollectionExists(normalized));
        }
        collections.insert(
            normalized.clone(),
            CollectionMeta {
                name: normalized.clone(),
                created_at: Utc::now(),
                doc_count: 0,
            },
        );
        info!(collection = %normalized, "collection created");
        Ok(normalized)
    }

    /// Ensures `name` is registered without failing if it already is;
    /// used on the implicit-create write path and during WAL replay of
    /// `CreateCollection`.
    pub fn ensure(&self, name: &str) -> Result<String, Error> {
        let normalized = validate_collection_name(name)?;
        let mut collections = self.collections.write();
        collections.entry(normalized.clone()).or_insert_with(|| CollectionMeta {
            name: normalized.clone(),
            created_at: Utc::now(),
            doc_count: 0,
        });
        Ok(normalized)
    }

    /// Deletes a collection. Fails with `CollectionNotFound` if absent,
    /// `CollectionNotEmpty` if `doc_count > 0`, and refuses to delete
    /// `_default` with the same `CollectionNotEmpty` framing since the
    /// reserved collection is never considered a valid delete target.
    pub fn delete(&self, name: &str) -> Result<(), Error> {
        let normalized = validate_collection_name(name)?;
        if normalized == DEFAULT_COLLECTION {
            return Err(Error::CollectionNotEmpty(normalized));
        }
        let mut collections = self.collections.write();
        match collections.get(&normalized) {
            None => Err(Error::CollectionNotFound(normalized)),
            Some(meta) if meta.doc_count > 0 => {
                Err(Error::CollectionNotEmpty(normalized))
            }
            Some(_) => {
                collections.remove(&normalized);
                info!(collection = %normalized, "collection deleted");
                Ok(())
            }
        }
    }

    /// True if `name` is registered.
    pub fn exists(&self, name: &str) -> bool {
        self.collections.read().contains_key(name)
    }

    /// Copies out the metadata for `name`, if registered.
    pub fn metadata(&self, name: &str) -> Option<CollectionMeta> {
        self.collections.read().get(name).cloned()
    }

    /// Lists metadata for every registered collection.
    pub fn list(&self) -> Vec<CollectionMeta> {
        self.collections.read().values().cloned().collect()
    }

    /// Increments the cached doc count for `name` by one, registering
    /// the collection first if it is not already present.
    pub fn increment_doc_count(&self, name: &str) {
        let mut collections = self.collections.write();
        let entry = collections.entry(name.to_string()).or_insert_with(|| CollectionMeta {
            name: name.to_string(),
            created_at: Utc::now(),
            doc_count: 0,
        });
        entry.doc_count += 1;
    }

    /// Decrements the cached doc count for `name` by one, saturating at
    /// zero rather than underflowing.
    pub fn decrement_doc_count(&self, name: &str) {
        let mut collections = self.collections.write();
        if let Some(entry) = collections.get_mut(name) {
            entry.doc_count = entry.doc_count.saturating_sub(1);
        }
    }
}

impl Default for CollectionRegistry {
    fn default() -> CollectionRegistry {
        CollectionRegistry::new()
    }
}
