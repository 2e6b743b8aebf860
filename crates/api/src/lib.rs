//! The embeddable client facade: a single [`Engine`] process hosting
//! any number of named logical databases under one data directory,
//! each one a `docdb-engine` [`Database`](docdb_engine::Database)
//! opened lazily and kept resident until closed or the `Engine` drops.

#![warn(missing_docs)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use docdb_core::Error;
use docdb_engine::{Database, DatabaseStats};
use parking_lot::RwLock;

/// Hosts every open database under a single root directory. Each
/// database lives in its own subdirectory named after it.
pub struct Engine {
    root: PathBuf,
    databases: RwLock<HashMap<String, Arc<Database>>>,
}

impl Engine {
    /// Opens an engine rooted at `root`, creating the directory if
    /// absent. No databases are opened yet; use [`Self::database`] or
    /// [`Self::create_database`] to open one.
    pub fn open(root: impl AsRef<Path>) -> Result<Engine, Error> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|source| Error::FileOpen {
            path: root.display().to_string(),
            source,
        })?;
        Ok(Engine {
            root,
            databases: RwLock::new(HashMap::new()),
        })
    }

    /// The root directory this engine manages.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the named database, opening it from disk on first
    /// access if it already exists there but hasn't been opened in
    /// this process yet. Fails if no such database exists.
    pub fn database(&self, name: &str) -> Result<Arc<Database>, Error> {
        if let Some(db) = self.databases.read().get(name) {
            return Ok(Arc::clone(db));
        }
        let dir = self.root.join(name);
        if !dir.exists() {
            return Err(Error::DBNotOpen);
        }
        self.open_and_cache(name, &dir)
    }

    /// Opens (creating if absent) the named database and returns a
    /// handle to it.
    pub fn create_database(&self, name: &str) -> Result<Arc<Database>, Error> {
        if let Some(db) = self.databases.read().get(name) {
            return Ok(Arc::clone(db));
        }
        let dir = self.root.join(name);
        self.open_and_cache(name, &dir)
    }

    fn open_and_cache(&self, name: &str, dir: &Path) -> Result<Arc<Database>, Error> {
        let mut databases = self.databases.write();
        if let Some(db) = databases.get(name) {
            return Ok(Arc::clone(db));
        }
        let db = Arc::new(Database::open(name, dir)?);
        databases.insert(name.to_string(), Arc::clone(&db));
        Ok(db)
    }

    /// The names of every database opened in this process so far.
    pub fn open_databases(&self) -> Vec<String> {
        self.databases.read().keys().cloned().collect()
    }

    /// Closes and forgets the named database. A later call to
    /// [`Self::database`] or [`Self::create_database`] reopens it from
    /// disk.
    pub fn close_database(&self, name: &str) {
        if let Some(db) = self.databases.write().remove(name) {
            db.close();
        }
    }

    /// Per-database diagnostics for every currently open database.
    pub fn stats(&self) -> HashMap<String, DatabaseStats> {
        self.databases
            .read()
            .iter()
            .map(|(name, db)| (name.clone(), db.stats()))
            .collect()
    }

    /// Closes every open database.
    pub fn close_all(&self) {
        let mut databases = self.databases.write();
        for (_, db) in databases.drain() {
            db.close();
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn opening_an_unknown_database_fails() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        assert!(matches!(engine.database("nope"), Err(Error::DBNotOpen)));
    }

    #[test]
    fn create_database_then_reuse_the_cached_handle() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        let db = engine.create_database("orders").unwrap();
        db.create("_default", 1, br#"{"v":1}"#).unwrap();

        let same = engine.database("orders").unwrap();
        assert_eq!(same.get("_default", 1).unwrap().unwrap(), br#"{"v":1}"#);
    }

    #[test]
    fn closing_a_database_allows_it_to_be_reopened_from_disk() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        {
            let db = engine.create_database("orders").unwrap();
            db.create("_default", 1, br#"{"v":1}"#).unwrap();
        }
        engine.close_database("orders");
        assert!(engine.open_databases().is_empty());

        let db = engine.database("orders").unwrap();
        assert_eq!(db.get("_default", 1).unwrap().unwrap(), br#"{"v":1}"#);
    }
}
