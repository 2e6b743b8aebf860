//! Durable record of 2PC decisions for cross-partition transactions. A
//! single 13-byte CRC-checked record per transaction is sufficient to
//! disambiguate in-doubt transactions at recovery without coordination.

use crate::format::{CoordinatorRecord, COORDINATOR_RECORD_SIZE};
use docdb_core::Error;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// The append-only, database-wide coordinator log.
pub struct CoordinatorLog {
    file: File,
    path: PathBuf,
}

impl CoordinatorLog {
    /// Opens (creating if absent) the coordinator log at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<CoordinatorLog, Error> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|source| Error::FileOpen {
                path: path.display().to_string(),
                source,
            })?;
        Ok(CoordinatorLog { file, path })
    }

    /// Appends a decision for `tx_id` and fsyncs before returning. This
    /// must complete before any partition WAL receives a Commit/Abort
    /// referring to `tx_id`.
    pub fn append_decision(&mut self, tx_id: u64, commit: bool) -> Result<(), Error> {
        let record = CoordinatorRecord { tx_id, commit };
        self.file
            .write_all(&record.to_bytes())
            .map_err(|source| Error::FileWrite {
                path: self.path.display().to_string(),
                source,
            })?;
        self.file.sync_all().map_err(|source| Error::FileSync {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Streams the log, returning the decision for every transaction
    /// whose record has a matching CRC. Torn trailing records are
    /// silently dropped. A missing file yields an empty map.
    pub fn replay(path: impl AsRef<Path>) -> Result<HashMap<u64, bool>, Error> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let mut file = File::open(path).map_err(|source| Error::FileOpen {
            path: path.display().to_string(),
            source,
        })?;
        let mut decisions = HashMap::new();
        let mut buf = [0u8; COORDINATOR_RECORD_SIZE];
        loop {
            let mut read_total = 0usize;
            while read_total < COORDINATOR_RECORD_SIZE {
                let n = file
                    .read(&mut buf[read_total..])
                    .map_err(|source| Error::FileRead {
                        path: path.display().to_string(),
                        source,
                    })?;
                if n == 0 {
                    break;
                }
                read_total += n;
            }
            if read_total == 0 {
                break;
            }
            if read_total < COORDINATOR_RECORD_SIZE {
                // Torn trailing record: fewer than 13 bytes remain.
                break;
            }
            if let Some(record) = CoordinatorRecord::from_bytes(&buf) {
                decisions.insert(record.tx_id, record.commit);
            }
            // A complete-but-corrupt (CRC mismatch) record is also
            // silently dropped, matching the torn-tail tolerance: the
            // coordinator log has no interior-corruption fatal path
            // since each record stands alone.
        }
        Ok(decisions)
    }
}
