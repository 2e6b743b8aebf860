//! The two-pass WAL recovery algorithm: find the latest checkpoint, then
//! replay from there, buffering records per transaction and applying
//! only those whose transaction has a matching `Commit` record.
//!
//! This module only decodes the WAL; it has no knowledge of the data
//! file or the index. `docdb-engine`'s recovery path consumes a
//! [`RecoveryResult`] and performs the actual payload rewrite and index
//! publication described in the recovery algorithm.

use crate::reader::WalReader;
use docdb_core::{Error, OpType};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::format::WalRecord;

/// All of one transaction's buffered data records, in arrival order,
/// ready to be applied by the engine.
#[derive(Debug, Clone)]
pub struct RecoveredTransaction {
    /// The transaction id.
    pub tx_id: u64,
    /// Data records (`Create`/`Update`/`Delete`/`Patch`/
    /// `CreateCollection`/`DeleteCollection`) in the order they were
    /// written.
    pub records: Vec<WalRecord>,
}

/// The outcome of replaying one partition's WAL.
#[derive(Debug, Clone, Default)]
pub struct RecoveryResult {
    /// Committed transactions, in commit-marker order — the order write
    /// visibility must be reconstructed in.
    pub committed: Vec<RecoveredTransaction>,
    /// The highest transaction id observed anywhere in the WAL (data
    /// record, commit marker, or checkpoint). The MVCC counter is
    /// restored to `max_tx_id + 1` after recovery.
    pub max_tx_id: u64,
    /// The checkpoint transaction id that bounded this replay, if any.
    pub checkpoint_tx_id: Option<u64>,
    /// Transactions that left data records in this WAL with no local
    /// `Commit` marker. Ordinarily these are abandoned (the writer never
    /// finished), but a cross-partition transaction whose coordinator
    /// decision was "commit" must still be applied from here even
    /// though this partition never got to write its own marker.
    pub pending: Vec<RecoveredTransaction>,
}

/// Replays the WAL at `wal_dir` and returns the committed transactions
/// ready for application. A mid-stream WAL CRC failure (an interior
/// corrupt record) propagates as `Err` and the database must refuse to
/// open; a partial trailing record is silently treated as absent.
pub fn recover(wal_dir: &Path, database_uuid: [u8; 16]) -> Result<RecoveryResult, Error> {
    info!(wal_dir = %wal_dir.display(), "starting WAL recovery");
    let checkpoint_tx_id = find_latest_checkpoint(wal_dir, database_uuid)?;
    let skip_below = checkpoint_tx_id.unwrap_or(0);
    if let Some(checkpoint_tx_id) = checkpoint_tx_id {
        info!(checkpoint_tx_id, "replay bounded by checkpoint");
    }

    let mut reader = WalReader::open(wal_dir, database_uuid)?;
    let mut buffers: HashMap<u64, Vec<WalRecord>> = HashMap::new();
    let mut commit_order: Vec<u64> = Vec::new();
    let mut max_tx_id: u64 = 0;

    while let Some(record) = reader.next_record()? {
        max_tx_id = max_tx_id.max(record.tx_id);
        if record.tx_id < skip_below {
            continue;
        }
        match record.op_type {
            OpType::Commit => commit_order.push(record.tx_id),
            OpType::Checkpoint => {}
            _ => buffers.entry(record.tx_id).or_default().push(record),
        }
    }

    let mut committed = Vec::new();
    for tx_id in commit_order {
        if let Some(records) = buffers.remove(&tx_id) {
            committed.push(RecoveredTransaction { tx_id, records });
        }
    }

    let mut pending: Vec<RecoveredTransaction> = buffers
        .into_iter()
        .map(|(tx_id, records)| RecoveredTransaction { tx_id, records })
        .collect();
    pending.sort_by_key(|tx| tx.tx_id);

    if !pending.is_empty() {
        warn!(
            pending = pending.len(),
            "WAL recovery found transactions with no local commit marker"
        );
    }
    info!(
        wal_dir = %wal_dir.display(),
        committed = committed.len(),
        max_tx_id,
        "WAL recovery complete"
    );

    Ok(RecoveryResult {
        committed,
        max_tx_id,
        checkpoint_tx_id,
        pending,
    })
}

fn find_latest_checkpoint(wal_dir: &Path, database_uuid: [u8; 16]) -> Result<Option<u64>, Error> {
    let mut reader = WalReader::open(wal_dir, database_uuid)?;
    let mut latest: Option<u64> = None;
    while let Some(record) = reader.next_record()? {
        if record.op_type == OpType::Checkpoint {
            latest = Some(latest.map_or(record.tx_id, |l| l.max(record.tx_id)));
        }
    }
    Ok(latest)
}
