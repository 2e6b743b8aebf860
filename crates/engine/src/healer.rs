//! Repairs one corrupt document by replaying the partition's own WAL:
//! the newest committed-looking `Create`/`Update`/`Patch` record for
//! that `(collection, doc_id)` with a non-empty payload is re-appended
//! to the data file and republished, under the transaction id it was
//! originally written with.

use docdb_core::{Error, TxId};
use docdb_durability::{WalReader, WalRecord};

use crate::partition::Partition;

/// Heals `(collection, doc_id)` in `partition` from WAL history.
/// Fails with `DocNotFound` if the WAL holds no matching payload-bearing
/// record, and otherwise with whatever I/O error interrupted the scan
/// or the repair append.
pub fn heal(partition: &Partition, collection: &str, doc_id: u64) -> Result<(), Error> {
    let replacement = newest_replacement(partition, collection, doc_id)?;
    let Some(record) = replacement else {
        return Err(Error::DocNotFound {
            collection: collection.to_string(),
            doc_id,
        });
    };
    partition.heal_with_payload(collection, doc_id, TxId(record.tx_id), &record.payload)?;
    Ok(())
}

fn newest_replacement(
    partition: &Partition,
    collection: &str,
    doc_id: u64,
) -> Result<Option<WalRecord>, Error> {
    let mut reader = WalReader::open(&partition.wal_dir(), partition.database_uuid())?;
    let mut newest: Option<WalRecord> = None;
    while let Some(record) = reader.next_record()? {
        if record.collection != collection || record.doc_id != doc_id {
            continue;
        }
        if !record.op_type.is_payload_bearing() || record.payload.is_empty() {
            continue;
        }
        newest = Some(record);
    }
    Ok(newest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use docdb_concurrency::TransactionManager;
    use docdb_core::{DocId, OpType, PartitionId};
    use tempfile::tempdir;

    #[test]
    fn heals_the_latest_payload_after_corruption() {
        let dir = tempdir().unwrap();
        let partition =
            Partition::open(PartitionId(0), dir.path(), "t1".to_string(), [11u8; 16], &DatabaseConfig::default())
                .unwrap();
        let mgr = TransactionManager::new();

        let tx1 = mgr.begin();
        mgr.add_op(tx1, "_default", OpType::Create, 9, br#"{"v":1}"#.to_vec());
        mgr.commit(tx1, |t| partition.apply_commit(t)).unwrap();

        let tx2 = mgr.begin();
        mgr.add_op(tx2, "_default", OpType::Update, 9, br#"{"v":2}"#.to_vec());
        mgr.commit(tx2, |t| partition.apply_commit(t)).unwrap();

        let version = partition.index().get_raw("_default", DocId(9)).unwrap();
        partition.corrupt_for_test(version.offset, version.length).unwrap();

        let latest = mgr.begin();
        assert!(partition.read("_default", 9, latest).is_err());

        heal(&partition, "_default", 9).unwrap();

        let latest = mgr.begin();
        let healed = partition.read("_default", 9, latest).unwrap().unwrap();
        assert_eq!(healed, br#"{"v":2}"#);
    }

    #[test]
    fn healing_an_unknown_document_fails_with_doc_not_found() {
        let dir = tempdir().unwrap();
        let partition =
            Partition::open(PartitionId(0), dir.path(), "t1".to_string(), [12u8; 16], &DatabaseConfig::default())
                .unwrap();
        let err = heal(&partition, "_default", 404).unwrap_err();
        assert!(matches!(err, Error::DocNotFound { .. }));
    }
}
