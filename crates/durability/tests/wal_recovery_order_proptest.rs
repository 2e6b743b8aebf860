//! Property-based checks on WAL recovery: committed transactions come
//! back in commit-marker order with their records in arrival order,
//! and a transaction whose commit marker was never written leaves no
//! observable trace.

use docdb_core::OpType;
use docdb_durability::recovery::recover;
use docdb_durability::{WalConfig, WalRecord, WalWriter};
use proptest::collection::vec as pvec;
use proptest::prelude::*;

fn data_record(tx_id: u64, doc_id: u64) -> WalRecord {
    WalRecord {
        tx_id,
        db_id: "t1".to_string(),
        collection: "_default".to_string(),
        op_type: OpType::Create,
        doc_id,
        payload: format!(r#"{{"doc":{doc_id}}}"#).into_bytes(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn committed_transactions_replay_in_commit_marker_order_with_records_intact(
        // Each entry: (tx_id, number of data records, committed?).
        plan in pvec((1u64..500, 1usize..5, any::<bool>()), 1..20),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let uuid = [3u8; 16];

        // De-duplicate tx ids (real transaction ids are unique) while
        // keeping the generated commit order.
        let mut seen = std::collections::HashSet::new();
        let plan: Vec<_> = plan.into_iter().filter(|(tx, _, _)| seen.insert(*tx)).collect();

        let mut expected_order = Vec::new();
        {
            let mut writer = WalWriter::open(dir.path(), uuid, WalConfig::default()).unwrap();
            for (tx_id, record_count, committed) in &plan {
                for i in 0..*record_count as u64 {
                    writer.append(&data_record(*tx_id, *tx_id * 1000 + i)).unwrap();
                }
                if *committed {
                    writer.write_commit_marker(*tx_id).unwrap();
                    expected_order.push((*tx_id, *record_count));
                }
            }
            writer.close().unwrap();
        }

        let result = recover(dir.path(), uuid).unwrap();

        let actual_order: Vec<(u64, usize)> = result
            .committed
            .iter()
            .map(|tx| (tx.tx_id, tx.records.len()))
            .collect();
        prop_assert_eq!(actual_order, expected_order);

        for tx in &result.committed {
            for (i, record) in tx.records.iter().enumerate() {
                prop_assert_eq!(record.doc_id, tx.tx_id * 1000 + i as u64);
            }
        }

        let max_tx = plan.iter().map(|(tx, _, _)| *tx).max().unwrap_or(0);
        prop_assert_eq!(result.max_tx_id, max_tx);
    }
}
