//! Property-based check that compaction never changes a live document's
//! payload, only where it is stored.

use docdb_engine::Database;
use proptest::collection::vec as pvec;
use proptest::prelude::*;
use tempfile::tempdir;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn compaction_preserves_every_live_payload(
        doc_count in 2u64..40,
        deletions in pvec(0u64..40, 0..20),
    ) {
        let dir = tempdir().unwrap();
        let db = Database::open("t1", dir.path()).unwrap();

        for i in 0..doc_count {
            db.create("_default", i, format!(r#"{{"i":{i}}}"#).as_bytes()).unwrap();
        }
        let mut deleted = std::collections::HashSet::new();
        for id in deletions {
            if id < doc_count && deleted.insert(id) {
                db.delete("_default", id).unwrap();
            }
        }

        db.compact_all().unwrap();

        for i in 0..doc_count {
            let value = db.get("_default", i).unwrap();
            if deleted.contains(&i) {
                prop_assert!(value.is_none());
            } else {
                let parsed: serde_json::Value = serde_json::from_slice(&value.unwrap()).unwrap();
                prop_assert_eq!(parsed, serde_json::json!({"i": i}));
            }
        }
    }
}
