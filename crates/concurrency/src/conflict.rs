//! The SSI-lite conflict predicate: a transaction conflicts with a
//! committed record if their read/write sets intersect in either
//! direction.

use crate::commit_history::CommitRecord;
use std::collections::HashSet;

/// True if `(our_read, our_write)` conflicts with any record yielded by
/// `history`: `(our_read ∩ their_write) ∪ (our_write ∩ their_read) ≠ ∅`.
pub fn conflicts<'a>(
    our_read: &HashSet<(String, u64)>,
    our_write: &HashSet<(String, u64)>,
    history: impl Iterator<Item = &'a CommitRecord>,
) -> bool {
    for committed in history {
        if our_read.iter().any(|k| committed.write_set.contains(k)) {
            return true;
        }
        if our_write.iter().any(|k| committed.read_set.contains(k)) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(pairs: &[(&str, u64)]) -> HashSet<(String, u64)> {
        pairs.iter().map(|(c, d)| (c.to_string(), *d)).collect()
    }

    #[test]
    fn read_write_intersection_is_a_conflict() {
        let our_read = set(&[("_default", 1)]);
        let our_write = set(&[]);
        let history = vec![CommitRecord {
            tx_id: 5,
            read_set: set(&[]),
            write_set: set(&[("_default", 1)]),
        }];
        assert!(conflicts(&our_read, &our_write, history.iter()));
    }

    #[test]
    fn write_read_intersection_is_a_conflict() {
        let our_read = set(&[]);
        let our_write = set(&[("_default", 2)]);
        let history = vec![CommitRecord {
            tx_id: 5,
            read_set: set(&[("_default", 2)]),
            write_set: set(&[]),
        }];
        assert!(conflicts(&our_read, &our_write, history.iter()));
    }

    #[test]
    fn disjoint_sets_do_not_conflict() {
        let our_read = set(&[("_default", 1)]);
        let our_write = set(&[("_default", 2)]);
        let history = vec![CommitRecord {
            tx_id: 5,
            read_set: set(&[("_default", 3)]),
            write_set: set(&[("_default", 4)]),
        }];
        assert!(!conflicts(&our_read, &our_write, history.iter()));
    }

    #[test]
    fn empty_history_never_conflicts() {
        let our_read = set(&[("_default", 1)]);
        let our_write = set(&[("_default", 2)]);
        assert!(!conflicts(&our_read, &our_write, std::iter::empty()));
    }
}
