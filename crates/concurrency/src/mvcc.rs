//! The MVCC transaction-id counter. Not internally synchronized: the
//! caller (the commit mutex in [`crate::manager::TransactionManager`])
//! serializes every mutation.

use docdb_core::TxId;

/// A monotonic transaction-id counter and snapshot source.
#[derive(Debug, Clone, Copy)]
pub struct Mvcc {
    counter: u64,
}

impl Mvcc {
    /// Starts a fresh counter at zero: no transaction has committed yet.
    pub fn new() -> Mvcc {
        Mvcc { counter: 0 }
    }

    /// Restores a counter to a known value, used after recovery once the
    /// highest transaction id in the WAL is known.
    pub fn with_counter(counter: u64) -> Mvcc {
        Mvcc { counter }
    }

    /// Returns the current counter value and increments it, allocating a
    /// fresh transaction id.
    pub fn next_tx(&mut self) -> TxId {
        let id = self.counter;
        self.counter += 1;
        TxId(id)
    }

    /// The greatest committed transaction id: `counter - 1`. A reader
    /// beginning now may see the effects of every commit up to and
    /// including this value.
    pub fn current_snapshot(&self) -> TxId {
        TxId(self.counter.saturating_sub(1))
    }

    /// The raw counter value (next id to be allocated).
    pub fn counter(&self) -> u64 {
        self.counter
    }
}

impl Default for Mvcc {
    fn default() -> Mvcc {
        Mvcc::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_tx_is_monotonic_and_snapshot_trails_by_one() {
        let mut mvcc = Mvcc::new();
        let a = mvcc.next_tx();
        let b = mvcc.next_tx();
        assert_eq!(a, TxId(0));
        assert_eq!(b, TxId(1));
        assert_eq!(mvcc.current_snapshot(), TxId(1));
    }

    #[test]
    fn restored_counter_resumes_where_recovery_left_off() {
        let mut mvcc = Mvcc::with_counter(42);
        assert_eq!(mvcc.next_tx(), TxId(42));
        assert_eq!(mvcc.counter(), 43);
    }
}
