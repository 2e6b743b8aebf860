//! Per-database memory accounting: a byte budget that write paths must
//! reserve against before copying a payload into durable storage, and
//! release on failure or when the version they backed is dropped.

use docdb_core::Error;
use parking_lot::Mutex;

/// A reserve-before-write byte budget for one database.
pub struct MemoryBudget {
    limit: usize,
    used: Mutex<usize>,
}

impl MemoryBudget {
    /// Builds a budget with the given byte limit.
    pub fn new(limit_bytes: usize) -> MemoryBudget {
        MemoryBudget {
            limit: limit_bytes,
            used: Mutex::new(0),
        }
    }

    /// Reserves `bytes` against the budget. Fails with
    /// `Error::MemoryLimit` without mutating state if the request would
    /// exceed the configured limit.
    pub fn reserve(&self, bytes: usize) -> Result<(), Error> {
        let mut used = self.used.lock();
        let available = self.limit.saturating_sub(*used);
        if bytes > available {
            return Err(Error::MemoryLimit {
                requested: bytes,
                available,
            });
        }
        *used += bytes;
        Ok(())
    }

    /// Releases a previously reserved amount, e.g. after a failed write
    /// or a compacted-away version. Saturates at zero rather than
    /// underflowing if called more than the matching reserve.
    pub fn release(&self, bytes: usize) {
        let mut used = self.used.lock();
        *used = used.saturating_sub(bytes);
    }

    /// Bytes currently reserved.
    pub fn used(&self) -> usize {
        *self.used.lock()
    }

    /// The configured limit.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_within_limit_succeeds_and_tracks_usage() {
        let budget = MemoryBudget::new(100);
        budget.reserve(40).unwrap();
        assert_eq!(budget.used(), 40);
    }

    #[test]
    fn reserve_beyond_limit_fails_without_mutating_state() {
        let budget = MemoryBudget::new(100);
        budget.reserve(60).unwrap();
        let err = budget.reserve(50).unwrap_err();
        assert!(matches!(err, Error::MemoryLimit { requested: 50, available: 40 }));
        assert_eq!(budget.used(), 60);
    }

    #[test]
    fn release_frees_capacity_for_future_reservations() {
        let budget = MemoryBudget::new(100);
        budget.reserve(80).unwrap();
        budget.release(80);
        assert_eq!(budget.used(), 0);
        budget.reserve(90).unwrap();
    }

    #[test]
    fn release_saturates_at_zero() {
        let budget = MemoryBudget::new(100);
        budget.release(50);
        assert_eq!(budget.used(), 0);
    }
}
