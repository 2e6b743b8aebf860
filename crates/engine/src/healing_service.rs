//! Ties the validator and healer into a running service: a background
//! scan on a timer (driven externally, see [`HealingService::interval`]),
//! an on-read-corruption hook, and a worker pool fan-out for batches of
//! repairs. Individual healing failures are logged and counted, never
//! retried synchronously.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::config::HealingSettings;
use crate::healer;
use crate::partition::Partition;
use crate::validator::{self, Health};
use crate::worker_pool::WorkerPool;

/// Running counters and timestamps for one partition's healing activity.
#[derive(Debug, Clone, Default)]
pub struct HealingStats {
    /// Number of completed validator scans.
    pub scans: u64,
    /// Successful synchronous heals triggered by a corrupt read.
    pub on_demand_healings: u64,
    /// Successful heals dispatched from a background scan.
    pub background_healings: u64,
    /// Heal attempts (either path) that failed.
    pub failures: u64,
    /// When the most recent scan completed.
    pub last_scan: Option<DateTime<Utc>>,
    /// When the most recent background heal completed.
    pub last_background_heal: Option<DateTime<Utc>>,
}

/// The capability set `{validate_all, heal}` wired into a schedulable
/// service, per partition.
pub struct HealingService {
    settings: HealingSettings,
    stats: Mutex<HealingStats>,
}

impl HealingService {
    /// Builds a service from config; `enabled()`/`interval()` are
    /// consulted by the caller's scheduling loop.
    pub fn new(settings: HealingSettings) -> HealingService {
        HealingService {
            settings,
            stats: Mutex::new(HealingStats::default()),
        }
    }

    /// Whether the healing service is configured on at all.
    pub fn enabled(&self) -> bool {
        self.settings.enabled
    }

    /// The interval between background scans.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.settings.interval_secs)
    }

    /// A snapshot of the current counters.
    pub fn stats(&self) -> HealingStats {
        self.stats.lock().clone()
    }

    /// Attempts a synchronous heal in response to a read surfacing
    /// `CorruptRecord`, if `healing.on_read_corruption` is enabled.
    /// Returns whether the heal succeeded; the caller is expected to
    /// retry its read afterward.
    pub fn try_heal_on_read(&self, partition: &Partition, collection: &str, doc_id: u64) -> bool {
        if !self.settings.on_read_corruption {
            return false;
        }
        let mut stats = self.stats.lock();
        match healer::heal(partition, collection, doc_id) {
            Ok(()) => {
                stats.on_demand_healings += 1;
                true
            }
            Err(_) => {
                stats.failures += 1;
                false
            }
        }
    }

    /// Validates every live document in `partition`, then dispatches up
    /// to `healing.max_batch_size` repairs across `pool`. Each repair
    /// runs independently; a failure is logged and counted but never
    /// blocks the rest of the batch.
    pub fn run_background_scan(self: &Arc<HealingService>, partition: Arc<Partition>, pool: &WorkerPool) {
        let report = validator::validate_all(&partition);
        let mut corrupt: Vec<(String, u64)> = report
            .into_iter()
            .filter(|(_, health)| matches!(health, Health::Corrupt(_)))
            .map(|(key, _)| key)
            .collect();
        corrupt.truncate(self.settings.max_batch_size);

        {
            let mut stats = self.stats.lock();
            stats.scans += 1;
            stats.last_scan = Some(Utc::now());
        }

        for (collection, doc_id) in corrupt {
            let service = Arc::clone(self);
            let partition = Arc::clone(&partition);
            let submitted = pool.submit(move || match healer::heal(&partition, &collection, doc_id) {
                Ok(()) => {
                    let mut stats = service.stats.lock();
                    stats.background_healings += 1;
                    stats.last_background_heal = Some(Utc::now());
                }
                Err(err) => {
                    tracing::error!(collection = %collection, doc_id, error = %err, "background heal failed");
                    service.stats.lock().failures += 1;
                }
            });
            if submitted.is_err() {
                tracing::warn!("healing worker pool rejected a scheduled repair; it will be retried on the next scan");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use docdb_concurrency::TransactionManager;
    use docdb_core::{DocId, OpType, PartitionId};
    use tempfile::tempdir;

    fn make_partition(uuid: [u8; 16]) -> (tempfile::TempDir, Partition) {
        let dir = tempdir().unwrap();
        let partition = Partition::open(PartitionId(0), dir.path(), "t1".to_string(), uuid, &DatabaseConfig::default())
            .unwrap();
        (dir, partition)
    }

    #[test]
    fn on_read_corruption_disabled_by_default_does_nothing() {
        let (_dir, partition) = make_partition([20u8; 16]);
        let service = HealingService::new(HealingSettings::default());
        assert!(!service.try_heal_on_read(&partition, "_default", 1));
        assert_eq!(service.stats().on_demand_healings, 0);
    }

    #[test]
    fn on_read_corruption_enabled_heals_and_counts() {
        let (_dir, partition) = make_partition([21u8; 16]);
        let mgr = TransactionManager::new();
        let tx = mgr.begin();
        mgr.add_op(tx, "_default", OpType::Create, 1, br#"{"v":1}"#.to_vec());
        mgr.commit(tx, |t| partition.apply_commit(t)).unwrap();

        let version = partition.index().get_raw("_default", DocId(1)).unwrap();
        partition.corrupt_for_test(version.offset, version.length).unwrap();

        let mut settings = HealingSettings::default();
        settings.on_read_corruption = true;
        let service = HealingService::new(settings);

        assert!(service.try_heal_on_read(&partition, "_default", 1));
        assert_eq!(service.stats().on_demand_healings, 1);
    }

    #[test]
    fn background_scan_heals_corrupt_documents_via_the_pool() {
        let (_dir, partition) = make_partition([22u8; 16]);
        let mgr = TransactionManager::new();
        let tx = mgr.begin();
        mgr.add_op(tx, "_default", OpType::Create, 1, br#"{"v":1}"#.to_vec());
        mgr.commit(tx, |t| partition.apply_commit(t)).unwrap();

        let version = partition.index().get_raw("_default", DocId(1)).unwrap();
        partition.corrupt_for_test(version.offset, version.length).unwrap();

        let mut settings = HealingSettings::default();
        settings.max_batch_size = 10;
        let service = Arc::new(HealingService::new(settings));
        let pool = WorkerPool::new(2, 16);
        let partition = Arc::new(partition);

        service.run_background_scan(Arc::clone(&partition), &pool);
        pool.shutdown();

        assert_eq!(service.stats().background_healings, 1);
        assert_eq!(service.stats().scans, 1);
    }
}
