//! A fixed-size worker pool over a single bounded task queue, used to
//! dispatch partition-routed reads and writes.
//!
//! Workers dequeue in FIFO order. `submit` rejects with
//! `Error::QueueFull` once the queue is at capacity and with
//! `Error::PoolStopped` once `shutdown()` has been called.

use docdb_core::Error;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::error;

type Task = Box<dyn FnOnce() + Send>;

struct PoolInner {
    queue: Mutex<VecDeque<Task>>,
    work_ready: Condvar,
    shutdown: AtomicBool,
    capacity: usize,
}

/// A fixed-thread, bounded-queue task pool.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawns `worker_count` threads draining a queue bounded at
    /// `capacity` tasks.
    pub fn new(worker_count: usize, capacity: usize) -> WorkerPool {
        let inner = Arc::new(PoolInner {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            work_ready: Condvar::new(),
            shutdown: AtomicBool::new(false),
            capacity,
        });

        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let inner = Arc::clone(&inner);
            let handle = std::thread::Builder::new()
                .name(format!("docdb-worker-{i}"))
                .spawn(move || worker_loop(&inner))
                .expect("failed to spawn docdb worker thread");
            workers.push(handle);
        }

        WorkerPool {
            inner,
            workers: Mutex::new(workers),
        }
    }

    /// Submits a task. Rejects with `QueueFull` at capacity, or
    /// `PoolStopped` after `shutdown()`.
    pub fn submit(&self, task: impl FnOnce() + Send + 'static) -> Result<(), Error> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(Error::PoolStopped);
        }

        let mut queue = self.inner.queue.lock();
        if queue.len() >= self.inner.capacity {
            return Err(Error::QueueFull);
        }
        queue.push_back(Box::new(task));
        drop(queue);
        self.inner.work_ready.notify_one();
        Ok(())
    }

    /// Current queue depth.
    pub fn queue_depth(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Signals workers to exit once the queue drains, then joins them.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
        {
            let _queue = self.inner.queue.lock();
            self.inner.work_ready.notify_all();
        }
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(inner: &PoolInner) {
    loop {
        let task = {
            let mut queue = inner.queue.lock();
            loop {
                if let Some(task) = queue.pop_front() {
                    break task;
                }
                if inner.shutdown.load(Ordering::Acquire) {
                    return;
                }
                inner.work_ready.wait(&mut queue);
            }
        };

        if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(task)) {
            error!(
                "docdb worker task panicked: {}",
                payload
                    .downcast_ref::<&str>()
                    .copied()
                    .unwrap_or("(non-string panic)")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;

    #[test]
    fn submitted_tasks_all_run() {
        let pool = WorkerPool::new(2, 16);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let c = Arc::clone(&counter);
            pool.submit(move || {
                c.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn submit_past_capacity_rejects_with_queue_full() {
        let pool = WorkerPool::new(1, 1);
        let barrier = Arc::new(Barrier::new(2));
        let b = Arc::clone(&barrier);
        pool.submit(move || {
            b.wait();
        })
        .unwrap();

        std::thread::sleep(std::time::Duration::from_millis(50));

        pool.submit(|| {}).unwrap(); // fills the one queue slot
        let result = pool.submit(|| {});
        assert!(matches!(result, Err(Error::QueueFull)));

        barrier.wait();
        pool.shutdown();
    }

    #[test]
    fn submit_after_shutdown_rejects_with_pool_stopped() {
        let pool = WorkerPool::new(2, 16);
        pool.shutdown();
        let result = pool.submit(|| {});
        assert!(matches!(result, Err(Error::PoolStopped)));
    }

    #[test]
    fn panicking_task_does_not_kill_worker_or_block_later_tasks() {
        let pool = WorkerPool::new(1, 16);
        pool.submit(|| panic!("boom")).unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        pool.submit(move || {
            c.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();

        std::thread::sleep(std::time::Duration::from_millis(50));
        pool.shutdown();
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn tasks_run_in_fifo_order_on_single_worker() {
        let pool = WorkerPool::new(1, 16);
        let barrier = Arc::new(Barrier::new(2));
        let b = Arc::clone(&barrier);
        pool.submit(move || {
            b.wait();
        })
        .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));

        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let o = Arc::clone(&order);
            pool.submit(move || {
                o.lock().push(i);
            })
            .unwrap();
        }
        barrier.wait();
        std::thread::sleep(std::time::Duration::from_millis(50));
        pool.shutdown();
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }
}
