//! A fixed-size worker pool and task queue bound to a single tenant.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::cgroup::CgroupController;
use crate::concurrent::LockFreeQueue;
use crate::task::BoxedTask;
use crate::worker::Worker;

/// Point-in-time view of a thread group's load, returned to the
/// thread pool manager's callers.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ThreadGroupInfo {
    pub total_threads: usize,
    pub busy_threads: usize,
    pub queue_size: usize,
}

/// Owns one tenant's queue and worker set. `start`/`stop` are idempotent;
/// `resize` grows by appending new, started workers and shrinks by
/// synchronously stopping and dropping workers from the tail.
pub struct TenantThreadGroup {
    tenant_id: String,
    queue: Arc<LockFreeQueue<BoxedTask>>,
    workers: Vec<Worker>,
    running: AtomicBool,
    cgroup: Option<Arc<CgroupController>>,
    next_worker_id: usize,
}

impl TenantThreadGroup {
    pub fn new(tenant_id: String, size: usize, cgroup: Option<Arc<CgroupController>>) -> Self {
        let queue = Arc::new(LockFreeQueue::new());
        let mut group = Self {
            tenant_id,
            queue,
            workers: Vec::with_capacity(size),
            running: AtomicBool::new(false),
            cgroup,
            next_worker_id: 0,
        };
        group.grow_unstarted(size);
        group
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn total_threads(&self) -> usize {
        self.workers.len()
    }

    fn grow_unstarted(&mut self, n: usize) {
        for _ in 0..n {
            let worker = Worker::new(
                self.next_worker_id,
                self.tenant_id.clone(),
                self.queue.clone(),
                self.cgroup.clone(),
            );
            self.next_worker_id += 1;
            self.workers.push(worker);
        }
    }

    /// Start every worker. A no-op if the group is already running.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        for worker in &mut self.workers {
            worker.start();
        }
    }

    /// Stop and join every worker. A no-op if the group is already stopped.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        for worker in &mut self.workers {
            worker.stop();
        }
    }

    /// Forwards to the queue; `false` means `task` was rejected at
    /// `is_valid()` and was never enqueued, not that the group is full
    /// (this queue is unbounded).
    pub fn submit_task(&self, task: BoxedTask) -> bool {
        self.queue.enqueue(task)
    }

    /// Grow to `n` workers (appending new, freshly started ones if the
    /// group is already running) or shrink to `n` workers, stopping and
    /// dropping the tail. A no-op if `n == total_threads()`.
    pub fn resize(&mut self, n: usize) {
        let current = self.workers.len();
        if n == current {
            return;
        }
        if n > current {
            let is_running = self.running.load(Ordering::SeqCst);
            let before = self.workers.len();
            self.grow_unstarted(n - current);
            if is_running {
                for worker in &mut self.workers[before..] {
                    worker.start();
                }
            }
        } else {
            for mut worker in self.workers.drain(n..) {
                worker.stop();
            }
        }
        debug!(tenant_id = %self.tenant_id, from = current, to = n, "thread group resized");
    }

    pub fn info(&self) -> ThreadGroupInfo {
        ThreadGroupInfo {
            total_threads: self.workers.len(),
            busy_threads: self.workers.iter().filter(|w| w.busy()).count(),
            queue_size: self.queue.len(),
        }
    }
}

impl Drop for TenantThreadGroup {
    fn drop(&mut self) {
        self.stop();
    }
}
