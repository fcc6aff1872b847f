//! A single worker thread draining one tenant's task queue.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, warn};

use crate::cgroup::CgroupController;
use crate::concurrent::LockFreeQueue;
use crate::task::BoxedTask;

const EMPTY_QUEUE_POLL: Duration = Duration::from_millis(1);

/// Lifecycle states of a [`Worker`]. A stopped worker is never restarted;
/// callers that need more capacity ask the owning group to grow instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    Running,
    Stopping,
    Stopped,
}

/// One OS thread that repeatedly dequeues and executes tasks for a single
/// tenant. A panic inside `Task::execute` is caught and logged; it never
/// kills the worker thread.
pub struct Worker {
    id: usize,
    tenant_id: String,
    queue: Arc<LockFreeQueue<BoxedTask>>,
    cgroup: Option<Arc<CgroupController>>,
    state: Arc<Mutex<WorkerState>>,
    running: Arc<AtomicBool>,
    busy: Arc<AtomicBool>,
    executed_tasks: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn new(
        id: usize,
        tenant_id: String,
        queue: Arc<LockFreeQueue<BoxedTask>>,
        cgroup: Option<Arc<CgroupController>>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            queue,
            cgroup,
            state: Arc::new(Mutex::new(WorkerState::Created)),
            running: Arc::new(AtomicBool::new(false)),
            busy: Arc::new(AtomicBool::new(false)),
            executed_tasks: Arc::new(AtomicU64::new(0)),
            handle: None,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn busy(&self) -> bool {
        self.busy.load(Ordering::Relaxed)
    }

    pub fn executed_tasks(&self) -> u64 {
        self.executed_tasks.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    /// Spawn the worker thread. A no-op if the worker is already running.
    pub fn start(&mut self) {
        let mut state = self.state.lock();
        if *state == WorkerState::Running {
            return;
        }

        self.running.store(true, Ordering::SeqCst);
        let queue = self.queue.clone();
        let running = self.running.clone();
        let busy = self.busy.clone();
        let executed_tasks = self.executed_tasks.clone();
        let tenant_id = self.tenant_id.clone();
        let worker_id = self.id;
        let cgroup = self.cgroup.clone();

        self.handle = Some(thread::spawn(move || {
            if let Some(ref c) = cgroup {
                if let Err(e) = c.add_thread(&tenant_id, current_tid()) {
                    warn!(tenant_id = %tenant_id, worker_id, error = %e, "cgroup thread registration failed");
                }
            }

            while running.load(Ordering::Acquire) {
                match queue.dequeue() {
                    Some(mut task) => {
                        if !task.is_valid() {
                            continue;
                        }
                        busy.store(true, Ordering::Relaxed);
                        let result = catch_unwind(AssertUnwindSafe(|| task.execute()));
                        if let Err(_) = result {
                            error!(tenant_id = %tenant_id, worker_id, "task panicked; worker continues");
                        }
                        executed_tasks.fetch_add(1, Ordering::Relaxed);
                        busy.store(false, Ordering::Relaxed);
                    }
                    None => thread::sleep(EMPTY_QUEUE_POLL),
                }
            }

            if let Some(ref c) = cgroup {
                c.remove_thread(&tenant_id, current_tid());
            }
        }));

        *state = WorkerState::Running;
    }

    /// Signal the worker to drain its current task and stop, then join it.
    /// Idempotent: stopping a worker that isn't running is a no-op.
    pub fn stop(&mut self) {
        {
            let mut state = self.state.lock();
            if *state != WorkerState::Running {
                return;
            }
            *state = WorkerState::Stopping;
        }

        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(tenant_id = %self.tenant_id, worker_id = self.id, "worker thread join failed");
            }
        }

        *self.state.lock() = WorkerState::Stopped;
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(target_os = "linux")]
fn current_tid() -> i32 {
    unsafe { libc::syscall(libc::SYS_gettid) as i32 }
}

#[cfg(not(target_os = "linux"))]
fn current_tid() -> i32 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::FnTask;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn worker_executes_submitted_tasks() {
        let queue = Arc::new(LockFreeQueue::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let mut worker = Worker::new(0, "t1".to_string(), queue.clone(), None);
        worker.start();

        for _ in 0..10 {
            let c = counter.clone();
            queue.enqueue(Box::new(FnTask::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })));
        }

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while counter.load(Ordering::SeqCst) < 10 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        worker.stop();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(worker.executed_tasks(), 10);
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[test]
    fn panicking_task_does_not_kill_worker() {
        let queue: Arc<LockFreeQueue<BoxedTask>> = Arc::new(LockFreeQueue::new());
        let mut worker = Worker::new(0, "t1".to_string(), queue.clone(), None);
        worker.start();

        queue.enqueue(Box::new(FnTask::new(|| panic!("boom"))));

        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        queue.enqueue(Box::new(FnTask::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        })));

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while counter.load(Ordering::SeqCst) < 1 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        worker.stop();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_is_idempotent() {
        let queue = Arc::new(LockFreeQueue::new());
        let mut worker = Worker::new(0, "t1".to_string(), queue, None);
        worker.start();
        worker.stop();
        worker.stop();
        assert_eq!(worker.state(), WorkerState::Stopped);
    }
}
