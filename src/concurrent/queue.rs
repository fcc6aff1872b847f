// Lock-free task queue feeding a tenant's worker set.
//
// Michael-Scott unbounded FIFO (compare-and-swap linked list, sentinel
// head) with one deliberate specialization: this queue only ever holds
// `Task`s, so `enqueue` checks `is_valid()` at the call boundary and
// reports the outcome instead of always succeeding. A submitter that
// pushes a task the queue immediately rejects needs to know that before
// it walks away, not find out later from a worker that silently dropped
// it.

use super::epoch::{Atomic, Epoch, Owned};
use super::Backoff;
use crate::task::Task;

use std::sync::atomic::{AtomicUsize, Ordering};

#[repr(C, align(64))]
struct Node<T> {
    task: Option<T>,
    next: Atomic<Node<T>>,
}

impl<T> Node<T> {
    fn holding(task: T) -> Self {
        Self { task: Some(task), next: Atomic::null() }
    }

    fn sentinel() -> Self {
        Self { task: None, next: Atomic::null() }
    }
}

/// Multi-producer, multi-consumer FIFO queue of tasks belonging to one
/// tenant's thread group.
///
/// Head and tail live in separate cache lines: a burst of enqueues and a
/// burst of dequeues from different cores otherwise ping-pong the same
/// line back and forth.
pub struct LockFreeQueue<T: Task + 'static> {
    head: Atomic<Node<T>>,
    _isolate_head: [u8; 56],
    tail: Atomic<Node<T>>,
    _isolate_tail: [u8; 56],
    len: AtomicUsize,
}

impl<T: Task + 'static> LockFreeQueue<T> {
    pub fn new() -> Self {
        let sentinel = Owned::new(Node::sentinel()).into_shared();
        let queue = Self {
            head: Atomic::null(),
            _isolate_head: [0; 56],
            tail: Atomic::null(),
            _isolate_tail: [0; 56],
            len: AtomicUsize::new(0),
        };
        queue.head.store(sentinel, Ordering::Relaxed);
        queue.tail.store(sentinel, Ordering::Relaxed);
        queue
    }

    /// Pushes `task` to the back of the queue.
    ///
    /// Returns `false` without enqueuing anything if `task.is_valid()` is
    /// false; the rejection happens before any node is allocated or
    /// linked, so a rejected task never becomes observable to a
    /// dequeuer. Otherwise this is lock-free and always eventually
    /// succeeds: it never blocks on another thread.
    pub fn enqueue(&self, task: T) -> bool {
        if !task.is_valid() {
            return false;
        }

        let guard = Epoch::pin();
        let node = Owned::new(Node::holding(task)).into_shared();
        let mut backoff = Backoff::new();

        loop {
            let tail = self.tail.load(Ordering::Acquire, &guard);
            let next = unsafe { tail.as_ref().unwrap().next.load(Ordering::Acquire, &guard) };

            if tail != self.tail.load(Ordering::Acquire, &guard) {
                backoff.spin();
                continue;
            }

            if !next.is_null() {
                // Tail lags the true last node (visible between another
                // thread's two enqueue CAS steps); help it catch up.
                let _ = self.tail.compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed, &guard);
                backoff.spin();
                continue;
            }

            let linked = unsafe {
                tail.as_ref().unwrap().next.compare_exchange_weak(
                    next,
                    node,
                    Ordering::Release,
                    Ordering::Acquire,
                    &guard,
                )
            };
            match linked {
                Ok(_) => {
                    let _ = self.tail.compare_exchange(tail, node, Ordering::Release, Ordering::Relaxed, &guard);
                    self.len.fetch_add(1, Ordering::Relaxed);
                    return true;
                }
                Err(_) => backoff.spin(),
            }
        }
    }

    /// Pops the task at the front of the queue, or `None` if it's empty.
    /// The popped node's memory is handed to the epoch reclaimer rather
    /// than freed here: a concurrent dequeuer may still be reading
    /// through the old head pointer.
    pub fn dequeue(&self) -> Option<T> {
        let guard = Epoch::pin();
        let mut backoff = Backoff::new();

        loop {
            let head = self.head.load(Ordering::Acquire, &guard);
            let tail = self.tail.load(Ordering::Acquire, &guard);
            let next = unsafe { head.as_ref().unwrap().next.load(Ordering::Acquire, &guard) };

            if head != self.head.load(Ordering::Acquire, &guard) {
                backoff.spin();
                continue;
            }

            if head == tail {
                if next.is_null() {
                    return None;
                }
                let _ = self.tail.compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed, &guard);
                backoff.spin();
                continue;
            }

            match self.head.compare_exchange(head, next, Ordering::Release, Ordering::Acquire, &guard) {
                Ok(_) => {
                    self.len.fetch_sub(1, Ordering::Relaxed);
                    let task = unsafe { (*next.as_ptr()).task.take() };
                    Epoch::defer(head.as_ptr());
                    return task;
                }
                Err(_) => backoff.spin(),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        let guard = Epoch::pin();
        let head = self.head.load(Ordering::Acquire, &guard);
        unsafe { head.as_ref().unwrap().next.load(Ordering::Acquire, &guard).is_null() }
    }

    /// Approximate length; concurrent mutators can make this stale the
    /// instant it's read.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }
}

impl<T: Task + 'static> Default for LockFreeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Task + 'static> Drop for LockFreeQueue<T> {
    fn drop(&mut self) {
        while self.dequeue().is_some() {}
    }
}

// Task: Send already, so the queue needs no separate Send/Sync bound on T.
unsafe impl<T: Task + 'static> Send for LockFreeQueue<T> {}
unsafe impl<T: Task + 'static> Sync for LockFreeQueue<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{BoxedTask, FnTask};
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;
    use std::thread;

    /// A minimal always-valid task used where a test only cares about
    /// FIFO ordering of a payload, not execution.
    struct PayloadTask(u64);

    impl Task for PayloadTask {
        fn execute(&mut self) {}
    }

    struct RejectedTask;

    impl Task for RejectedTask {
        fn execute(&mut self) {
            panic!("a rejected task must never execute");
        }

        fn is_valid(&self) -> bool {
            false
        }
    }

    #[test]
    fn fifo_order_is_preserved() {
        let queue: LockFreeQueue<PayloadTask> = LockFreeQueue::new();
        assert!(queue.is_empty());

        for i in 0..3 {
            assert!(queue.enqueue(PayloadTask(i)));
        }

        assert_eq!(queue.dequeue().map(|t| t.0), Some(0));
        assert_eq!(queue.dequeue().map(|t| t.0), Some(1));
        assert_eq!(queue.dequeue().map(|t| t.0), Some(2));
        assert_eq!(queue.dequeue().map(|t| t.0), None);
    }

    #[test]
    fn invalid_task_is_rejected_without_enqueuing() {
        let queue = LockFreeQueue::new();
        assert!(!queue.enqueue(RejectedTask));
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn concurrent_enqueue_dequeue_loses_nothing() {
        let queue: Arc<LockFreeQueue<PayloadTask>> = Arc::new(LockFreeQueue::new());
        let mut handles = vec![];

        for i in 0..5u64 {
            let q = queue.clone();
            handles.push(thread::spawn(move || {
                for j in 0..1000u64 {
                    assert!(q.enqueue(PayloadTask(i * 1000 + j)));
                }
            }));
        }

        let dequeued = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let q = queue.clone();
            let dequeued = dequeued.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    while q.dequeue().is_none() {
                        thread::yield_now();
                    }
                    dequeued.fetch_add(1, AtomicOrdering::SeqCst);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(dequeued.load(AtomicOrdering::SeqCst), 5000);
        assert!(queue.is_empty());
    }

    #[test]
    fn boxed_task_executes_through_the_queue() {
        let queue: LockFreeQueue<BoxedTask> = LockFreeQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        assert!(queue.enqueue(Box::new(FnTask::new(move || {
            c.fetch_add(1, AtomicOrdering::SeqCst);
        }))));

        let mut task = queue.dequeue().unwrap();
        task.execute();
        assert_eq!(counter.load(AtomicOrdering::SeqCst), 1);
    }
}
