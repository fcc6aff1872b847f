// Lock-free concurrency primitives module
//
// Provides the epoch-based memory reclamation scheme and the Michael-Scott
// task queue built on top of it. Both are used by the thread pool to move
// tasks from submitters to workers without locking.

pub mod epoch;
pub mod queue;

pub use epoch::{Atomic, Epoch, EpochGuard, Owned, Shared};
pub use queue::LockFreeQueue;

/// Cache line size for padding to avoid false sharing.
pub const CACHE_LINE_SIZE: usize = 64;

/// Backoff strategy for CAS retry loops.
pub struct Backoff {
    step: u32,
    max_step: u32,
}

impl Backoff {
    pub fn new() -> Self {
        Self { step: 0, max_step: 10 }
    }

    /// Perform a backoff step.
    pub fn spin(&mut self) {
        for _ in 0..(1 << self.step.min(self.max_step)) {
            std::hint::spin_loop();
        }
        self.step = self.step.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }

    pub fn should_yield(&self) -> bool {
        self.step > 6
    }

    pub fn snooze(&mut self) {
        if self.should_yield() {
            std::thread::yield_now();
        } else {
            self.spin();
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff() {
        let mut backoff = Backoff::new();
        assert_eq!(backoff.step, 0);

        backoff.spin();
        assert_eq!(backoff.step, 1);

        backoff.reset();
        assert_eq!(backoff.step, 0);
    }
}
