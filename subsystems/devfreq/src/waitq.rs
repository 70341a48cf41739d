//! # Wait Queue
//!
//! A condition a thread sleeps on until some predicate holds. Wakers never
//! block for longer than it takes to hand over the internal lock, and a
//! wake-up issued between a sleeper's predicate check and its sleep is
//! never lost.

use core::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Sleep/wake rendezvous for one worker
#[derive(Debug, Default)]
pub struct WaitQueue {
    lock: Mutex<()>,
    cond: Condvar,
    wakeups: AtomicU64,
}

impl WaitQueue {
    /// Create an empty wait queue
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            cond: Condvar::new(),
            wakeups: AtomicU64::new(0),
        }
    }

    /// Wake every sleeper so it re-checks its predicate
    pub fn wake_up(&self) {
        let _guard = self.lock.lock();
        self.wakeups.fetch_add(1, Ordering::Relaxed);
        self.cond.notify_all();
    }

    /// Sleep until `condition` returns true
    pub fn wait_event<F: FnMut() -> bool>(&self, mut condition: F) {
        let mut guard = self.lock.lock();
        while !condition() {
            self.cond.wait(&mut guard);
        }
    }

    /// Sleep until `condition` returns true or `timeout` passes.
    /// Returns the final value of `condition`.
    pub fn wait_event_timeout<F: FnMut() -> bool>(&self, mut condition: F, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock.lock();
        loop {
            if condition() {
                return true;
            }
            if self.cond.wait_until(&mut guard, deadline).timed_out() {
                return condition();
            }
        }
    }

    /// Number of `wake_up` calls so far
    pub fn wakeups(&self) -> u64 {
        self.wakeups.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[test]
    fn test_wake_releases_sleeper() {
        let wq = Arc::new(WaitQueue::new());
        let flag = Arc::new(AtomicBool::new(false));

        let sleeper = {
            let (wq, flag) = (wq.clone(), flag.clone());
            std::thread::spawn(move || wq.wait_event(|| flag.load(Ordering::SeqCst)))
        };

        flag.store(true, Ordering::SeqCst);
        wq.wake_up();
        sleeper.join().unwrap();
        assert_eq!(wq.wakeups(), 1);
    }

    #[test]
    fn test_wait_timeout() {
        let wq = WaitQueue::new();
        assert!(!wq.wait_event_timeout(|| false, Duration::from_millis(5)));
        assert!(wq.wait_event_timeout(|| true, Duration::from_millis(5)));
    }
}
