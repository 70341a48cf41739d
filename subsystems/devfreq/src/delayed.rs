//! # Delayed Work
//!
//! A one-shot action that runs on its own timer thread once a deadline
//! passes. Re-arming a pending action moves its deadline instead of
//! queueing a second run, so a burst of re-arms collapses into one run.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::{BoostError, BoostResult};

struct TimerState {
    deadline: Option<Instant>,
    stopped: bool,
}

struct TimerShared {
    state: Mutex<TimerState>,
    cond: Condvar,
}

/// Cancellable, re-armable delayed action
pub struct DelayedWork {
    name: String,
    shared: Arc<TimerShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl DelayedWork {
    /// Create the action and its timer thread; nothing is armed yet
    pub fn new<F>(name: impl Into<String>, func: F) -> BoostResult<Self>
    where
        F: Fn() + Send + 'static,
    {
        let name = name.into();
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState {
                deadline: None,
                stopped: false,
            }),
            cond: Condvar::new(),
        });

        let thread = {
            let shared = shared.clone();
            thread::Builder::new()
                .name(name.clone())
                .spawn(move || Self::run(&shared, func))
                .map_err(|err| {
                    log::error!("DelayedWork: failed to spawn {}: {}", name, err);
                    BoostError::ThreadSpawn
                })?
        };

        Ok(Self {
            name,
            shared,
            thread: Mutex::new(Some(thread)),
        })
    }

    fn run<F: Fn()>(shared: &TimerShared, func: F) {
        let mut state = shared.state.lock();
        loop {
            if state.stopped {
                break;
            }
            match state.deadline {
                None => shared.cond.wait(&mut state),
                Some(deadline) if Instant::now() >= deadline => {
                    state.deadline = None;
                    MutexGuard::unlocked(&mut state, &func);
                },
                Some(deadline) => {
                    shared.cond.wait_until(&mut state, deadline);
                },
            }
        }
    }

    /// Arm the action to run after `delay`, replacing any pending deadline.
    ///
    /// Returns `true` if the action was already pending, `false` if it was
    /// idle and has now been queued.
    pub fn modify(&self, delay: Duration) -> bool {
        let mut state = self.shared.state.lock();
        if state.stopped {
            return false;
        }
        let was_pending = state.deadline.is_some();
        state.deadline = Some(Instant::now() + delay);
        self.shared.cond.notify_one();
        was_pending
    }

    /// Disarm a pending action. Returns `true` if one was pending.
    pub fn cancel(&self) -> bool {
        let mut state = self.shared.state.lock();
        let was_pending = state.deadline.take().is_some();
        self.shared.cond.notify_one();
        was_pending
    }

    /// Whether the action is armed
    pub fn is_pending(&self) -> bool {
        self.shared.state.lock().deadline.is_some()
    }

    /// Disarm and terminate the timer thread. Further arming is ignored.
    pub fn stop(&self) {
        {
            let mut state = self.shared.state.lock();
            state.deadline = None;
            state.stopped = true;
            self.shared.cond.notify_one();
        }
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                log::error!("DelayedWork: {} panicked", self.name);
            }
        }
    }
}

impl Drop for DelayedWork {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for DelayedWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayedWork")
            .field("name", &self.name)
            .field("pending", &self.is_pending())
            .finish()
    }
}
