//! # Boost Workers
//!
//! One long-lived thread per boost device. It parks on the device's wait
//! queue, and whenever the state word differs from what it last applied it
//! recomputes the target's minimum frequency. A stop request is terminal.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use core::sync::atomic::Ordering;

use parking_lot::Mutex;

use crate::boost::BoostShared;
use crate::config::MAX_RT_PRIO;
use crate::error::{BoostError, BoostResult};
use crate::state::BoostState;

/// Handle to a running `devfreq_boostd/<n>` thread
#[derive(Debug)]
pub struct BoostWorker {
    name: String,
    shared: Arc<BoostShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl BoostWorker {
    /// Start the worker for `shared`
    pub(crate) fn spawn(shared: Arc<BoostShared>, realtime: bool) -> BoostResult<Self> {
        let name = format!("devfreq_boostd/{}", shared.device.index());

        let thread = {
            let shared = shared.clone();
            thread::Builder::new()
                .name(name.clone())
                .spawn(move || {
                    if realtime {
                        set_realtime_priority();
                    }
                    boost_thread(&shared);
                })
                .map_err(|err| {
                    log::error!("devfreq_boost: failed to create {}: {}", name, err);
                    BoostError::ThreadSpawn
                })?
        };

        log::debug!("devfreq_boost: started {}", name);

        Ok(Self {
            name,
            shared,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Thread name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the thread is still joinable
    pub fn is_running(&self) -> bool {
        self.thread.lock().is_some()
    }

    /// Ask the worker to exit and wait for it. Later calls do nothing.
    pub fn stop(&self) {
        let Some(thread) = self.thread.lock().take() else {
            return;
        };

        self.shared.stop.store(true, Ordering::Release);
        self.shared.waitq.wake_up();

        if thread.join().is_err() {
            log::error!("devfreq_boost: {} panicked", self.name);
        } else {
            log::debug!("devfreq_boost: stopped {}", self.name);
        }
    }
}

impl Drop for BoostWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn boost_thread(shared: &BoostShared) {
    let mut old_state = BoostState::empty();

    loop {
        let mut curr_state = old_state;
        let mut should_stop = false;

        shared.waitq.wait_event(|| {
            should_stop = shared.stop.load(Ordering::Acquire);
            curr_state = shared.state.load();
            should_stop || curr_state != old_state
        });

        if should_stop {
            break;
        }

        old_state = curr_state;
        shared.update_boosts(curr_state);
    }
}

#[cfg(target_os = "linux")]
fn set_realtime_priority() {
    // SAFETY: sched_param is plain data, and pid 0 names the calling thread.
    let ret = unsafe {
        let mut param: libc::sched_param = core::mem::zeroed();
        param.sched_priority = MAX_RT_PRIO - 1;
        libc::sched_setscheduler(0, libc::SCHED_FIFO, &param)
    };
    if ret != 0 {
        log::warn!(
            "devfreq_boost: SCHED_FIFO unavailable: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(target_os = "linux"))]
fn set_realtime_priority() {
    log::warn!("devfreq_boost: no realtime priority for prio {} on this host", MAX_RT_PRIO - 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boost::BoostDevice;
    use crate::config::{BoostConfig, DevfreqDevice};
    use crate::device::{Devfreq, DevfreqProfile, PowersaveGovernor};
    use std::time::{Duration, Instant};

    fn target() -> Arc<Devfreq> {
        let profile = DevfreqProfile::new(vec![200, 762, 1525, 3143]);
        Arc::new(Devfreq::new("soc:qcom,llccbw", profile, Box::new(PowersaveGovernor)).unwrap())
    }

    fn config() -> BoostConfig {
        BoostConfig::new()
            .with_input_boost_duration(Duration::from_millis(50))
            .with_max_boost_duration(Duration::from_millis(100))
            .with_boost_freq(DevfreqDevice::LlccBw, 1525)
            .without_realtime()
    }

    fn wait_for(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        cond()
    }

    #[test]
    fn test_worker_applies_boosts() {
        let boost = BoostDevice::new(DevfreqDevice::LlccBw, &config()).unwrap();
        let df = target();
        boost.register(&df);
        let worker = BoostWorker::spawn(boost.shared().clone(), false).unwrap();
        assert_eq!(worker.name(), "devfreq_boostd/1");

        boost.kick(false);
        assert!(wait_for(|| df.limits().min_freq == 1525));
        assert!(wait_for(|| df.limits().min_freq == 200));

        boost.kick(true);
        assert!(wait_for(|| df.limits().cur_freq == 3143));
        assert!(wait_for(|| df.limits().cur_freq == 200));

        worker.stop();
    }

    #[test]
    fn test_screen_off_pins_floor() {
        let boost = BoostDevice::new(DevfreqDevice::LlccBw, &config().with_max_boost_duration(Duration::from_secs(60))).unwrap();
        let df = target();
        boost.register(&df);
        let worker = BoostWorker::spawn(boost.shared().clone(), false).unwrap();

        boost.kick(true);
        assert!(wait_for(|| df.limits().min_freq == 3143));

        boost.screen_off();
        assert!(wait_for(|| df.limits().min_freq == 200));

        worker.stop();
    }

    #[test]
    fn test_unchanged_state_is_not_reapplied() {
        let boost = BoostDevice::new(DevfreqDevice::LlccBw, &config()).unwrap();
        let df = target();
        boost.register(&df);
        let worker = BoostWorker::spawn(boost.shared().clone(), false).unwrap();

        boost.screen_on();
        boost.shared().waitq.wake_up();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(df.update_count(), 0);

        worker.stop();
    }

    #[test]
    fn test_stop_is_terminal() {
        let boost = BoostDevice::new(DevfreqDevice::LlccBw, &config()).unwrap();
        let df = target();
        boost.register(&df);
        let worker = BoostWorker::spawn(boost.shared().clone(), false).unwrap();

        worker.stop();
        assert!(!worker.is_running());
        worker.stop();

        boost.kick(true);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(df.update_count(), 0);
    }
}
