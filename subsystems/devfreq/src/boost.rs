//! # Boost Devices
//!
//! One slot of the boost table: the state word of a devfreq device, the
//! timer that ends its boosts, and the wait queue its worker sleeps on.

use std::sync::{Arc, Weak};
use std::time::Duration;

use core::sync::atomic::AtomicBool;

use spin::RwLock;

use crate::config::{BoostConfig, DevfreqDevice};
use crate::delayed::DelayedWork;
use crate::device::Devfreq;
use crate::error::BoostResult;
use crate::state::{boosted_min_freq, AtomicBoostState, BoostState};
use crate::waitq::WaitQueue;

/// State shared between a boost device, its unboost timer and its worker
#[derive(Debug)]
pub(crate) struct BoostShared {
    pub(crate) device: DevfreqDevice,
    boost_freq: u64,
    pub(crate) state: AtomicBoostState,
    target: RwLock<Option<Weak<Devfreq>>>,
    pub(crate) waitq: WaitQueue,
    pub(crate) stop: AtomicBool,
}

impl BoostShared {
    /// The registered devfreq, if it is still alive
    pub(crate) fn target(&self) -> Option<Arc<Devfreq>> {
        self.target.read().as_ref().and_then(Weak::upgrade)
    }

    fn unboost(&self) {
        self.state
            .remove(BoostState::MAX_BOOST | BoostState::INPUT_BOOST);
        self.waitq.wake_up();
    }

    /// Apply `state` to the target's minimum frequency
    pub(crate) fn update_boosts(&self, state: BoostState) {
        let Some(df) = self.target() else {
            log::debug!("devfreq_boost: {} has no target, state {:?} not applied", self.device.name(), state);
            return;
        };

        let mut limits = df.lock();
        limits.min_freq = boosted_min_freq(state, self.boost_freq, limits.max_freq, df.lowest_freq());
        df.update_locked(&mut limits);
    }
}

/// A boostable devfreq slot
#[derive(Debug)]
pub struct BoostDevice {
    shared: Arc<BoostShared>,
    unboost: DelayedWork,
    input_boost_duration: Duration,
    max_boost_duration: Duration,
}

impl BoostDevice {
    /// Create the slot for `device` and its unboost timer
    pub fn new(device: DevfreqDevice, config: &BoostConfig) -> BoostResult<Self> {
        let shared = Arc::new(BoostShared {
            device,
            boost_freq: config.boost_freq(device),
            state: AtomicBoostState::new(),
            target: RwLock::new(None),
            waitq: WaitQueue::new(),
            stop: AtomicBool::new(false),
        });

        let unboost = {
            let shared = shared.clone();
            DelayedWork::new(format!("devfreq_unboost/{}", device.index()), move || {
                shared.unboost();
            })?
        };

        Ok(Self {
            shared,
            unboost,
            input_boost_duration: config.input_boost_duration,
            max_boost_duration: config.max_boost_duration,
        })
    }

    /// Which table slot this is
    pub fn device(&self) -> DevfreqDevice {
        self.shared.device
    }

    /// Bind the devfreq this slot boosts. Kicks are ignored until this runs.
    pub fn register(&self, df: &Arc<Devfreq>) {
        df.mark_boost_device();
        *self.shared.target.write() = Some(Arc::downgrade(df));
        log::info!("devfreq_boost: {} bound to {}", self.shared.device.name(), df.name());
    }

    /// The registered devfreq, if any
    pub fn target(&self) -> Option<Arc<Devfreq>> {
        self.shared.target()
    }

    /// Start or extend a boost. A max boost replaces an input boost and
    /// vice versa; the latest kick decides the level and the deadline.
    pub fn kick(&self, max: bool) {
        if self.shared.target.read().is_none() || self.shared.state.intersects(BoostState::SCREEN_OFF) {
            return;
        }

        let duration = if max {
            self.shared
                .state
                .transition(BoostState::MAX_BOOST, BoostState::INPUT_BOOST);
            self.max_boost_duration
        } else {
            self.shared
                .state
                .transition(BoostState::INPUT_BOOST, BoostState::MAX_BOOST);
            self.input_boost_duration
        };

        // A pending unboost will wake the worker itself when it fires; only
        // a freshly queued one leaves the new bits unobserved until then.
        if !self.unboost.modify(duration) {
            self.shared.waitq.wake_up();
        }
    }

    /// Display went dark: pin the floor and make sure the worker sees it
    pub fn screen_off(&self) {
        self.shared.state.insert(BoostState::SCREEN_OFF);
        self.shared.waitq.wake_up();
    }

    /// Display came back
    pub fn screen_on(&self) {
        self.shared.state.remove(BoostState::SCREEN_OFF);
    }

    /// Current state bits
    pub fn state(&self) -> BoostState {
        self.shared.state.load()
    }

    /// Whether an unboost is armed
    pub fn unboost_pending(&self) -> bool {
        self.unboost.is_pending()
    }

    /// Drop any armed unboost without running it
    pub fn cancel_unboost(&self) -> bool {
        self.unboost.cancel()
    }

    /// Worker wake-ups issued so far
    pub fn wakeups(&self) -> u64 {
        self.shared.waitq.wakeups()
    }

    pub(crate) fn shared(&self) -> &Arc<BoostShared> {
        &self.shared
    }

    /// Stop the unboost timer thread
    pub(crate) fn shutdown(&self) {
        self.unboost.stop();
    }
}

static_assertions::assert_impl_all!(BoostDevice: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DevfreqProfile, PowersaveGovernor};
    use std::time::Instant;

    fn target() -> Arc<Devfreq> {
        let profile = DevfreqProfile::new(vec![200, 762, 1525, 3143]);
        Arc::new(Devfreq::new("soc:qcom,cpubw", profile, Box::new(PowersaveGovernor)).unwrap())
    }

    fn config(input_ms: u64, max_ms: u64) -> BoostConfig {
        BoostConfig::new()
            .with_input_boost_duration(Duration::from_millis(input_ms))
            .with_max_boost_duration(Duration::from_millis(max_ms))
            .with_boost_freq(DevfreqDevice::CpuBw, 1525)
    }

    fn wait_for(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        cond()
    }

    #[test]
    fn test_kick_unregistered_is_noop() {
        let b = BoostDevice::new(DevfreqDevice::CpuBw, &config(100, 1000)).unwrap();
        b.kick(true);
        assert_eq!(b.state(), BoostState::empty());
        assert_eq!(b.wakeups(), 0);
        assert!(!b.unboost_pending());
    }

    #[test]
    fn test_kick_screen_off_is_noop() {
        let b = BoostDevice::new(DevfreqDevice::CpuBw, &config(100, 1000)).unwrap();
        let df = target();
        b.register(&df);
        assert!(df.is_boost_device());

        b.screen_off();
        b.kick(false);
        assert_eq!(b.state(), BoostState::SCREEN_OFF);
        assert!(!b.unboost_pending());
    }

    #[test]
    fn test_kick_levels() {
        let b = BoostDevice::new(DevfreqDevice::CpuBw, &config(60_000, 60_000)).unwrap();
        let df = target();
        b.register(&df);

        b.kick(false);
        assert_eq!(b.state(), BoostState::INPUT_BOOST);
        b.kick(true);
        assert_eq!(b.state(), BoostState::MAX_BOOST);
    }

    #[test]
    fn test_later_kick_overrides() {
        let b = BoostDevice::new(DevfreqDevice::CpuBw, &config(60_000, 60_000)).unwrap();
        let df = target();
        b.register(&df);

        b.kick(true);
        b.kick(false);
        assert_eq!(b.state(), BoostState::INPUT_BOOST);
    }

    #[test]
    fn test_wake_only_when_unboost_was_idle() {
        let b = BoostDevice::new(DevfreqDevice::CpuBw, &config(60_000, 60_000)).unwrap();
        let df = target();
        b.register(&df);

        b.kick(false);
        assert_eq!(b.wakeups(), 1);
        b.kick(false);
        b.kick(true);
        assert_eq!(b.wakeups(), 1);
        assert!(b.unboost_pending());
    }

    #[test]
    fn test_unboost_clears_and_wakes_once() {
        let b = BoostDevice::new(DevfreqDevice::CpuBw, &config(50, 50)).unwrap();
        let df = target();
        b.register(&df);

        b.kick(true);
        assert_eq!(b.wakeups(), 1);
        assert!(wait_for(|| b.state().is_empty()));
        assert!(wait_for(|| b.wakeups() == 2));

        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(b.wakeups(), 2);
    }

    #[test]
    fn test_screen_off_always_wakes() {
        let b = BoostDevice::new(DevfreqDevice::LlccBw, &config(100, 1000)).unwrap();
        b.screen_off();
        b.screen_off();
        assert_eq!(b.wakeups(), 2);
        b.screen_on();
        assert_eq!(b.state(), BoostState::empty());
        assert_eq!(b.wakeups(), 2);
    }

    #[test]
    fn test_update_boosts_applies_precedence() {
        let b = BoostDevice::new(DevfreqDevice::CpuBw, &config(100, 1000)).unwrap();
        let df = target();
        b.register(&df);
        let shared = b.shared();

        shared.update_boosts(BoostState::INPUT_BOOST);
        assert_eq!(df.limits().min_freq, 1525);
        assert_eq!(df.limits().cur_freq, 1525);

        shared.update_boosts(BoostState::MAX_BOOST | BoostState::INPUT_BOOST);
        assert_eq!(df.limits().min_freq, 3143);

        shared.update_boosts(BoostState::all());
        assert_eq!(df.limits().min_freq, 200);

        shared.update_boosts(BoostState::empty());
        assert_eq!(df.limits().cur_freq, 200);
    }

    #[test]
    fn test_dropped_target_reads_as_unregistered() {
        let b = BoostDevice::new(DevfreqDevice::CpuBw, &config(100, 1000)).unwrap();
        let df = target();
        b.register(&df);
        drop(df);

        assert!(b.target().is_none());
        b.shared().update_boosts(BoostState::MAX_BOOST);
    }
}
