//! # Boost State
//!
//! The per-device state word. Each bit is set and cleared independently
//! from different contexts (input events, the display notifier, the
//! unboost timer) with atomic bit operations; the worker reads the whole
//! word in one load.

use core::sync::atomic::{AtomicU32, Ordering};

bitflags::bitflags! {
    /// Boost state bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BoostState: u32 {
        /// Display is off; pins the floor regardless of the other bits
        const SCREEN_OFF = 1 << 0;
        /// Input boost active
        const INPUT_BOOST = 1 << 1;
        /// Max boost active
        const MAX_BOOST = 1 << 2;
    }
}

/// Atomic holder of a [`BoostState`]
#[derive(Debug, Default)]
pub struct AtomicBoostState(AtomicU32);

impl AtomicBoostState {
    /// Empty state
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Snapshot of every bit
    #[inline]
    pub fn load(&self) -> BoostState {
        BoostState::from_bits_truncate(self.0.load(Ordering::Acquire))
    }

    /// Set `bits`
    #[inline]
    pub fn insert(&self, bits: BoostState) {
        self.0.fetch_or(bits.bits(), Ordering::AcqRel);
    }

    /// Clear `bits`
    #[inline]
    pub fn remove(&self, bits: BoostState) {
        self.0.fetch_and(!bits.bits(), Ordering::AcqRel);
    }

    /// Set `insert` and clear `remove` in one step
    #[inline]
    pub fn transition(&self, insert: BoostState, remove: BoostState) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((bits | insert.bits()) & !remove.bits())
            });
    }

    /// Any of `bits` set
    #[inline]
    pub fn intersects(&self, bits: BoostState) -> bool {
        self.load().intersects(bits)
    }
}

/// Minimum frequency a device should run at in `state`.
///
/// `floor` is the lowest entry of the device's frequency table.
pub fn boosted_min_freq(state: BoostState, boost_freq: u64, max_freq: u64, floor: u64) -> u64 {
    if state.contains(BoostState::SCREEN_OFF) {
        floor
    } else if state.contains(BoostState::MAX_BOOST) {
        max_freq
    } else if state.contains(BoostState::INPUT_BOOST) {
        boost_freq.min(max_freq)
    } else {
        floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLOOR: u64 = 100;
    const MAX: u64 = 2000;

    #[test]
    fn test_screen_off_wins() {
        assert_eq!(boosted_min_freq(BoostState::all(), 800, MAX, FLOOR), FLOOR);
        assert_eq!(boosted_min_freq(BoostState::SCREEN_OFF, 800, MAX, FLOOR), FLOOR);
    }

    #[test]
    fn test_max_boost_over_input_boost() {
        let state = BoostState::MAX_BOOST | BoostState::INPUT_BOOST;
        assert_eq!(boosted_min_freq(state, 800, MAX, FLOOR), MAX);
        assert_eq!(boosted_min_freq(BoostState::MAX_BOOST, 800, MAX, FLOOR), MAX);
    }

    #[test]
    fn test_input_boost_capped_at_max() {
        assert_eq!(boosted_min_freq(BoostState::INPUT_BOOST, 800, MAX, FLOOR), 800);
        assert_eq!(boosted_min_freq(BoostState::INPUT_BOOST, 5000, MAX, FLOOR), MAX);
    }

    #[test]
    fn test_idle_is_floor() {
        assert_eq!(boosted_min_freq(BoostState::empty(), 800, MAX, FLOOR), FLOOR);
    }

    #[test]
    fn test_atomic_bits() {
        let state = AtomicBoostState::new();
        state.insert(BoostState::MAX_BOOST);
        state.insert(BoostState::SCREEN_OFF);
        state.transition(BoostState::INPUT_BOOST, BoostState::MAX_BOOST);
        assert_eq!(state.load(), BoostState::SCREEN_OFF | BoostState::INPUT_BOOST);

        state.remove(BoostState::SCREEN_OFF);
        assert!(!state.intersects(BoostState::SCREEN_OFF));
        assert_eq!(state.load(), BoostState::INPUT_BOOST);
    }
}
