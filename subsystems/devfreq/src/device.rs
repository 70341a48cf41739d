//! # Devfreq Devices
//!
//! The frequency-scaled device a boost targets. Its limits live behind the
//! device's own update lock; whoever changes `min_freq` or `max_freq` must
//! hold that lock and call [`Devfreq::update_locked`] before dropping it.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use spin::{Mutex, MutexGuard};

use crate::error::{BoostError, BoostResult};

// =============================================================================
// Profile & Limits
// =============================================================================

/// Static description of a device's operating points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevfreqProfile {
    /// Supported frequencies, ascending
    pub freq_table: Vec<u64>,
}

impl DevfreqProfile {
    /// Profile from a frequency table (sorted and deduplicated here)
    pub fn new(mut freq_table: Vec<u64>) -> Self {
        freq_table.sort_unstable();
        freq_table.dedup();
        Self { freq_table }
    }

    /// Lowest supported frequency
    pub fn lowest(&self) -> Option<u64> {
        self.freq_table.first().copied()
    }

    /// Highest supported frequency
    pub fn highest(&self) -> Option<u64> {
        self.freq_table.last().copied()
    }
}

/// Mutable frequency limits of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevfreqLimits {
    /// Frequency floor
    pub min_freq: u64,
    /// Frequency ceiling
    pub max_freq: u64,
    /// Frequency the device currently runs at
    pub cur_freq: u64,
}

// =============================================================================
// Governor
// =============================================================================

/// Picks the frequency a device should run at
pub trait Governor: Send + Sync {
    /// Governor name
    fn name(&self) -> &'static str;

    /// Desired frequency; the result is clamped to the limits afterwards
    fn target_freq(&self, limits: &DevfreqLimits) -> u64;
}

/// Runs at the floor; boosts show through directly
#[derive(Debug, Clone, Copy, Default)]
pub struct PowersaveGovernor;

impl Governor for PowersaveGovernor {
    fn name(&self) -> &'static str {
        "powersave"
    }

    fn target_freq(&self, limits: &DevfreqLimits) -> u64 {
        limits.min_freq
    }
}

// =============================================================================
// Devfreq
// =============================================================================

/// A frequency-scaled device
pub struct Devfreq {
    name: String,
    profile: DevfreqProfile,
    limits: Mutex<DevfreqLimits>,
    governor: Box<dyn Governor>,
    is_boost_device: AtomicBool,
    updates: AtomicU64,
}

impl Devfreq {
    /// Create a device running at its lowest frequency with full range limits
    pub fn new(
        name: impl Into<String>,
        profile: DevfreqProfile,
        governor: Box<dyn Governor>,
    ) -> BoostResult<Self> {
        let (lowest, highest) = match (profile.lowest(), profile.highest()) {
            (Some(lo), Some(hi)) => (lo, hi),
            _ => return Err(BoostError::InvalidProfile),
        };

        Ok(Self {
            name: name.into(),
            profile,
            limits: Mutex::new(DevfreqLimits {
                min_freq: lowest,
                max_freq: highest,
                cur_freq: lowest,
            }),
            governor,
            is_boost_device: AtomicBool::new(false),
            updates: AtomicU64::new(0),
        })
    }

    /// Device name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Operating points
    pub fn profile(&self) -> &DevfreqProfile {
        &self.profile
    }

    /// Lowest table entry
    pub fn lowest_freq(&self) -> u64 {
        self.profile.freq_table[0]
    }

    /// Take the update lock
    pub fn lock(&self) -> MutexGuard<'_, DevfreqLimits> {
        self.limits.lock()
    }

    /// Snapshot of the limits
    pub fn limits(&self) -> DevfreqLimits {
        *self.limits.lock()
    }

    /// Re-evaluate the running frequency. `limits` must be the guard of
    /// this device's update lock.
    pub fn update_locked(&self, limits: &mut DevfreqLimits) {
        let mut freq = self.governor.target_freq(limits);
        if freq < limits.min_freq {
            freq = limits.min_freq;
        }
        if freq > limits.max_freq {
            freq = limits.max_freq;
        }

        limits.cur_freq = self.recommended_freq(freq, limits.max_freq);
        self.updates.fetch_add(1, Ordering::Relaxed);

        log::trace!(
            "devfreq {}: {} -> {} [{}, {}]",
            self.name,
            self.governor.name(),
            limits.cur_freq,
            limits.min_freq,
            limits.max_freq
        );
    }

    /// Lowest table entry at or above `freq`, unless that overshoots
    /// `ceiling`, then the highest entry at or below `freq`.
    fn recommended_freq(&self, freq: u64, ceiling: u64) -> u64 {
        let table = &self.profile.freq_table;
        if let Some(&up) = table.iter().find(|&&f| f >= freq) {
            if up <= ceiling {
                return up;
            }
        }
        table
            .iter()
            .rev()
            .find(|&&f| f <= freq)
            .copied()
            .unwrap_or(table[0])
    }

    /// Cap the device at `freq`
    pub fn set_max_freq(&self, freq: u64) {
        let mut limits = self.limits.lock();
        limits.max_freq = freq;
        self.update_locked(&mut limits);
    }

    /// Number of frequency re-evaluations so far
    pub fn update_count(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    /// Whether a boost device drives this devfreq
    pub fn is_boost_device(&self) -> bool {
        self.is_boost_device.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_boost_device(&self) {
        self.is_boost_device.store(true, Ordering::Relaxed);
    }
}

impl fmt::Debug for Devfreq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Devfreq")
            .field("name", &self.name)
            .field("governor", &self.governor.name())
            .field("limits", &self.limits())
            .finish()
    }
}

static_assertions::assert_impl_all!(Devfreq: Send, Sync);
