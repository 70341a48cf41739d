//! # Boost Configuration
//!
//! The fixed device table and the build-time boost parameters.

use core::time::Duration;

/// How long an input boost lasts after the last input event
pub const DEFAULT_INPUT_BOOST_DURATION_MS: u64 = 100;

/// How long a max boost lasts
pub const DEFAULT_MAX_BOOST_DURATION_MS: u64 = 1000;

/// Input boost floor for the CPU to DDR bandwidth voter
pub const DEFAULT_CPUBW_BOOST_FREQ: u64 = 5412;

/// Input boost floor for the CPU to LLCC bandwidth voter
pub const DEFAULT_LLCCBW_BOOST_FREQ: u64 = 6881;

/// Highest realtime priority + 1
pub const MAX_RT_PRIO: i32 = 100;

/// Number of boostable devices
pub const DEVFREQ_MAX: usize = 2;

/// The boostable devfreq devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(usize)]
pub enum DevfreqDevice {
    /// CPU to DDR bandwidth
    CpuBw  = 0,
    /// CPU to LLCC bandwidth
    LlccBw = 1,
}

impl DevfreqDevice {
    /// Every device, in table order
    pub const ALL: [DevfreqDevice; DEVFREQ_MAX] = [DevfreqDevice::CpuBw, DevfreqDevice::LlccBw];

    /// Slot in the device table
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Device for a table slot
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(DevfreqDevice::CpuBw),
            1 => Some(DevfreqDevice::LlccBw),
            _ => None,
        }
    }

    /// Device name
    pub const fn name(self) -> &'static str {
        match self {
            DevfreqDevice::CpuBw => "cpubw",
            DevfreqDevice::LlccBw => "llccbw",
        }
    }
}

/// Boost driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoostConfig {
    /// Input boost length
    pub input_boost_duration: Duration,
    /// Max boost length
    pub max_boost_duration: Duration,
    /// Input boost floor per device
    pub boost_freqs: [u64; DEVFREQ_MAX],
    /// Run workers as SCHED_FIFO at `MAX_RT_PRIO - 1`
    pub realtime: bool,
}

impl BoostConfig {
    /// Build-time defaults
    pub const fn new() -> Self {
        Self {
            input_boost_duration: Duration::from_millis(DEFAULT_INPUT_BOOST_DURATION_MS),
            max_boost_duration: Duration::from_millis(DEFAULT_MAX_BOOST_DURATION_MS),
            boost_freqs: [DEFAULT_CPUBW_BOOST_FREQ, DEFAULT_LLCCBW_BOOST_FREQ],
            realtime: true,
        }
    }

    /// Set the input boost length
    pub const fn with_input_boost_duration(mut self, duration: Duration) -> Self {
        self.input_boost_duration = duration;
        self
    }

    /// Set the max boost length
    pub const fn with_max_boost_duration(mut self, duration: Duration) -> Self {
        self.max_boost_duration = duration;
        self
    }

    /// Set the input boost floor of one device
    pub fn with_boost_freq(mut self, device: DevfreqDevice, freq: u64) -> Self {
        self.boost_freqs[device.index()] = freq;
        self
    }

    /// Keep workers on the normal scheduling policy
    pub const fn without_realtime(mut self) -> Self {
        self.realtime = false;
        self
    }

    /// Input boost floor of `device`
    #[inline]
    pub const fn boost_freq(&self, device: DevfreqDevice) -> u64 {
        self.boost_freqs[device.index()]
    }
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_table() {
        for (i, dev) in DevfreqDevice::ALL.iter().enumerate() {
            assert_eq!(dev.index(), i);
            assert_eq!(DevfreqDevice::from_index(i), Some(*dev));
        }
        assert_eq!(DevfreqDevice::from_index(DEVFREQ_MAX), None);
    }

    #[test]
    fn test_config_builder() {
        let config = BoostConfig::new()
            .with_boost_freq(DevfreqDevice::LlccBw, 42)
            .with_input_boost_duration(Duration::from_millis(5));
        assert_eq!(config.boost_freq(DevfreqDevice::LlccBw), 42);
        assert_eq!(config.boost_freq(DevfreqDevice::CpuBw), DEFAULT_CPUBW_BOOST_FREQ);
        assert_eq!(config.input_boost_duration, Duration::from_millis(5));
        assert!(config.input_boost_duration < config.max_boost_duration);
    }
}
