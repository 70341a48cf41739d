//! # Helix Devfreq Input Boost
//!
//! Temporarily raises the minimum frequency of devfreq devices (memory bus
//! bandwidth voters and the like) when the user touches the screen or
//! presses a key, and drops it to the floor while the display is off.
//!
//! ## Architecture
//!
//! ```text
//!   input events ──┐                 display blank/unblank
//!                  ▼                           │
//!          ┌──────────────┐                    ▼
//!          │  kick(max)   │            ┌───────────────┐
//!          └──────┬───────┘            │ SCREEN_OFF bit│
//!                 │ set bits           └───────┬───────┘
//!                 ▼                            │
//!   ┌──────────────────────────────────────────▼──────┐
//!   │ BoostDevice  state: SCREEN_OFF|INPUT|MAX  ◀── unboost timer
//!   └──────────────────────┬──────────────────────────┘
//!                          │ wake
//!                          ▼
//!              devfreq_boostd/<n> (SCHED_FIFO)
//!                          │ min_freq, update_devfreq
//!                          ▼
//!                       Devfreq
//! ```
//!
//! Producers never block: they flip state bits and wake the device's worker.
//! Each device has exactly one worker, which is the only writer of the
//! target's minimum frequency.
//!
//! ## Frequency Precedence
//!
//! | State            | Minimum frequency             |
//! |------------------|-------------------------------|
//! | `SCREEN_OFF`     | lowest table entry            |
//! | `MAX_BOOST`      | `max_freq`                    |
//! | `INPUT_BOOST`    | `min(boost_freq, max_freq)`   |
//! | none             | lowest table entry            |

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

pub mod config;
pub mod device;
pub mod display;
pub mod error;
pub mod input;
pub mod state;

#[cfg(feature = "std")]
pub mod boost;
#[cfg(feature = "std")]
pub mod delayed;
#[cfg(feature = "std")]
pub mod driver;
#[cfg(feature = "std")]
pub mod waitq;
#[cfg(feature = "std")]
pub mod worker;

pub use config::{BoostConfig, DevfreqDevice, DEVFREQ_MAX};
pub use device::{Devfreq, DevfreqLimits, DevfreqProfile, Governor, PowersaveGovernor};
pub use display::{BlankMode, DisplayAction, DisplayClient, DisplayEvent, DisplayNotifierChain, NotifierChain, NotifyResult};
pub use error::{BoostError, BoostResult};
pub use input::{InputCapabilities, InputCore, InputDevice, InputDeviceId, InputEvent, InputHandler, BOOST_INPUT_IDS};
pub use state::{boosted_min_freq, AtomicBoostState, BoostState};

#[cfg(feature = "std")]
pub use boost::BoostDevice;
#[cfg(feature = "std")]
pub use driver::{
    devfreq_boost_driver, devfreq_boost_init, devfreq_boost_kick, devfreq_register_boost_device, BoostDevices, BoostDriver,
};
