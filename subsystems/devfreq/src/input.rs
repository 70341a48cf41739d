//! # Input Source
//!
//! The input-core side of the boost driver: the id table that decides which
//! devices feed boosts, and the traits the input core and its handlers
//! talk through.
//!
//! Matching follows the input core's rules. An id entry lists the event
//! types, absolute axes and keys it needs; a device matches when its
//! capabilities contain every one of them.

use alloc::string::String;
use alloc::sync::Arc;

// =============================================================================
// Event Codes
// =============================================================================

/// Key and button events
pub const EV_KEY: u16 = 0x01;
/// Absolute axis events
pub const EV_ABS: u16 = 0x03;

/// Absolute X axis
pub const ABS_X: u16 = 0x00;
/// Absolute Y axis
pub const ABS_Y: u16 = 0x01;
/// Multi-touch contact X position
pub const ABS_MT_POSITION_X: u16 = 0x35;
/// Multi-touch contact Y position
pub const ABS_MT_POSITION_Y: u16 = 0x36;

/// Touch contact button
pub const BTN_TOUCH: u16 = 0x14a;

/// Highest key code
pub const KEY_MAX: u16 = 0x2ff;

const KEY_WORDS: usize = (KEY_MAX as usize + 1) / 64;

// =============================================================================
// Capabilities
// =============================================================================

/// Event types, absolute axes and keys a device can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputCapabilities {
    evbit: u32,
    absbit: u64,
    keybit: [u64; KEY_WORDS],
}

impl InputCapabilities {
    /// No capabilities
    pub const fn new() -> Self {
        Self {
            evbit: 0,
            absbit: 0,
            keybit: [0; KEY_WORDS],
        }
    }

    /// Add an event type
    pub const fn with_event(mut self, ev: u16) -> Self {
        self.evbit |= 1 << ev;
        self
    }

    /// Add an absolute axis (implies `EV_ABS`)
    pub const fn with_abs(mut self, abs: u16) -> Self {
        self.absbit |= 1 << abs;
        self.with_event(EV_ABS)
    }

    /// Add a key (implies `EV_KEY`)
    pub const fn with_key(mut self, key: u16) -> Self {
        self.keybit[key as usize / 64] |= 1 << (key as usize % 64);
        self.with_event(EV_KEY)
    }

    /// Whether every capability in `other` is present here
    pub fn contains(&self, other: &InputCapabilities) -> bool {
        self.evbit & other.evbit == other.evbit
            && self.absbit & other.absbit == other.absbit
            && self
                .keybit
                .iter()
                .zip(other.keybit.iter())
                .all(|(have, want)| have & want == *want)
    }
}

bitflags::bitflags! {
    /// Which parts of an [`InputDeviceId`] take part in matching
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InputMatch: u32 {
        /// Event types
        const EVBIT = 1 << 0;
        /// Key bits
        const KEYBIT = 1 << 1;
        /// Absolute axis bits
        const ABSBIT = 1 << 2;
    }
}

/// One entry of a handler's id table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputDeviceId {
    /// Fields that must match
    pub flags: InputMatch,
    /// Required capabilities
    pub caps: InputCapabilities,
}

impl InputDeviceId {
    /// Whether a device with `caps` matches this entry
    pub fn matches(&self, caps: &InputCapabilities) -> bool {
        let mut want = InputCapabilities::new();
        if self.flags.contains(InputMatch::EVBIT) {
            want.evbit = self.caps.evbit;
        }
        if self.flags.contains(InputMatch::KEYBIT) {
            want.keybit = self.caps.keybit;
        }
        if self.flags.contains(InputMatch::ABSBIT) {
            want.absbit = self.caps.absbit;
        }
        caps.contains(&want)
    }
}

/// Devices whose events start an input boost
pub const BOOST_INPUT_IDS: [InputDeviceId; 3] = [
    // Multi-touch touchscreen
    InputDeviceId {
        flags: InputMatch::EVBIT.union(InputMatch::ABSBIT),
        caps: InputCapabilities::new()
            .with_abs(ABS_MT_POSITION_X)
            .with_abs(ABS_MT_POSITION_Y),
    },
    // Touchpad
    InputDeviceId {
        flags: InputMatch::KEYBIT.union(InputMatch::ABSBIT),
        caps: InputCapabilities::new()
            .with_key(BTN_TOUCH)
            .with_abs(ABS_X)
            .with_abs(ABS_Y),
    },
    // Keypad
    InputDeviceId {
        flags: InputMatch::EVBIT,
        caps: InputCapabilities::new().with_event(EV_KEY),
    },
];

/// First entry of `table` matching `caps`
pub fn match_device<'a>(table: &'a [InputDeviceId], caps: &InputCapabilities) -> Option<&'a InputDeviceId> {
    table.iter().find(|id| id.matches(caps))
}

// =============================================================================
// Devices & Handlers
// =============================================================================

/// A device known to the input core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDevice {
    /// Core-assigned identifier
    pub id: u32,
    /// Device name
    pub name: String,
    /// What the device reports
    pub caps: InputCapabilities,
}

/// A single input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    /// Event type (`EV_*`)
    pub kind: u16,
    /// Event code
    pub code: u16,
    /// Event value
    pub value: i32,
}

/// Consumer of input events, registered with the input core
pub trait InputHandler: Send + Sync {
    /// Handler name
    fn name(&self) -> &str;

    /// Devices this handler wants
    fn id_table(&self) -> &[InputDeviceId];

    /// Attach to a matching device. Errors are negative errno values.
    fn connect(&self, dev: &InputDevice) -> Result<(), i32>;

    /// Detach from a device
    fn disconnect(&self, dev: &InputDevice);

    /// An event arrived from a connected device
    fn event(&self, dev: &InputDevice, event: InputEvent);
}

/// The input core the handler registers with
pub trait InputCore: Send + Sync {
    /// Register a handler. Errors are negative errno values.
    fn register_handler(&self, handler: Arc<dyn InputHandler>) -> Result<(), i32>;

    /// Unregister a handler, disconnecting it from every device
    fn unregister_handler(&self, handler: &Arc<dyn InputHandler>);
}
