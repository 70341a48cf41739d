//! # Boost Driver
//!
//! Brings the boost table up and down: one worker per device, the input
//! handler that turns events into kicks, and the display client that pins
//! the floor while the panel is off.
//!
//! ```text
//!   init:      workers ──▶ input handler ──▶ display client
//!   unwind:    workers ◀── input handler ◀── (failure)
//!   shutdown:  display client, input handler, unboost timers, workers
//! ```

use std::sync::{Arc, Weak};

use core::sync::atomic::{AtomicBool, Ordering};

use spin::{Mutex, Once};

use crate::boost::BoostDevice;
use crate::config::{BoostConfig, DevfreqDevice, DEVFREQ_MAX};
use crate::device::Devfreq;
use crate::display::{DisplayAction, DisplayClient, DisplayEvent, DisplayNotifierChain, NotifyResult};
use crate::error::{BoostError, BoostResult};
use crate::input::{InputCore, InputDevice, InputDeviceId, InputEvent, InputHandler, BOOST_INPUT_IDS};
use crate::worker::BoostWorker;

/// Priority of the display client; it runs before every other client
pub const DISPLAY_NOTIFIER_PRIORITY: i32 = i32::MAX;

const EEXIST: i32 = 17;

// =============================================================================
// Device Table
// =============================================================================

/// The fixed table of boost devices
#[derive(Debug)]
pub struct BoostDevices([BoostDevice; DEVFREQ_MAX]);

impl BoostDevices {
    fn new(config: &BoostConfig) -> BoostResult<Self> {
        Ok(Self([
            BoostDevice::new(DevfreqDevice::CpuBw, config)?,
            BoostDevice::new(DevfreqDevice::LlccBw, config)?,
        ]))
    }

    /// Slot of `device`
    pub fn get(&self, device: DevfreqDevice) -> &BoostDevice {
        &self.0[device.index()]
    }

    /// Every slot, in table order
    pub fn iter(&self) -> impl Iterator<Item = &BoostDevice> {
        self.0.iter()
    }
}

// =============================================================================
// Event Sources
// =============================================================================

/// Kicks an input boost on every device for any event of a matched device
struct BoostInputHandler {
    devices: Arc<BoostDevices>,
    handles: Mutex<Vec<u32>>,
}

impl InputHandler for BoostInputHandler {
    fn name(&self) -> &str {
        "devfreq_boost_handler"
    }

    fn id_table(&self) -> &[InputDeviceId] {
        &BOOST_INPUT_IDS
    }

    fn connect(&self, dev: &InputDevice) -> Result<(), i32> {
        let mut handles = self.handles.lock();
        if handles.contains(&dev.id) {
            return Err(-EEXIST);
        }
        handles.push(dev.id);
        log::debug!("devfreq_boost: connected to {}", dev.name);
        Ok(())
    }

    fn disconnect(&self, dev: &InputDevice) {
        self.handles.lock().retain(|&id| id != dev.id);
        log::debug!("devfreq_boost: disconnected from {}", dev.name);
    }

    fn event(&self, _dev: &InputDevice, _event: InputEvent) {
        for b in self.devices.iter() {
            b.kick(false);
        }
    }
}

/// Tracks the panel power state
struct BoostDisplayClient {
    devices: Arc<BoostDevices>,
}

impl DisplayClient for BoostDisplayClient {
    fn name(&self) -> &str {
        "devfreq_boost"
    }

    fn notify(&self, event: &DisplayEvent) -> NotifyResult {
        // Act as soon as the blank starts
        if event.action != DisplayAction::EarlyEventBlank {
            return NotifyResult::Ok;
        }

        for b in self.devices.iter() {
            if event.blank.is_blank() {
                b.screen_off();
            } else {
                b.screen_on();
            }
        }

        NotifyResult::Ok
    }
}

// =============================================================================
// Driver
// =============================================================================

/// A running boost driver
pub struct BoostDriver {
    config: BoostConfig,
    devices: Arc<BoostDevices>,
    workers: Vec<BoostWorker>,
    input: Arc<dyn InputCore>,
    input_handler: Arc<dyn InputHandler>,
    display: Arc<dyn DisplayNotifierChain>,
    display_client: Arc<dyn DisplayClient>,
    running: AtomicBool,
}

impl BoostDriver {
    /// Start workers and register with the input core and the display
    /// notifier chain. On failure everything already started is torn down
    /// in reverse order.
    pub fn init(
        config: BoostConfig,
        input: Arc<dyn InputCore>,
        display: Arc<dyn DisplayNotifierChain>,
    ) -> BoostResult<Self> {
        let devices = Arc::new(BoostDevices::new(&config)?);

        let mut workers = Vec::with_capacity(DEVFREQ_MAX);
        for b in devices.iter() {
            match BoostWorker::spawn(b.shared().clone(), config.realtime) {
                Ok(worker) => workers.push(worker),
                Err(err) => {
                    log::error!("devfreq_boost: {}", err);
                    stop_workers(&mut workers);
                    return Err(err);
                },
            }
        }

        let input_handler: Arc<dyn InputHandler> = Arc::new(BoostInputHandler {
            devices: devices.clone(),
            handles: Mutex::new(Vec::new()),
        });
        if let Err(errno) = input.register_handler(input_handler.clone()) {
            let err = BoostError::InputRegistration(errno);
            log::error!("devfreq_boost: {}", err);
            stop_workers(&mut workers);
            return Err(err);
        }

        let display_client: Arc<dyn DisplayClient> = Arc::new(BoostDisplayClient {
            devices: devices.clone(),
        });
        if let Err(errno) = display.register_client(display_client.clone(), DISPLAY_NOTIFIER_PRIORITY) {
            let err = BoostError::NotifierRegistration(errno);
            log::error!("devfreq_boost: {}", err);
            input.unregister_handler(&input_handler);
            stop_workers(&mut workers);
            return Err(err);
        }

        log::info!("devfreq_boost: {} devices ready", DEVFREQ_MAX);

        Ok(Self {
            config,
            devices,
            workers,
            input,
            input_handler,
            display,
            display_client,
            running: AtomicBool::new(true),
        })
    }

    /// Configuration the driver was started with
    pub fn config(&self) -> &BoostConfig {
        &self.config
    }

    /// The device table
    pub fn devices(&self) -> &BoostDevices {
        &self.devices
    }

    /// Slot of `device`
    pub fn device(&self, device: DevfreqDevice) -> &BoostDevice {
        self.devices.get(device)
    }

    /// Boost one device
    pub fn kick(&self, device: DevfreqDevice, max: bool) {
        self.devices.get(device).kick(max);
    }

    /// Bind `df` to a slot
    pub fn register(&self, device: DevfreqDevice, df: &Arc<Devfreq>) {
        self.devices.get(device).register(df);
    }

    /// Whether `shutdown` has not run yet
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Detach from the event sources and stop every thread. Only the first
    /// call does anything.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        self.display.unregister_client(&self.display_client);
        self.input.unregister_handler(&self.input_handler);

        for b in self.devices.iter() {
            b.cancel_unboost();
        }
        for worker in self.workers.iter().rev() {
            worker.stop();
        }
        for b in self.devices.iter() {
            b.shutdown();
        }

        log::info!("devfreq_boost: stopped");
    }
}

impl Drop for BoostDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl core::fmt::Debug for BoostDriver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BoostDriver")
            .field("config", &self.config)
            .field("devices", &self.devices)
            .field("running", &self.is_running())
            .finish()
    }
}

fn stop_workers(workers: &mut Vec<BoostWorker>) {
    while let Some(worker) = workers.pop() {
        worker.stop();
    }
}

// =============================================================================
// Global Instance
// =============================================================================

static DRIVER: Once<BoostDriver> = Once::new();

/// Targets registered through the global API. Device drivers probe before
/// the boost driver starts, so registrations land here first and are bound
/// to the device table once it exists.
struct BoostTargets {
    targets: [Option<Weak<Devfreq>>; DEVFREQ_MAX],
    bound: bool,
}

static TARGETS: Mutex<BoostTargets> = Mutex::new(BoostTargets {
    targets: [None, None],
    bound: false,
});

/// Start the global driver and bind every target registered so far.
///
/// Only the call that actually runs the bring-up succeeds; every other
/// call, concurrent or later, gets `AlreadyInitialized`.
pub fn devfreq_boost_init(
    config: BoostConfig,
    input: Arc<dyn InputCore>,
    display: Arc<dyn DisplayNotifierChain>,
) -> BoostResult<&'static BoostDriver> {
    let mut ran_init = false;
    let driver = DRIVER.try_call_once(|| {
        ran_init = true;
        BoostDriver::init(config, input, display)
    })?;
    if !ran_init {
        return Err(BoostError::AlreadyInitialized);
    }

    let mut targets = TARGETS.lock();
    for device in DevfreqDevice::ALL {
        if let Some(df) = targets.targets[device.index()].as_ref().and_then(Weak::upgrade) {
            driver.register(device, &df);
        }
    }
    targets.bound = true;

    Ok(driver)
}

/// The global driver, once started
pub fn devfreq_boost_driver() -> Option<&'static BoostDriver> {
    DRIVER.get()
}

/// Boost one device of the global driver. Does nothing before init.
pub fn devfreq_boost_kick(device: DevfreqDevice, max: bool) {
    if let Some(driver) = DRIVER.get() {
        driver.kick(device, max);
    }
}

/// Bind `df` to a slot of the global driver. Before init the target is
/// kept and bound when the driver starts.
pub fn devfreq_register_boost_device(device: DevfreqDevice, df: &Arc<Devfreq>) {
    let mut targets = TARGETS.lock();
    targets.targets[device.index()] = Some(Arc::downgrade(df));

    match DRIVER.get() {
        Some(driver) if targets.bound => driver.register(device, df),
        _ => {
            df.mark_boost_device();
            log::debug!("devfreq_boost: {} queued {} until init", device.name(), df.name());
        },
    }
}
