//! # Device Module
//!
//! One controller slot: deadzone policy, last known state, and synchronous
//! access to the native backend.
//!
//! Connectivity is never stored. It is derived by attempting a query.
//!
//! ## Concurrency
//!
//! A device may be used from any thread while the manager's poll loop runs.
//! The deadzone policy and the last known state each sit behind their own
//! lock; a manual [`Device::set_last_state`] racing the loop's own update
//! resolves as last-write-wins.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use super::deadzone::normalize_snapshot;
use super::state::{DeadzoneConfig, GamepadState};
use super::MAX_SLOTS;
use crate::backend::PadBackend;
use crate::error::{Result, XpadError};

/// Full-scale native motor speed.
pub const MOTOR_MAX: f32 = 65535.0;

/// A single controller slot
pub struct Device {
    slot: usize,
    backend: Arc<dyn PadBackend>,
    deadzone: RwLock<DeadzoneConfig>,
    last_state: RwLock<Option<GamepadState>>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("slot", &self.slot)
            .field("deadzone", &*self.deadzone.read())
            .field("last_state", &*self.last_state.read())
            .finish_non_exhaustive()
    }
}

impl Device {
    /// Create a device for a slot
    ///
    /// # Errors
    ///
    /// Returns `SlotOutOfRange` if `slot` is not in `0..MAX_SLOTS`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use xpad_poll::backend::NullBackend;
    /// use xpad_poll::controller::device::Device;
    ///
    /// let device = Device::new(0, Arc::new(NullBackend))?;
    /// assert!(!device.is_connected());
    /// assert!(Device::new(4, Arc::new(NullBackend)).is_err());
    /// # Ok::<(), xpad_poll::error::XpadError>(())
    /// ```
    pub fn new(slot: usize, backend: Arc<dyn PadBackend>) -> Result<Self> {
        if slot >= MAX_SLOTS {
            return Err(XpadError::SlotOutOfRange { slot });
        }
        Ok(Self {
            slot,
            backend,
            deadzone: RwLock::new(DeadzoneConfig::default()),
            last_state: RwLock::new(None),
        })
    }

    /// Slot index (0-3)
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Current deadzone policy
    pub fn deadzone(&self) -> DeadzoneConfig {
        *self.deadzone.read()
    }

    /// Replace the deadzone policy; applies to the next query
    pub fn set_deadzone(&self, config: DeadzoneConfig) {
        *self.deadzone.write() = config;
    }

    /// Modify the deadzone policy in place
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use xpad_poll::backend::NullBackend;
    /// # use xpad_poll::controller::device::Device;
    /// let device = Device::new(1, Arc::new(NullBackend))?;
    /// device.update_deadzone(|dz| dz.trigger_threshold = 10);
    /// assert_eq!(device.deadzone().trigger_threshold, 10);
    /// # Ok::<(), xpad_poll::error::XpadError>(())
    /// ```
    pub fn update_deadzone(&self, f: impl FnOnce(&mut DeadzoneConfig)) {
        f(&mut *self.deadzone.write());
    }

    /// Query and normalize the current state
    ///
    /// Returns `None` when the slot is not connected. This never updates the
    /// last known state; only the manager's poll loop does that.
    pub fn query(&self) -> Option<GamepadState> {
        let raw = self.backend.get_state(self.slot)?;
        let config = self.deadzone();
        Some(normalize_snapshot(&raw, &config))
    }

    /// True if a query would currently succeed
    ///
    /// Skips normalization but costs one native query.
    pub fn is_connected(&self) -> bool {
        self.backend.get_state(self.slot).is_some()
    }

    /// Last state recorded by the poll loop (or by [`Device::set_last_state`])
    pub fn last_state(&self) -> Option<GamepadState> {
        *self.last_state.read()
    }

    pub fn set_last_state(&self, state: Option<GamepadState>) {
        *self.last_state.write() = state;
    }

    /// Set motor speeds in 0.0 to 1.0 (low-frequency, high-frequency)
    ///
    /// Inputs are clamped before scaling to the native range. Native failures
    /// are logged at trace level and otherwise ignored.
    pub fn set_vibration(&self, low: f32, high: f32) {
        let low_motor = motor_speed(low);
        let high_motor = motor_speed(high);
        if let Err(e) = self.backend.set_vibration(self.slot, low_motor, high_motor) {
            trace!("Ignoring vibration failure on slot {}: {}", self.slot, e);
        }
    }

    /// Stop both motors
    pub fn stop_vibration(&self) {
        self.set_vibration(0.0, 0.0);
    }
}

/// Converts a 0.0 to 1.0 motor speed to the native 16-bit range.
///
/// NaN maps to 0.
fn motor_speed(value: f32) -> u16 {
    (value.clamp(0.0, 1.0) * MOTOR_MAX) as u16
}
