//! # XInput Backend
//!
//! Reads Xbox-compatible controllers through the Windows XInput API using
//! `rusty-xinput`. XInput addresses controllers by user index 0-3, which
//! maps directly onto slots.

use rusty_xinput::{XInputHandle, XInputState, XInputUsageError};
use tracing::{debug, trace};

use super::PadBackend;
use crate::controller::state::RawSnapshot;
use crate::error::{Result, XpadError};

/// XInput controller backend
pub struct XInputBackend {
    handle: XInputHandle,
}

impl XInputBackend {
    /// Load the system XInput library
    ///
    /// # Errors
    ///
    /// Returns `Backend` if no XInput DLL can be loaded.
    pub fn load() -> Result<Self> {
        let handle = XInputHandle::load_default()
            .map_err(|e| XpadError::Backend(format!("Failed to load XInput: {:?}", e)))?;
        debug!("XInput initialized successfully");
        Ok(Self { handle })
    }
}

impl From<&XInputState> for RawSnapshot {
    fn from(state: &XInputState) -> Self {
        Self {
            packet_number: state.raw.dwPacketNumber,
            buttons: state.raw.Gamepad.wButtons,
            left_trigger: state.raw.Gamepad.bLeftTrigger,
            right_trigger: state.raw.Gamepad.bRightTrigger,
            thumb_lx: state.raw.Gamepad.sThumbLX,
            thumb_ly: state.raw.Gamepad.sThumbLY,
            thumb_rx: state.raw.Gamepad.sThumbRX,
            thumb_ry: state.raw.Gamepad.sThumbRY,
        }
    }
}

impl PadBackend for XInputBackend {
    fn get_state(&self, slot: usize) -> Option<RawSnapshot> {
        match self.handle.get_state(slot as u32) {
            Ok(state) => Some(RawSnapshot::from(&state)),
            Err(XInputUsageError::DeviceNotConnected) => None,
            Err(e) => {
                trace!("XInputGetState failed for slot {}: {:?}", slot, e);
                None
            }
        }
    }

    fn set_vibration(&self, slot: usize, low_motor: u16, high_motor: u16) -> Result<()> {
        self.handle
            .set_state(slot as u32, low_motor, high_motor)
            .map_err(|e| XpadError::Backend(format!("XInputSetState failed: {:?}", e)))
    }
}
