//! # evdev Backend
//!
//! Exposes Linux evdev gamepads as XInput-style slots.
//!
//! ## Controller Detection
//!
//! Any `/dev/input/event*` device that reports both `BTN_SOUTH` and `ABS_X`
//! is treated as a gamepad. Devices are assigned to free slots in path order,
//! and free slots are rescanned at most every [`RESCAN_INTERVAL`].
//!
//! ## Axis Mapping
//!
//! | Input | evdev Code | Raw Output |
//! |-------|------------|------------|
//! | Left Stick | ABS_X, ABS_Y | i16, Y inverted |
//! | Right Stick | ABS_RX, ABS_RY | i16, Y inverted |
//! | Triggers | ABS_Z, ABS_RZ | u8 |
//! | D-Pad | ABS_HAT0X, ABS_HAT0Y or BTN_DPAD_* | button bits |
//!
//! evdev has no packet counter, so one is synthesized per slot: it increments
//! whenever the converted reading differs from the previous one.

use ::evdev::{AbsoluteAxisType, Device, Key};
use parking_lot::Mutex;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::PadBackend;
use crate::controller::state::{Buttons, RawSnapshot};
use crate::controller::MAX_SLOTS;
use crate::error::{Result, XpadError};

/// Minimum time between scans for new controllers
pub const RESCAN_INTERVAL: Duration = Duration::from_secs(2);

/// Key to XInput button bit mapping (positional, Xbox layout)
const KEY_MAP: [(Key, Buttons); 14] = [
    (Key::BTN_SOUTH, Buttons::A),
    (Key::BTN_EAST, Buttons::B),
    (Key::BTN_WEST, Buttons::X),
    (Key::BTN_NORTH, Buttons::Y),
    (Key::BTN_TL, Buttons::LEFT_SHOULDER),
    (Key::BTN_TR, Buttons::RIGHT_SHOULDER),
    (Key::BTN_SELECT, Buttons::BACK),
    (Key::BTN_START, Buttons::START),
    (Key::BTN_THUMBL, Buttons::LEFT_THUMB),
    (Key::BTN_THUMBR, Buttons::RIGHT_THUMB),
    (Key::BTN_DPAD_UP, Buttons::DPAD_UP),
    (Key::BTN_DPAD_DOWN, Buttons::DPAD_DOWN),
    (Key::BTN_DPAD_LEFT, Buttons::DPAD_LEFT),
    (Key::BTN_DPAD_RIGHT, Buttons::DPAD_RIGHT),
];

/// evdev gamepad backend
pub struct EvdevBackend {
    slots: Mutex<EvdevSlots>,
}

struct EvdevSlots {
    pads: [Option<EvdevPad>; MAX_SLOTS],
    last_scan: Option<Instant>,
}

struct EvdevPad {
    device: Device,
    path: PathBuf,
    last: Option<RawSnapshot>,
    packet_number: u32,
}

impl Default for EvdevBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl EvdevBackend {
    /// Create a backend; controllers are discovered lazily on first query
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(EvdevSlots {
                pads: Default::default(),
                last_scan: None,
            }),
        }
    }
}

impl PadBackend for EvdevBackend {
    fn get_state(&self, slot: usize) -> Option<RawSnapshot> {
        if slot >= MAX_SLOTS {
            return None;
        }

        let mut slots = self.slots.lock();
        if slots.pads[slot].is_none() {
            slots.rescan_if_due();
        }

        let pad = slots.pads[slot].as_mut()?;
        match pad.read() {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                info!("Controller in slot {} removed ({})", slot, e);
                slots.pads[slot] = None;
                None
            }
        }
    }

    fn set_vibration(&self, slot: usize, _low_motor: u16, _high_motor: u16) -> Result<()> {
        Err(XpadError::Backend(format!(
            "vibration is not supported by the evdev backend (slot {})",
            slot
        )))
    }
}

impl EvdevSlots {
    fn rescan_if_due(&mut self) {
        let now = Instant::now();
        if self
            .last_scan
            .is_some_and(|last| now.duration_since(last) < RESCAN_INTERVAL)
        {
            return;
        }
        self.last_scan = Some(now);

        let held: Vec<PathBuf> = self.pads.iter().flatten().map(|pad| pad.path.clone()).collect();

        // Sort for deterministic slot assignment when multiple controllers are connected
        let mut found: Vec<(PathBuf, Device)> = ::evdev::enumerate()
            .filter(|(path, device)| !held.contains(path) && is_gamepad(device))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));

        let mut found = found.into_iter();
        for (slot, entry) in self.pads.iter_mut().enumerate() {
            if entry.is_some() {
                continue;
            }
            let Some((path, device)) = found.next() else {
                break;
            };
            info!(
                "Assigned {} ({}) to slot {}",
                device.name().unwrap_or("unknown controller"),
                path.display(),
                slot
            );
            *entry = Some(EvdevPad {
                device,
                path,
                last: None,
                packet_number: 0,
            });
        }

        for (path, device) in found {
            debug!(
                "No free slot for {} ({})",
                device.name().unwrap_or("unknown controller"),
                path.display()
            );
        }
    }
}

impl EvdevPad {
    fn read(&mut self) -> io::Result<RawSnapshot> {
        let abs = self.device.get_abs_state()?;
        let keys = self.device.get_key_state()?;

        let axis = |code: AbsoluteAxisType| {
            let info = &abs[code.0 as usize];
            (info.value, info.minimum, info.maximum)
        };
        let stick = |code: AbsoluteAxisType, invert: bool| {
            let (value, min, max) = axis(code);
            scale_stick(value, min, max, invert)
        };
        let trigger = |code: AbsoluteAxisType| {
            let (value, min, max) = axis(code);
            scale_trigger(value, min, max)
        };

        let mut buttons = KEY_MAP
            .iter()
            .filter(|(key, _)| keys.contains(*key))
            .fold(0u16, |bits, (_, button)| bits | button.bits());
        buttons |= hat_to_dpad(
            axis(AbsoluteAxisType::ABS_HAT0X).0,
            axis(AbsoluteAxisType::ABS_HAT0Y).0,
        );

        let snapshot = RawSnapshot {
            packet_number: 0,
            buttons,
            left_trigger: trigger(AbsoluteAxisType::ABS_Z),
            right_trigger: trigger(AbsoluteAxisType::ABS_RZ),
            thumb_lx: stick(AbsoluteAxisType::ABS_X, false),
            thumb_ly: stick(AbsoluteAxisType::ABS_Y, true),
            thumb_rx: stick(AbsoluteAxisType::ABS_RX, false),
            thumb_ry: stick(AbsoluteAxisType::ABS_RY, true),
        };

        Ok(self.stamp(snapshot))
    }

    /// Assign a packet number, advancing it when the reading changed
    fn stamp(&mut self, snapshot: RawSnapshot) -> RawSnapshot {
        if self.last != Some(snapshot) {
            self.packet_number = self.packet_number.wrapping_add(1);
            self.last = Some(snapshot);
        }
        RawSnapshot {
            packet_number: self.packet_number,
            ..snapshot
        }
    }
}

fn is_gamepad(device: &Device) -> bool {
    let has_south = device
        .supported_keys()
        .is_some_and(|keys| keys.contains(Key::BTN_SOUTH));
    let has_stick = device
        .supported_absolute_axes()
        .is_some_and(|axes| axes.contains(AbsoluteAxisType::ABS_X));
    has_south && has_stick
}

/// Rescales an absolute axis reading to the signed 16-bit stick range.
///
/// Axes with an empty range (unsupported by the device) read as centered.
fn scale_stick(value: i32, min: i32, max: i32, invert: bool) -> i16 {
    if max <= min {
        return 0;
    }
    let unit = ((value - min) as f32 / (max - min) as f32).clamp(0.0, 1.0) * 2.0 - 1.0;
    let unit = if invert { -unit } else { unit };
    (unit * 32767.0).round() as i16
}

/// Rescales an absolute axis reading to the 0-255 trigger range.
fn scale_trigger(value: i32, min: i32, max: i32) -> u8 {
    if max <= min {
        return 0;
    }
    let unit = ((value - min) as f32 / (max - min) as f32).clamp(0.0, 1.0);
    (unit * 255.0).round() as u8
}

/// D-pad hat axes (-1/0/1) to XInput D-pad bits.
fn hat_to_dpad(hat_x: i32, hat_y: i32) -> u16 {
    let mut bits = 0;
    if hat_x < 0 {
        bits |= Buttons::DPAD_LEFT.bits();
    } else if hat_x > 0 {
        bits |= Buttons::DPAD_RIGHT.bits();
    }
    if hat_y < 0 {
        bits |= Buttons::DPAD_UP.bits();
    } else if hat_y > 0 {
        bits |= Buttons::DPAD_DOWN.bits();
    }
    bits
}
