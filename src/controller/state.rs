//! # Controller State Types
//!
//! Raw and normalized gamepad snapshots, plus the per-device deadzone policy.
//!
//! ## Raw Ranges
//!
//! | Field | Type | Range |
//! |-------|------|-------|
//! | Stick axes | `i16` | -32768 to 32767 (up/right positive) |
//! | Triggers | `u8` | 0 to 255 |
//! | Buttons | `u16` | XInput bitfield |
//!
//! ## Normalized Ranges
//!
//! Sticks are 2D vectors with each component in -1.0 to 1.0 and magnitude
//! at most 1.0. Triggers are 0.0 to 1.0.

use std::fmt;

/// Default left stick radial deadzone (raw units).
pub const LEFT_STICK_DEADZONE: i32 = 7849;

/// Default right stick radial deadzone (raw units).
pub const RIGHT_STICK_DEADZONE: i32 = 8689;

/// Default trigger activation threshold (raw units).
pub const TRIGGER_THRESHOLD: u8 = 30;

/// Pressed-button bitfield using XInput bit positions.
///
/// # Examples
///
/// ```
/// use xpad_poll::controller::state::Buttons;
///
/// let buttons = Buttons::from_bits(Buttons::A.bits() | Buttons::START.bits());
/// assert!(buttons.contains(Buttons::A));
/// assert!(!buttons.contains(Buttons::B));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Buttons(u16);

impl Buttons {
    pub const NONE: Self = Self(0);
    pub const DPAD_UP: Self = Self(0x0001);
    pub const DPAD_DOWN: Self = Self(0x0002);
    pub const DPAD_LEFT: Self = Self(0x0004);
    pub const DPAD_RIGHT: Self = Self(0x0008);
    pub const START: Self = Self(0x0010);
    pub const BACK: Self = Self(0x0020);
    pub const LEFT_THUMB: Self = Self(0x0040);
    pub const RIGHT_THUMB: Self = Self(0x0080);
    pub const LEFT_SHOULDER: Self = Self(0x0100);
    pub const RIGHT_SHOULDER: Self = Self(0x0200);
    pub const A: Self = Self(0x1000);
    pub const B: Self = Self(0x2000);
    pub const X: Self = Self(0x4000);
    pub const Y: Self = Self(0x8000);

    const NAMES: [(Self, &'static str); 14] = [
        (Self::DPAD_UP, "DPadUp"),
        (Self::DPAD_DOWN, "DPadDown"),
        (Self::DPAD_LEFT, "DPadLeft"),
        (Self::DPAD_RIGHT, "DPadRight"),
        (Self::START, "Start"),
        (Self::BACK, "Back"),
        (Self::LEFT_THUMB, "LeftThumb"),
        (Self::RIGHT_THUMB, "RightThumb"),
        (Self::LEFT_SHOULDER, "LeftShoulder"),
        (Self::RIGHT_SHOULDER, "RightShoulder"),
        (Self::A, "A"),
        (Self::B, "B"),
        (Self::X, "X"),
        (Self::Y, "Y"),
    ];

    /// Wraps a raw bitfield. Unknown bits are kept as-is.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// True when every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Buttons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("None");
        }

        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(", ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Raw controller reading as reported by the native layer.
///
/// Produced fresh on every query and never mutated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSnapshot {
    /// Sequence number; the native layer increments it whenever any field changes.
    pub packet_number: u32,
    pub buttons: u16,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub thumb_lx: i16,
    pub thumb_ly: i16,
    pub thumb_rx: i16,
    pub thumb_ry: i16,
}

/// Normalized analog stick position.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stick {
    pub x: f32,
    pub y: f32,
}

impl Stick {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean length of the vector.
    #[must_use]
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

/// Immutable normalized snapshot of a gamepad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GamepadState {
    /// Pressed buttons (passed through unchanged).
    pub buttons: Buttons,
    pub left_stick: Stick,
    pub right_stick: Stick,
    /// Left trigger, 0.0 to 1.0.
    pub left_trigger: f32,
    /// Right trigger, 0.0 to 1.0.
    pub right_trigger: f32,
    /// Packet number of the raw snapshot this state came from.
    pub packet_number: u32,
}

impl fmt::Display for GamepadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Buttons={}, LS=({:.3}, {:.3}), RS=({:.3}, {:.3}), LT={:.2}, RT={:.2}, Pkt={}",
            self.buttons,
            self.left_stick.x,
            self.left_stick.y,
            self.right_stick.x,
            self.right_stick.y,
            self.left_trigger,
            self.right_trigger,
            self.packet_number
        )
    }
}

/// Deadzone policy for one device.
///
/// # Examples
///
/// ```
/// use xpad_poll::controller::state::DeadzoneConfig;
///
/// let config = DeadzoneConfig::default();
/// assert_eq!(config.left_stick, 7849);
/// assert_eq!(config.right_stick, 8689);
/// assert_eq!(config.trigger_threshold, 30);
/// assert!(!config.clamp_after_deadzone);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadzoneConfig {
    /// Left stick radial deadzone radius (raw units).
    pub left_stick: i32,
    /// Right stick radial deadzone radius (raw units).
    pub right_stick: i32,
    /// Trigger readings at or below this value report 0.0.
    pub trigger_threshold: u8,
    /// Selects the clamp-after-deadzone rescaling policy instead of the
    /// smooth rescale. Both currently produce the same output.
    pub clamp_after_deadzone: bool,
}

impl Default for DeadzoneConfig {
    fn default() -> Self {
        Self {
            left_stick: LEFT_STICK_DEADZONE,
            right_stick: RIGHT_STICK_DEADZONE,
            trigger_threshold: TRIGGER_THRESHOLD,
            clamp_after_deadzone: false,
        }
    }
}
