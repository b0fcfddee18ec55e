//! # Deadzone Module
//!
//! Converts raw stick and trigger readings into normalized values.
//!
//! ## Radial Deadzone
//!
//! Stick deflections whose magnitude is at or below the deadzone radius are
//! reported as exactly zero. Beyond the radius, the remaining range is
//! rescaled so full deflection still reaches magnitude 1.0:
//!
//! `scale = clamp((m - deadzone) / (32767 - deadzone), 0, 1)`
//!
//! The direction of the input vector is preserved. Diagonal deflections can
//! exceed 32767 in magnitude; those are clamped to 1.0.
//!
//! ## Triggers
//!
//! Triggers are gated, not rescaled: a reading at or below the threshold is
//! 0.0, anything above is `value / 255`.
//!
//! ## Usage
//!
//! ```
//! use xpad_poll::controller::deadzone::apply_radial_deadzone;
//!
//! // Resting stick noise inside the deadzone
//! let stick = apply_radial_deadzone(1200, -900, 7849, false);
//! assert_eq!((stick.x, stick.y), (0.0, 0.0));
//!
//! // Full right deflection
//! let stick = apply_radial_deadzone(32767, 0, 7849, false);
//! assert!((stick.x - 1.0).abs() < 0.001);
//! ```

use super::state::{Buttons, DeadzoneConfig, GamepadState, RawSnapshot, Stick};

/// Largest single-axis stick deflection.
pub const STICK_MAX: f32 = 32767.0;

/// Largest trigger reading.
pub const TRIGGER_MAX: f32 = 255.0;

/// Applies a radial deadzone to a raw stick reading.
///
/// # Arguments
///
/// * `x`, `y` - Raw stick axes (-32768 to 32767)
/// * `deadzone` - Deadzone radius in raw units. Negative values act as 0.
/// * `clamp_after_deadzone` - Rescaling policy. Both policies yield the same
///   result today; the flag is kept so callers can select one explicitly.
///
/// # Returns
///
/// A [`Stick`] that is exactly zero inside the deadzone, and otherwise points
/// in the input direction with magnitude in (0, 1].
#[must_use]
pub fn apply_radial_deadzone(x: i16, y: i16, deadzone: i32, clamp_after_deadzone: bool) -> Stick {
    let deadzone = i64::from(deadzone.max(0));
    let squared = i64::from(x).pow(2) + i64::from(y).pow(2);

    // Exact integer test; float rounding must not swallow inputs just past the radius
    if squared <= deadzone * deadzone {
        return Stick::ZERO;
    }

    let (fx, fy) = (f64::from(x), f64::from(y));
    let magnitude = (squared as f64).sqrt();
    let (dir_x, dir_y) = (fx / magnitude, fy / magnitude);

    let deadzone = deadzone as f64;
    let max = f64::from(STICK_MAX);

    // Deadzones at or past full deflection leave no range to rescale into
    let scale = if deadzone >= max {
        1.0
    } else if clamp_after_deadzone {
        ((magnitude - deadzone) / (max - deadzone)).clamp(0.0, 1.0)
    } else {
        let rescaled = (magnitude - deadzone) / (max - deadzone);
        rescaled.clamp(0.0, 1.0)
    };

    Stick::new((dir_x * scale) as f32, (dir_y * scale) as f32)
}

/// Converts a raw trigger value (0-255) to 0.0 to 1.0.
///
/// # Examples
///
/// ```
/// use xpad_poll::controller::deadzone::normalize_trigger;
///
/// assert_eq!(normalize_trigger(0), 0.0);
/// assert_eq!(normalize_trigger(255), 1.0);
/// ```
#[must_use]
pub fn normalize_trigger(value: u8) -> f32 {
    (f32::from(value) / TRIGGER_MAX).clamp(0.0, 1.0)
}

/// Gates a raw trigger reading with an activation threshold.
///
/// The threshold is not subtracted: a reading just above it normalizes to
/// `value / 255`, not to a value near zero.
///
/// # Examples
///
/// ```
/// use xpad_poll::controller::deadzone::apply_trigger_threshold;
///
/// assert_eq!(apply_trigger_threshold(30, 30), 0.0);
/// assert!((apply_trigger_threshold(31, 30) - 31.0 / 255.0).abs() < 1e-6);
/// ```
#[must_use]
pub fn apply_trigger_threshold(value: u8, threshold: u8) -> f32 {
    if value <= threshold {
        0.0
    } else {
        normalize_trigger(value)
    }
}

/// Normalizes a full raw snapshot under a deadzone policy.
#[must_use]
pub fn normalize_snapshot(raw: &RawSnapshot, config: &DeadzoneConfig) -> GamepadState {
    GamepadState {
        buttons: Buttons::from_bits(raw.buttons),
        left_stick: apply_radial_deadzone(
            raw.thumb_lx,
            raw.thumb_ly,
            config.left_stick,
            config.clamp_after_deadzone,
        ),
        right_stick: apply_radial_deadzone(
            raw.thumb_rx,
            raw.thumb_ry,
            config.right_stick,
            config.clamp_after_deadzone,
        ),
        left_trigger: apply_trigger_threshold(raw.left_trigger, config.trigger_threshold),
        right_trigger: apply_trigger_threshold(raw.right_trigger, config.trigger_threshold),
        packet_number: raw.packet_number,
    }
}
