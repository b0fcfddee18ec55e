//! # Controller Module
//!
//! Gamepad sampling and normalization.
//!
//! This module handles:
//! - Radial stick deadzones and trigger thresholds
//! - Per-slot devices with their own deadzone policy
//! - The background poll loop and connect/disconnect/state-changed events

pub mod deadzone;
pub mod device;
pub mod events;
pub mod manager;
pub mod state;

/// Number of controller slots
pub const MAX_SLOTS: usize = 4;

pub use device::Device;
pub use manager::GamepadManager;
pub use state::{Buttons, DeadzoneConfig, GamepadState, RawSnapshot, Stick};
