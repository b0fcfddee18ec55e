//! # xpad-poll Library
//!
//! Polling gamepad input with radial deadzones and connect/disconnect events.
//!
//! This library samples up to four controller slots from a native backend,
//! normalizes stick and trigger values, and reports changes to subscribers
//! from a background poll loop.

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
