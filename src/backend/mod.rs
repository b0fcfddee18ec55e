//! # Backend Module
//!
//! Native controller access behind a trait, so devices can be driven by the
//! real platform API or by a test double.
//!
//! This module handles:
//! - The [`PadBackend`] contract (state query and vibration per slot)
//! - Platform backend selection ([`BackendKind`], [`open`])
//! - XInput on Windows, evdev on Linux, and a null backend everywhere

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::controller::state::RawSnapshot;
use crate::error::{Result, XpadError};

#[cfg(target_os = "linux")]
pub mod evdev;
#[cfg(windows)]
pub mod xinput;

/// Trait for native controller access
///
/// Implementations must be callable concurrently from the poll thread and
/// from any thread holding a device.
#[cfg_attr(test, mockall::automock)]
pub trait PadBackend: Send + Sync {
    /// Read the current raw state of a slot
    ///
    /// Returns `None` whenever the native layer reports anything other than
    /// success. The specific native error is not surfaced.
    fn get_state(&self, slot: usize) -> Option<RawSnapshot>;

    /// Set motor speeds for a slot (full native 16-bit range)
    fn set_vibration(&self, slot: usize, low_motor: u16, high_motor: u16) -> Result<()>;
}

/// Backend that never sees a controller
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl PadBackend for NullBackend {
    fn get_state(&self, _slot: usize) -> Option<RawSnapshot> {
        None
    }

    fn set_vibration(&self, slot: usize, _low_motor: u16, _high_motor: u16) -> Result<()> {
        Err(XpadError::Backend(format!("no controller backend for slot {}", slot)))
    }
}

/// Backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// XInput on Windows, evdev on Linux, null elsewhere
    #[default]
    Auto,
    Xinput,
    Evdev,
    None,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Auto => "auto",
            BackendKind::Xinput => "xinput",
            BackendKind::Evdev => "evdev",
            BackendKind::None => "none",
        };
        f.write_str(name)
    }
}

/// Open a backend
///
/// # Errors
///
/// Returns `Backend` if the requested backend is not available on this
/// platform or the native library cannot be loaded.
///
/// # Examples
///
/// ```
/// use xpad_poll::backend::{open, BackendKind};
///
/// let backend = open(BackendKind::None)?;
/// assert!(backend.get_state(0).is_none());
/// # Ok::<(), xpad_poll::error::XpadError>(())
/// ```
pub fn open(kind: BackendKind) -> Result<Arc<dyn PadBackend>> {
    let resolved = match kind {
        BackendKind::Auto if cfg!(windows) => BackendKind::Xinput,
        BackendKind::Auto if cfg!(target_os = "linux") => BackendKind::Evdev,
        BackendKind::Auto => BackendKind::None,
        other => other,
    };
    debug!("Opening {} controller backend (requested: {})", resolved, kind);

    match resolved {
        BackendKind::Xinput => open_xinput(),
        BackendKind::Evdev => open_evdev(),
        _ => Ok(Arc::new(NullBackend)),
    }
}

#[cfg(windows)]
fn open_xinput() -> Result<Arc<dyn PadBackend>> {
    Ok(Arc::new(xinput::XInputBackend::load()?))
}

#[cfg(not(windows))]
fn open_xinput() -> Result<Arc<dyn PadBackend>> {
    Err(XpadError::Backend("XInput is only available on Windows".to_string()))
}

#[cfg(target_os = "linux")]
fn open_evdev() -> Result<Arc<dyn PadBackend>> {
    Ok(Arc::new(evdev::EvdevBackend::new()))
}

#[cfg(not(target_os = "linux"))]
fn open_evdev() -> Result<Arc<dyn PadBackend>> {
    Err(XpadError::Backend("evdev is only available on Linux".to_string()))
}
