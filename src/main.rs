//! # xpad-poll
//!
//! Gamepad monitor: polls up to four controllers and logs connect,
//! disconnect and state-changed events.
//!
//! # Usage
//!
//! ```bash
//! xpad-poll [CONFIG]
//! ```
//!
//! Expected output:
//! ```text
//! INFO xpad_poll: xpad-poll v0.1.0 starting...
//! INFO xpad_poll::controller::manager: Gamepad polling started (8ms interval)
//! INFO xpad_poll::controller::manager: Controller connected in slot 0
//! DEBUG xpad_poll: Slot 0: Buttons=A, LS=(0.000, 0.000), RS=(0.000, 0.000), LT=0.00, RT=0.00, Pkt=1
//! ```

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use xpad_poll::backend;
use xpad_poll::config::{Config, LoggingConfig};
use xpad_poll::controller::GamepadManager;

/// Rumble strength for the connect pulse (both motors)
const CONNECT_RUMBLE_STRENGTH: f32 = 0.25;

/// Duration of the connect pulse
const CONNECT_RUMBLE_MS: u64 = 200;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("Failed to load {}", path))?,
        None => Config::default(),
    };

    let _log_guard = init_logging(&config.logging);

    info!("xpad-poll v{} starting...", env!("CARGO_PKG_VERSION"));

    let backend = backend::open(config.backend.kind)?;
    let mut manager = GamepadManager::new(backend)?;
    manager.set_poll_interval(config.poll.interval());

    // Handlers run on the poll thread; rumble is handed back to this task
    let (connected_tx, mut connected_rx) = mpsc::unbounded_channel::<usize>();
    manager.on_connected(move |device| {
        let _ = connected_tx.send(device.slot());
    });
    manager.on_disconnected(|slot| {
        info!("Slot {} disconnected", slot);
    });
    manager.on_state_changed(|device, state| {
        debug!("Slot {}: {}", device.slot(), state);
    });

    for device in manager.get_connected_devices() {
        info!("Controller present in slot {}", device.slot());
    }

    manager.start()?;
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            Some(slot) = connected_rx.recv() => {
                let device = manager.device(slot);
                device.set_vibration(CONNECT_RUMBLE_STRENGTH, CONNECT_RUMBLE_STRENGTH);
                sleep(Duration::from_millis(CONNECT_RUMBLE_MS)).await;
                device.stop_vibration();
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    manager.stop();
    for device in manager.devices() {
        device.stop_vibration();
    }

    Ok(())
}

/// Install the tracing subscriber
///
/// A valid `RUST_LOG` replaces the configured level entirely. When a log
/// directory is set, output goes to a daily rolling file instead of stderr;
/// the returned guard flushes it on drop.
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = env_filter(rust_log.as_deref(), &logging.level);

    if logging.log_dir.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&logging.log_dir, "xpad-poll.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

/// Build the log filter from `RUST_LOG` if usable, else from the config level
fn env_filter(rust_log: Option<&str>, level: &str) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")))
}
