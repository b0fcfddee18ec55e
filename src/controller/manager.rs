//! # Manager Module
//!
//! Owns the four controller slots and the background poll loop that turns
//! consecutive snapshots into connect, disconnect and state-changed events.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --start()--> Running --stop()--> Idle
//! ```
//!
//! `start()` while running and `stop()` while idle are no-ops.
//!
//! ## Poll Tick
//!
//! Every tick queries slots 0 to 3 in order and compares each result with the
//! last state the loop observed for that slot:
//!
//! | Previous | Now | Events |
//! |----------|-----|--------|
//! | none | not connected | - |
//! | some | not connected | `disconnected` |
//! | none | packet N | `connected`, then `state_changed` |
//! | packet M | packet N (M != N) | `state_changed` |
//! | packet N | packet N | - |
//!
//! A disconnect clears the baseline, so a reconnect always reports both
//! `connected` and `state_changed` even if the packet number is unchanged.
//!
//! ## Threading
//!
//! The loop runs on a dedicated thread driving a current-thread tokio
//! runtime; the inter-tick sleep is the only suspension point and is cut
//! short by `stop()`. Event handlers run on that thread.
//!
//! ## Usage
//!
//! ```no_run
//! use xpad_poll::backend::{open, BackendKind};
//! use xpad_poll::controller::manager::GamepadManager;
//!
//! let mut manager = GamepadManager::new(open(BackendKind::Auto)?)?;
//! manager.on_state_changed(|device, state| {
//!     println!("Slot {}: {}", device.slot(), state);
//! });
//! manager.start()?;
//! // ...
//! manager.stop();
//! # Ok::<(), xpad_poll::error::XpadError>(())
//! ```

use std::ops::Index;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use super::device::Device;
use super::events::Subscribers;
use super::state::GamepadState;
use super::MAX_SLOTS;
use crate::backend::PadBackend;
use crate::error::Result;

/// Default delay between poll ticks (~125 Hz)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 8;

/// Last state the loop observed per slot, used only for diffing
type Observed = [Option<GamepadState>; MAX_SLOTS];

/// Gamepad manager
pub struct GamepadManager {
    devices: Arc<[Device]>,
    subscribers: Arc<Subscribers>,
    poll_interval_ms: Arc<AtomicU64>,
    /// Diff baseline while idle; moved into the loop while running
    observed: Observed,
    worker: Option<PollWorker>,
}

struct PollWorker {
    shutdown: watch::Sender<bool>,
    thread: JoinHandle<Observed>,
}

impl GamepadManager {
    /// Create a manager with one device per slot
    ///
    /// # Errors
    ///
    /// Returns `SlotOutOfRange` if a device cannot be created for a slot.
    pub fn new(backend: Arc<dyn PadBackend>) -> Result<Self> {
        let mut devices = Vec::with_capacity(MAX_SLOTS);
        for slot in 0..MAX_SLOTS {
            devices.push(Device::new(slot, backend.clone())?);
        }

        Ok(Self {
            devices: devices.into(),
            subscribers: Arc::new(Subscribers::new()),
            poll_interval_ms: Arc::new(AtomicU64::new(DEFAULT_POLL_INTERVAL_MS)),
            observed: Default::default(),
            worker: None,
        })
    }

    /// Device for a slot
    ///
    /// # Panics
    ///
    /// Panics if `slot >= MAX_SLOTS`, like slice indexing.
    pub fn device(&self, slot: usize) -> &Device {
        &self.devices[slot]
    }

    /// Device for a slot, or `None` if out of range
    pub fn get(&self, slot: usize) -> Option<&Device> {
        self.devices.get(slot)
    }

    /// All devices in slot order
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Devices that currently answer a query, in slot order
    ///
    /// Independent of the poll loop; queries every slot synchronously.
    pub fn get_connected_devices(&self) -> Vec<&Device> {
        self.devices.iter().filter(|device| device.is_connected()).collect()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.load(Ordering::Relaxed))
    }

    /// Change the tick interval; a running loop picks it up on its next sleep
    ///
    /// Intervals below 1 ms are raised to 1 ms so the loop never spins.
    pub fn set_poll_interval(&self, interval: Duration) {
        let ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX).max(1);
        self.poll_interval_ms.store(ms, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Subscribe to disconnected -> connected transitions
    pub fn on_connected(&self, handler: impl Fn(&Device) + Send + Sync + 'static) {
        self.subscribers.on_connected(Arc::new(handler));
    }

    /// Subscribe to connected -> disconnected transitions (receives the slot index)
    pub fn on_disconnected(&self, handler: impl Fn(usize) + Send + Sync + 'static) {
        self.subscribers.on_disconnected(Arc::new(handler));
    }

    /// Subscribe to packet number changes on connected devices
    pub fn on_state_changed(
        &self,
        handler: impl Fn(&Device, &GamepadState) + Send + Sync + 'static,
    ) {
        self.subscribers.on_state_changed(Arc::new(handler));
    }

    /// Start the poll loop
    ///
    /// No-op if already running.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the poll thread cannot be spawned.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let poll_loop = PollLoop {
            devices: self.devices.clone(),
            subscribers: self.subscribers.clone(),
            observed: self.observed,
        };
        let interval_ms = self.poll_interval_ms.clone();

        let thread = std::thread::Builder::new()
            .name("xpad-poll".to_string())
            .spawn(move || poll_loop.run_blocking(interval_ms, shutdown_rx))?;

        info!("Gamepad polling started ({:?} interval)", self.poll_interval());
        self.worker = Some(PollWorker {
            shutdown: shutdown_tx,
            thread,
        });
        Ok(())
    }

    /// Stop the poll loop and wait for it to exit
    ///
    /// No-op if idle. Never fails: a loop that panicked is logged and the
    /// manager still returns to idle.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        // The loop may already be gone; nothing to signal then
        let _ = worker.shutdown.send(true);

        match worker.thread.join() {
            Ok(observed) => self.observed = observed,
            Err(_) => {
                warn!("Gamepad poll loop panicked; resetting connection baseline");
                self.observed = Default::default();
                for device in self.devices.iter() {
                    device.set_last_state(None);
                }
            }
        }
        info!("Gamepad polling stopped");
    }
}

impl Index<usize> for GamepadManager {
    type Output = Device;

    fn index(&self, slot: usize) -> &Device {
        self.device(slot)
    }
}

impl Drop for GamepadManager {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the poll thread
struct PollLoop {
    devices: Arc<[Device]>,
    subscribers: Arc<Subscribers>,
    observed: Observed,
}

impl PollLoop {
    /// Thread entry point; returns the diff baseline for the next start
    fn run_blocking(self, interval_ms: Arc<AtomicU64>, shutdown: watch::Receiver<bool>) -> Observed {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Failed to create poll loop runtime: {}", e);
                return self.observed;
            }
        };
        runtime.block_on(self.run(interval_ms, shutdown))
    }

    async fn run(mut self, interval_ms: Arc<AtomicU64>, mut shutdown: watch::Receiver<bool>) -> Observed {
        debug!("Poll loop running");

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.tick();

            let delay = Duration::from_millis(interval_ms.load(Ordering::Relaxed));
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                // Fires on stop() and on a dropped sender
                _ = shutdown.changed() => break,
            }
        }

        debug!("Poll loop exited");
        self.observed
    }

    /// One pass over all slots in ascending order
    fn tick(&mut self) {
        for (slot, device) in self.devices.iter().enumerate() {
            let previous = self.observed[slot];

            let Some(state) = device.query() else {
                if previous.is_some() {
                    self.observed[slot] = None;
                    device.set_last_state(None);
                    info!("Controller disconnected from slot {}", slot);
                    self.subscribers.emit_disconnected(slot);
                }
                continue;
            };

            if previous.is_none() {
                info!("Controller connected in slot {}", slot);
                self.subscribers.emit_connected(device);
            }

            let changed = previous.is_none_or(|prev| prev.packet_number != state.packet_number);
            if changed {
                self.observed[slot] = Some(state);
                device.set_last_state(Some(state));
                trace!("Slot {}: {}", slot, state);
                self.subscribers.emit_state_changed(device, &state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mocks::{packet, ScriptedBackend};
    use crate::backend::NullBackend;
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Connected(usize),
        Disconnected(usize),
        StateChanged(usize, u32),
    }

    fn record(manager: &GamepadManager) -> Arc<Mutex<Vec<Event>>> {
        let events = Arc::new(Mutex::new(Vec::new()));

        let log = events.clone();
        manager.on_connected(move |device| {
            log.lock().unwrap().push(Event::Connected(device.slot()));
        });
        let log = events.clone();
        manager.on_disconnected(move |slot| {
            log.lock().unwrap().push(Event::Disconnected(slot));
        });
        let log = events.clone();
        manager.on_state_changed(move |device, state| {
            log.lock().unwrap().push(Event::StateChanged(device.slot(), state.packet_number));
        });

        events
    }

    fn scripted_manager() -> (Arc<ScriptedBackend>, GamepadManager) {
        let backend = Arc::new(ScriptedBackend::new());
        let manager = GamepadManager::new(backend.clone()).unwrap();
        (backend, manager)
    }

    fn poll_loop(manager: &GamepadManager) -> PollLoop {
        PollLoop {
            devices: manager.devices.clone(),
            subscribers: manager.subscribers.clone(),
            observed: Default::default(),
        }
    }

    fn take(events: &Arc<Mutex<Vec<Event>>>) -> Vec<Event> {
        std::mem::take(&mut *events.lock().unwrap())
    }

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    // ==================== Construction Tests ====================

    #[test]
    fn test_new_creates_four_slots() {
        let manager = GamepadManager::new(Arc::new(NullBackend)).unwrap();
        assert_eq!(manager.devices().len(), MAX_SLOTS);
        for slot in 0..MAX_SLOTS {
            assert_eq!(manager.device(slot).slot(), slot);
            assert_eq!(manager[slot].slot(), slot);
        }
        assert!(manager.get(MAX_SLOTS).is_none());
        assert!(!manager.is_running());
    }

    #[test]
    fn test_default_poll_interval() {
        let manager = GamepadManager::new(Arc::new(NullBackend)).unwrap();
        assert_eq!(manager.poll_interval(), Duration::from_millis(8));

        manager.set_poll_interval(Duration::from_millis(16));
        assert_eq!(manager.poll_interval(), Duration::from_millis(16));
    }

    #[test]
    fn test_sub_millisecond_interval_is_raised() {
        let manager = GamepadManager::new(Arc::new(NullBackend)).unwrap();

        manager.set_poll_interval(Duration::from_micros(500));
        assert_eq!(manager.poll_interval(), Duration::from_millis(1));

        manager.set_poll_interval(Duration::ZERO);
        assert_eq!(manager.poll_interval(), Duration::from_millis(1));
    }

    // ==================== Connected Devices Tests ====================

    #[test]
    fn test_get_connected_devices_in_slot_order() {
        let (backend, manager) = scripted_manager();
        backend.set(3, packet(1));
        backend.set(1, packet(1));

        let slots: Vec<usize> = manager.get_connected_devices().iter().map(|d| d.slot()).collect();
        assert_eq!(slots, vec![1, 3]);
    }

    #[test]
    fn test_get_connected_devices_none() {
        let manager = GamepadManager::new(Arc::new(NullBackend)).unwrap();
        assert!(manager.get_connected_devices().is_empty());
    }

    // ==================== Poll Tick Tests ====================

    #[test]
    fn test_tick_event_sequence() {
        let (backend, manager) = scripted_manager();
        let events = record(&manager);
        let mut poll = poll_loop(&manager);

        backend.push(0, [None, packet(1), packet(1), packet(2), None]);

        poll.tick();
        assert!(take(&events).is_empty());

        poll.tick();
        assert_eq!(take(&events), vec![Event::Connected(0), Event::StateChanged(0, 1)]);

        poll.tick();
        assert!(take(&events).is_empty());

        poll.tick();
        assert_eq!(take(&events), vec![Event::StateChanged(0, 2)]);

        poll.tick();
        assert_eq!(take(&events), vec![Event::Disconnected(0)]);

        // Stays disconnected without repeating the event
        poll.tick();
        assert!(take(&events).is_empty());
    }

    #[test]
    fn test_tick_reconnect_resets_baseline() {
        let (backend, manager) = scripted_manager();
        let events = record(&manager);
        let mut poll = poll_loop(&manager);

        backend.push(2, [packet(7), None, packet(7)]);

        poll.tick();
        poll.tick();
        assert_eq!(
            take(&events),
            vec![Event::Connected(2), Event::StateChanged(2, 7), Event::Disconnected(2)]
        );

        poll.tick();
        assert_eq!(take(&events), vec![Event::Connected(2), Event::StateChanged(2, 7)]);
    }

    #[test]
    fn test_tick_orders_events_by_slot() {
        let (backend, manager) = scripted_manager();
        let events = record(&manager);
        let mut poll = poll_loop(&manager);

        backend.set(3, packet(30));
        backend.set(0, packet(10));
        backend.set(2, packet(20));

        poll.tick();
        assert_eq!(
            take(&events),
            vec![
                Event::Connected(0),
                Event::StateChanged(0, 10),
                Event::Connected(2),
                Event::StateChanged(2, 20),
                Event::Connected(3),
                Event::StateChanged(3, 30),
            ]
        );
    }

    #[test]
    fn test_tick_queries_each_slot_once() {
        let (backend, manager) = scripted_manager();
        let mut poll = poll_loop(&manager);

        poll.tick();
        assert_eq!(*backend.queries.lock(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_tick_updates_device_last_state() {
        let (backend, manager) = scripted_manager();
        let mut poll = poll_loop(&manager);

        backend.push(1, [packet(4), packet(5), None]);

        poll.tick();
        assert_eq!(manager.device(1).last_state().unwrap().packet_number, 4);

        poll.tick();
        assert_eq!(manager.device(1).last_state().unwrap().packet_number, 5);

        poll.tick();
        assert!(manager.device(1).last_state().is_none());
    }

    #[test]
    fn test_state_changed_receives_normalized_state() {
        let (backend, manager) = scripted_manager();
        let mut poll = poll_loop(&manager);
        let seen = Arc::new(Mutex::new(None));

        let slot_seen = seen.clone();
        manager.on_state_changed(move |device, state| {
            assert_eq!(device.last_state(), Some(*state));
            *slot_seen.lock().unwrap() = Some(*state);
        });

        backend.set(
            0,
            Some(crate::controller::state::RawSnapshot {
                packet_number: 3,
                thumb_lx: 32767,
                right_trigger: 255,
                ..Default::default()
            }),
        );
        poll.tick();

        let state = seen.lock().unwrap().unwrap();
        assert!((state.left_stick.x - 1.0).abs() < 0.001);
        assert_eq!(state.right_trigger, 1.0);
    }

    // ==================== Lifecycle Tests ====================

    #[test]
    fn test_stop_without_start() {
        let mut manager = GamepadManager::new(Arc::new(NullBackend)).unwrap();
        manager.stop();
        manager.stop();
        assert!(!manager.is_running());
    }

    #[test]
    fn test_start_twice_runs_one_loop() {
        let (backend, mut manager) = scripted_manager();
        let events = record(&manager);
        backend.set(0, packet(1));

        manager.start().unwrap();
        manager.start().unwrap();
        assert!(manager.is_running());

        assert!(wait_until(Duration::from_secs(2), || !events.lock().unwrap().is_empty()));
        std::thread::sleep(Duration::from_millis(50));
        manager.stop();

        assert_eq!(take(&events), vec![Event::Connected(0), Event::StateChanged(0, 1)]);
        assert!(!manager.is_running());
    }

    #[test]
    fn test_running_loop_reports_changes() {
        let (backend, mut manager) = scripted_manager();
        let events = record(&manager);
        manager.set_poll_interval(Duration::from_millis(1));

        manager.start().unwrap();
        backend.set(1, packet(1));
        assert!(wait_until(Duration::from_secs(2), || events.lock().unwrap().len() >= 2));

        backend.set(1, None);
        assert!(wait_until(Duration::from_secs(2), || {
            events.lock().unwrap().contains(&Event::Disconnected(1))
        }));
        manager.stop();

        assert_eq!(
            take(&events),
            vec![Event::Connected(1), Event::StateChanged(1, 1), Event::Disconnected(1)]
        );
    }

    #[test]
    fn test_shorter_interval_applies_while_running() {
        let (backend, mut manager) = scripted_manager();
        manager.set_poll_interval(Duration::from_millis(200));

        manager.start().unwrap();
        assert!(wait_until(Duration::from_secs(2), || backend.queries.lock().len() >= 4));

        // 200 ms ticks would need 10 s for this many queries
        manager.set_poll_interval(Duration::from_millis(1));
        assert!(wait_until(Duration::from_secs(3), || backend.queries.lock().len() >= 200));
        manager.stop();
    }

    #[test]
    fn test_longer_interval_applies_while_running() {
        let (backend, mut manager) = scripted_manager();
        manager.set_poll_interval(Duration::from_millis(1));

        manager.start().unwrap();
        assert!(wait_until(Duration::from_secs(2), || backend.queries.lock().len() >= 8));

        manager.set_poll_interval(Duration::from_secs(30));
        std::thread::sleep(Duration::from_millis(50));
        let settled = backend.queries.lock().len();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(backend.queries.lock().len(), settled);

        let started = Instant::now();
        manager.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_stop_interrupts_sleep() {
        let mut manager = GamepadManager::new(Arc::new(NullBackend)).unwrap();
        manager.set_poll_interval(Duration::from_secs(30));

        manager.start().unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let started = Instant::now();
        manager.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_restart_keeps_baseline() {
        let (backend, mut manager) = scripted_manager();
        let events = record(&manager);
        backend.set(0, packet(9));

        manager.start().unwrap();
        assert!(wait_until(Duration::from_secs(2), || events.lock().unwrap().len() >= 2));
        manager.stop();
        take(&events);

        // Same packet after restart: nothing new to report
        manager.start().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        manager.stop();
        assert!(take(&events).is_empty());
    }

    #[test]
    fn test_panicking_handler_does_not_break_stop() {
        let (backend, mut manager) = scripted_manager();
        manager.on_connected(|_| panic!("handler failure"));
        backend.set(0, packet(1));

        manager.start().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        manager.stop();
        assert!(!manager.is_running());
    }

    #[test]
    fn test_drop_stops_loop() {
        let (backend, mut manager) = scripted_manager();
        manager.start().unwrap();
        drop(manager);

        let queries = backend.queries.lock().len();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(backend.queries.lock().len(), queries);
    }
}
