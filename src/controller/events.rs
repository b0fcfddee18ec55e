//! # Event Subscriptions
//!
//! Subscriber lists for the three manager events. Handlers are invoked
//! synchronously on the poll thread, in the order they were registered.
//! A slow handler delays the remaining slots of the tick and the next
//! tick's sleep, so handlers should hand off heavy work elsewhere.

use parking_lot::RwLock;
use std::sync::Arc;

use super::device::Device;
use super::state::GamepadState;

/// Handler for a device transitioning from disconnected to connected
pub type ConnectedCallback = Arc<dyn Fn(&Device) + Send + Sync>;

/// Handler for a device transitioning from connected to disconnected (slot index)
pub type DisconnectedCallback = Arc<dyn Fn(usize) + Send + Sync>;

/// Handler for a new packet on a connected device
pub type StateChangedCallback = Arc<dyn Fn(&Device, &GamepadState) + Send + Sync>;

/// Subscriber lists shared between the manager and its poll loop
#[derive(Default)]
pub struct Subscribers {
    connected: RwLock<Vec<ConnectedCallback>>,
    disconnected: RwLock<Vec<DisconnectedCallback>>,
    state_changed: RwLock<Vec<StateChangedCallback>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_connected(&self, callback: ConnectedCallback) {
        self.connected.write().push(callback);
    }

    pub fn on_disconnected(&self, callback: DisconnectedCallback) {
        self.disconnected.write().push(callback);
    }

    pub fn on_state_changed(&self, callback: StateChangedCallback) {
        self.state_changed.write().push(callback);
    }

    // Handlers run outside the lock so they may subscribe further handlers.

    pub(crate) fn emit_connected(&self, device: &Device) {
        let handlers = self.connected.read().clone();
        for handler in &handlers {
            handler(device);
        }
    }

    pub(crate) fn emit_disconnected(&self, slot: usize) {
        let handlers = self.disconnected.read().clone();
        for handler in &handlers {
            handler(slot);
        }
    }

    pub(crate) fn emit_state_changed(&self, device: &Device, state: &GamepadState) {
        let handlers = self.state_changed.read().clone();
        for handler in &handlers {
            handler(device, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullBackend;
    use std::sync::Mutex;

    #[test]
    fn test_fan_out_in_registration_order() {
        let subscribers = Subscribers::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let calls = calls.clone();
            subscribers.on_disconnected(Arc::new(move |slot| {
                calls.lock().unwrap().push((id, slot));
            }));
        }

        subscribers.emit_disconnected(2);
        assert_eq!(*calls.lock().unwrap(), vec![(0, 2), (1, 2), (2, 2)]);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let subscribers = Subscribers::new();
        let device = Device::new(0, Arc::new(NullBackend)).unwrap();
        subscribers.emit_connected(&device);
        subscribers.emit_disconnected(0);
    }

    #[test]
    fn test_handler_may_subscribe() {
        let subscribers = Arc::new(Subscribers::new());
        let inner = subscribers.clone();
        subscribers.on_disconnected(Arc::new(move |_| {
            inner.on_disconnected(Arc::new(|_| {}));
        }));

        subscribers.emit_disconnected(0);
        assert_eq!(subscribers.disconnected.read().len(), 2);
    }
}
