//! Scale events and callback registration.
//!
//! Both the real link and the emulator publish the same [`ScaleEvent`]s on a
//! broadcast channel. Consumers either hold a receiver from
//! [`EventHub::subscribe`] or register a callback and keep the returned
//! [`CallbackHandle`] alive for as long as they want to be notified.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

use crate::ble::connection::ConnectionState;
use crate::data::WeightSample;

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Event emitted by a scale source.
#[derive(Debug, Clone, PartialEq)]
pub enum ScaleEvent {
    /// The connection state changed.
    ConnectionChanged {
        /// The new connection state.
        state: ConnectionState,
        /// Name of the connected device, present only when connected.
        device_name: Option<String>,
    },
    /// A new weight sample arrived.
    WeightUpdated(WeightSample),
    /// The sample rate was read or written.
    SampleRateUpdated(u8),
    /// The calibration factor was read or written.
    CalibrationUpdated(f32),
    /// The device name was read or written.
    DeviceNameUpdated(String),
}

/// Callback handle for unregistering callbacks.
pub struct CallbackHandle {
    id: u64,
    unregister_fn: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl CallbackHandle {
    /// Create a new callback handle.
    pub(crate) fn new(id: u64, unregister_fn: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            unregister_fn: Some(Box::new(unregister_fn)),
        }
    }

    /// Unregister this callback.
    pub fn unregister(mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }

    /// Get the callback ID.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }
}

impl std::fmt::Debug for CallbackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackHandle").field("id", &self.id).finish()
    }
}

/// Fan-out point for the events of one scale source.
#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<ScaleEvent>,
    callback_counter: Arc<AtomicU64>,
}

impl EventHub {
    /// Create a hub buffering up to `capacity` events per slow receiver.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            callback_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish an event to all current subscribers.
    pub fn emit(&self, event: ScaleEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }

    /// Subscribe to all events.
    pub fn subscribe(&self) -> broadcast::Receiver<ScaleEvent> {
        self.tx.subscribe()
    }

    /// Number of live receivers, callbacks included.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Register a callback for every event.
    pub fn on_event<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(&ScaleEvent) + Send + Sync + 'static,
    {
        let callback_id = self.callback_counter.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.tx.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => callback(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Callback {} lagged, skipped {} events", callback_id, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        CallbackHandle::new(callback_id, move || {
            handle.abort();
        })
    }

    /// Register a callback for connection state changes.
    pub fn on_connection_changed<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(ConnectionState, Option<&str>) + Send + Sync + 'static,
    {
        self.on_event(move |event| {
            if let ScaleEvent::ConnectionChanged { state, device_name } = event {
                callback(*state, device_name.as_deref());
            }
        })
    }

    /// Register a callback for weight samples.
    pub fn on_weight_updated<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(&WeightSample) + Send + Sync + 'static,
    {
        self.on_event(move |event| {
            if let ScaleEvent::WeightUpdated(sample) = event {
                callback(sample);
            }
        })
    }

    /// Register a callback for sample rate updates.
    pub fn on_sample_rate_updated<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        self.on_event(move |event| {
            if let ScaleEvent::SampleRateUpdated(rate) = event {
                callback(*rate);
            }
        })
    }

    /// Register a callback for calibration factor updates.
    pub fn on_calibration_updated<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(f32) + Send + Sync + 'static,
    {
        self.on_event(move |event| {
            if let ScaleEvent::CalibrationUpdated(factor) = event {
                callback(*factor);
            }
        })
    }

    /// Register a callback for device name updates.
    pub fn on_device_name_updated<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_event(move |event| {
            if let ScaleEvent::DeviceNameUpdated(name) = event {
                callback(name);
            }
        })
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("receivers", &self.tx.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() {
        let hub = EventHub::default();
        let mut rx = hub.subscribe();

        hub.emit(ScaleEvent::SampleRateUpdated(20));
        hub.emit(ScaleEvent::CalibrationUpdated(421.5));

        assert_eq!(rx.recv().await.unwrap(), ScaleEvent::SampleRateUpdated(20));
        assert_eq!(
            rx.recv().await.unwrap(),
            ScaleEvent::CalibrationUpdated(421.5)
        );
    }

    #[test]
    fn test_emit_without_subscribers() {
        let hub = EventHub::new(4);
        hub.emit(ScaleEvent::DeviceNameUpdated("Scale".to_string()));
        assert_eq!(hub.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_typed_callback_filters_events() {
        let hub = EventHub::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let _handle = hub.on_sample_rate_updated(move |rate| {
            sink.lock().unwrap().push(rate);
        });
        // Let the callback task subscribe and park.
        tokio::task::yield_now().await;

        hub.emit(ScaleEvent::CalibrationUpdated(1.0));
        hub.emit(ScaleEvent::SampleRateUpdated(40));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(*seen.lock().unwrap(), vec![40]);
    }

    #[tokio::test]
    async fn test_dropping_handle_unregisters() {
        let hub = EventHub::default();
        let seen = Arc::new(AtomicU64::new(0));

        let counter = seen.clone();
        let handle = hub.on_event(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hub.receiver_count(), 1);

        handle.unregister();
        tokio::time::sleep(Duration::from_millis(20)).await;

        hub.emit(ScaleEvent::SampleRateUpdated(10));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(hub.receiver_count(), 0);
    }

    #[test]
    fn test_callback_handle_ids_increase() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let hub = EventHub::default();
            let first = hub.on_event(|_| {});
            let second = hub.on_event(|_| {});
            assert!(second.id() > first.id());
        });
    }
}
