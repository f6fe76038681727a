//! Connection to a physical OpenScale device over BLE.
//!
//! A [`DeviceLink`] drives one scale through discovery, connection and
//! characteristic resolution, caches its configuration and republishes weight
//! notifications as [`ScaleEvent`]s. The radio side sits behind
//! [`ScaleTransport`] so the link logic can run against a mock.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::ble::connection::ConnectionState;
use crate::ble::transport::{BtleTransport, ScaleTransport, TransportEvent};
use crate::ble::uuids::ScaleCharacteristic;
use crate::config::LinkConfig;
use crate::data::{
    clamp_sample_rate, truncate_device_name, DeviceConfig, WeightSample, WeightTracker,
};
use crate::error::{Error, Result};
use crate::events::{EventHub, ScaleEvent, DEFAULT_EVENT_CAPACITY};
use crate::protocol::codec;
use crate::source::ScaleSource;

/// Cached state of the linked scale.
#[derive(Debug, Default)]
struct LinkState {
    /// Connection state.
    connection: ConnectionState,
    /// Advertised name of the connected scale.
    device_name: Option<String>,
    /// Last known device configuration.
    config: DeviceConfig,
}

struct LinkShared {
    state: RwLock<LinkState>,
    events: EventHub,
    tracker: Mutex<WeightTracker>,
}

impl LinkShared {
    /// Move to `state`, emitting an event only if it changed.
    fn set_connection(&self, state: ConnectionState, device_name: Option<String>) -> bool {
        {
            let mut link = self.state.write();
            if link.connection == state {
                return false;
            }
            link.connection = state;
            link.device_name = if state.is_connected() {
                device_name.clone()
            } else {
                None
            };
        }

        debug!("Link state: {}", state);
        self.events.emit(ScaleEvent::ConnectionChanged { state, device_name });
        true
    }

    fn connection(&self) -> ConnectionState {
        self.state.read().connection
    }

    fn require_connected(&self) -> Result<()> {
        if self.connection().is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    /// Fail a pending connect that `disconnect()` has overtaken.
    fn still_in(&self, expected: ConnectionState) -> Result<()> {
        if self.connection() == expected {
            Ok(())
        } else {
            Err(Error::ConnectionFailed {
                reason: "cancelled".to_string(),
                source: None,
            })
        }
    }
}

/// A scale reached through a [`ScaleTransport`], by default over BLE.
pub struct DeviceLink<T: ScaleTransport = BtleTransport> {
    transport: Arc<T>,
    shared: Arc<LinkShared>,
    /// Task forwarding transport events.
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceLink<BtleTransport> {
    /// Create a BLE link. Nothing is scanned until [`connect`](ScaleSource::connect).
    pub fn new(config: LinkConfig) -> Self {
        let capacity = config.event_capacity;
        Self::from_parts(BtleTransport::new(config), capacity)
    }
}

impl Default for DeviceLink<BtleTransport> {
    fn default() -> Self {
        Self::new(LinkConfig::default())
    }
}

impl<T: ScaleTransport> DeviceLink<T> {
    /// Create a link over a custom transport.
    pub fn with_transport(transport: T) -> Self {
        Self::from_parts(transport, DEFAULT_EVENT_CAPACITY)
    }

    fn from_parts(transport: T, event_capacity: usize) -> Self {
        Self {
            transport: Arc::new(transport),
            shared: Arc::new(LinkShared {
                state: RwLock::new(LinkState::default()),
                events: EventHub::new(event_capacity),
                tracker: Mutex::new(WeightTracker::new()),
            }),
            listener: Mutex::new(None),
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Name of the connected scale as it advertised itself.
    pub fn device_name(&self) -> Option<String> {
        self.shared.state.read().device_name.clone()
    }

    fn stop_listener(&self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
        }
    }

    /// Forward transport events until the transport reports a disconnect.
    fn start_listener(&self, mut rx: broadcast::Receiver<TransportEvent>) {
        let shared = Arc::clone(&self.shared);
        let transport = Arc::clone(&self.transport);

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(TransportEvent::Notification {
                        characteristic: ScaleCharacteristic::Weight,
                        data,
                    }) => match codec::decode_weight(&data) {
                        Ok(weight) => {
                            let sample = WeightSample::now(weight);
                            shared.tracker.lock().record(sample);
                            trace!("Weight: {:.1} g", weight);
                            shared.events.emit(ScaleEvent::WeightUpdated(sample));
                        }
                        Err(e) => warn!("Dropping weight notification: {}", e),
                    },
                    Ok(TransportEvent::Notification { characteristic, .. }) => {
                        debug!("Ignoring notification from {}", characteristic);
                    }
                    Ok(TransportEvent::Disconnected) => {
                        info!("Scale dropped the connection");
                        shared.set_connection(ConnectionState::Disconnected, None);
                        if let Err(e) = transport.close().await {
                            warn!("Failed to close transport after disconnect: {}", e);
                        }
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Link listener lagged, skipped {} transport events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Link listener stopped");
        });

        if let Some(previous) = self.listener.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Discover, open and prime the cache. State is `Scanning` on entry.
    async fn establish(&self) -> Result<String> {
        info!("Scanning for OpenScale devices");
        let name = self.transport.discover().await?;
        self.shared.still_in(ConnectionState::Scanning)?;

        info!("Found {}, connecting", name);
        self.shared.set_connection(ConnectionState::Connecting, None);

        // Subscribe before opening so no early notification is missed.
        let rx = self.transport.events();
        self.transport.open().await?;
        self.start_listener(rx);

        self.fetch_sample_rate().await;
        self.fetch_calibration().await;
        self.fetch_device_name().await;

        self.shared.still_in(ConnectionState::Connecting)?;
        Ok(name)
    }

    async fn read_characteristic(&self, characteristic: ScaleCharacteristic) -> Option<Vec<u8>> {
        match self.transport.read(characteristic).await {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("Failed to read {}: {}", characteristic, e);
                None
            }
        }
    }

    async fn fetch_sample_rate(&self) -> Option<u8> {
        let data = self.read_characteristic(ScaleCharacteristic::SampleRate).await?;
        let raw = codec::decode_sample_rate(&data)
            .map_err(|e| warn!("Bad sample rate value: {}", e))
            .ok()?;
        let rate = clamp_sample_rate(raw as u32);
        if rate != raw {
            warn!("Scale reported {} Hz, using {} Hz", raw, rate);
        }

        self.shared.state.write().config.sample_rate_hz = rate;
        self.shared.events.emit(ScaleEvent::SampleRateUpdated(rate));
        Some(rate)
    }

    async fn fetch_calibration(&self) -> Option<f32> {
        let data = self.read_characteristic(ScaleCharacteristic::Calibration).await?;
        let factor = codec::decode_calibration(&data)
            .map_err(|e| warn!("Bad calibration value: {}", e))
            .ok()?;

        self.shared.state.write().config.calibration_factor = factor;
        self.shared.events.emit(ScaleEvent::CalibrationUpdated(factor));
        Some(factor)
    }

    async fn fetch_device_name(&self) -> Option<String> {
        let data = self.read_characteristic(ScaleCharacteristic::DeviceName).await?;
        let name = codec::decode_device_name(&data);

        self.shared.state.write().config.device_name = name.clone();
        self.shared
            .events
            .emit(ScaleEvent::DeviceNameUpdated(name.clone()));
        Some(name)
    }
}

impl<T: ScaleTransport> Drop for DeviceLink<T> {
    fn drop(&mut self) {
        self.stop_listener();
    }
}

impl<T: ScaleTransport> std::fmt::Debug for DeviceLink<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.read();
        f.debug_struct("DeviceLink")
            .field("connection", &state.connection)
            .field("device_name", &state.device_name)
            .field("config", &state.config)
            .finish()
    }
}

#[async_trait]
impl<T: ScaleTransport> ScaleSource for DeviceLink<T> {
    fn events(&self) -> &EventHub {
        &self.shared.events
    }

    fn connection_state(&self) -> ConnectionState {
        self.shared.connection()
    }

    fn device_config(&self) -> DeviceConfig {
        self.shared.state.read().config.clone()
    }

    fn weight_tracker(&self) -> &Mutex<WeightTracker> {
        &self.shared.tracker
    }

    async fn connect(&self) -> Result<String> {
        {
            let state = self.shared.state.read();
            match state.connection {
                ConnectionState::Connected => {
                    return Ok(state.device_name.clone().unwrap_or_default());
                }
                ConnectionState::Scanning | ConnectionState::Connecting => {
                    return Err(Error::ConnectionFailed {
                        reason: "connection already in progress".to_string(),
                        source: None,
                    });
                }
                ConnectionState::Disconnected => {}
            }
        }

        self.transport.check_platform().await?;

        if !self
            .shared
            .set_connection(ConnectionState::Scanning, None)
        {
            return Err(Error::ConnectionFailed {
                reason: "connection already in progress".to_string(),
                source: None,
            });
        }

        match self.establish().await {
            Ok(name) => {
                self.shared
                    .set_connection(ConnectionState::Connected, Some(name.clone()));
                info!("Connected to {}", name);
                Ok(name)
            }
            Err(e) => {
                warn!("Connection failed: {}", e);
                self.stop_listener();
                if let Err(close_err) = self.transport.close().await {
                    debug!("Cleanup after failed connect: {}", close_err);
                }
                self.shared
                    .set_connection(ConnectionState::Disconnected, None);
                Err(Error::connection_failed(e))
            }
        }
    }

    async fn disconnect(&self) -> Result<()> {
        self.stop_listener();
        let changed = self
            .shared
            .set_connection(ConnectionState::Disconnected, None);

        if let Err(e) = self.transport.close().await {
            warn!("Error while closing transport: {}", e);
        }

        if changed {
            info!("Disconnected");
        }
        Ok(())
    }

    async fn tare(&self) -> Result<()> {
        self.shared.require_connected()?;

        self.transport
            .write(ScaleCharacteristic::Tare, codec::encode_tare())
            .await?;
        self.shared.tracker.lock().reset_peak();
        info!("Tare sent");
        Ok(())
    }

    async fn read_sample_rate(&self) -> Option<u8> {
        self.shared.require_connected().ok()?;
        self.fetch_sample_rate().await
    }

    async fn set_sample_rate(&self, rate_hz: u32) -> Result<u8> {
        self.shared.require_connected()?;

        let rate = clamp_sample_rate(rate_hz);
        self.transport
            .write(
                ScaleCharacteristic::SampleRate,
                codec::encode_sample_rate(rate as u32),
            )
            .await?;

        self.shared.state.write().config.sample_rate_hz = rate;
        info!("Sample rate set to {} Hz", rate);
        self.shared.events.emit(ScaleEvent::SampleRateUpdated(rate));
        Ok(rate)
    }

    async fn read_calibration(&self) -> Option<f32> {
        self.shared.require_connected().ok()?;
        self.fetch_calibration().await
    }

    async fn set_calibration(&self, factor: f32) -> Result<f32> {
        self.shared.require_connected()?;

        self.transport
            .write(
                ScaleCharacteristic::Calibration,
                codec::encode_calibration(factor),
            )
            .await?;

        self.shared.state.write().config.calibration_factor = factor;
        info!("Calibration factor set to {}", factor);
        self.shared.events.emit(ScaleEvent::CalibrationUpdated(factor));
        Ok(factor)
    }

    async fn read_device_name(&self) -> Option<String> {
        self.shared.require_connected().ok()?;
        self.fetch_device_name().await
    }

    async fn set_device_name(&self, name: &str) -> Result<String> {
        self.shared.require_connected()?;

        let name = truncate_device_name(name);
        self.transport
            .write(
                ScaleCharacteristic::DeviceName,
                codec::encode_device_name(&name),
            )
            .await?;

        self.shared.state.write().config.device_name = name.clone();
        info!("Device name set to {}", name);
        self.shared
            .events
            .emit(ScaleEvent::DeviceNameUpdated(name.clone()));
        Ok(name)
    }
}
