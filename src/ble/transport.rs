//! Transport seam between the device link and the BLE stack.
//!
//! [`ScaleTransport`] is the narrow set of radio operations the
//! [`DeviceLink`](crate::DeviceLink) needs. [`BtleTransport`] implements it on
//! top of btleplug; tests substitute a mock.

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent};
use btleplug::platform::{Adapter, PeripheralId};
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::ble::characteristics::CharacteristicHandler;
use crate::ble::connection::PeripheralConnection;
use crate::ble::scanner::BleScanner;
use crate::ble::uuids::ScaleCharacteristic;
use crate::config::LinkConfig;
use crate::error::{Error, Result};

/// Event raised by a transport outside of any request.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A characteristic notified a new value.
    Notification {
        /// The characteristic that notified.
        characteristic: ScaleCharacteristic,
        /// Raw notification payload.
        data: Vec<u8>,
    },
    /// The peer dropped the connection or the link was lost.
    Disconnected,
}

/// Radio operations used by the device link.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScaleTransport: Send + Sync + 'static {
    /// Verify the platform can act as a BLE central.
    async fn check_platform(&self) -> Result<()>;

    /// Find a scale advertising the OpenScale service and return its name.
    async fn discover(&self) -> Result<String>;

    /// Connect to the discovered scale, resolve all characteristics and
    /// subscribe to weight notifications.
    async fn open(&self) -> Result<()>;

    /// Tear down the connection and drop resolved characteristics.
    async fn close(&self) -> Result<()>;

    /// Read a characteristic value.
    async fn read(&self, characteristic: ScaleCharacteristic) -> Result<Vec<u8>>;

    /// Write a characteristic value.
    async fn write(&self, characteristic: ScaleCharacteristic, data: Vec<u8>) -> Result<()>;

    /// Subscribe to notifications and unsolicited disconnects.
    fn events(&self) -> broadcast::Receiver<TransportEvent>;
}

/// btleplug-backed transport.
pub struct BtleTransport {
    /// Discovery and connection settings.
    config: LinkConfig,
    /// Scanner, created on the first platform check.
    scanner: RwLock<Option<Arc<BleScanner>>>,
    /// Connection to the discovered scale.
    connection: RwLock<Option<Arc<PeripheralConnection>>>,
    /// Resolved characteristics, cleared on any disconnect.
    handler: Arc<RwLock<Option<Arc<CharacteristicHandler>>>>,
    /// Channel for transport events.
    event_tx: broadcast::Sender<TransportEvent>,
    /// Task watching the adapter for disconnects.
    watcher: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl BtleTransport {
    /// Create a transport; no Bluetooth resources are touched until
    /// [`check_platform`](ScaleTransport::check_platform).
    pub fn new(config: LinkConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            config,
            scanner: RwLock::new(None),
            connection: RwLock::new(None),
            handler: Arc::new(RwLock::new(None)),
            event_tx,
            watcher: RwLock::new(None),
        }
    }

    fn scanner(&self) -> Result<Arc<BleScanner>> {
        self.scanner.read().clone().ok_or(Error::UnsupportedPlatform)
    }

    fn handler(&self) -> Result<Arc<CharacteristicHandler>> {
        self.handler.read().clone().ok_or(Error::NotConnected)
    }

    /// Watch the adapter for the peripheral dropping off.
    async fn watch_disconnect(&self, adapter: &Adapter, peripheral_id: PeripheralId) -> Result<()> {
        let mut events = adapter.events().await?;
        let handler = self.handler.clone();
        let tx = self.event_tx.clone();

        let handle = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let CentralEvent::DeviceDisconnected(id) = event {
                    if id != peripheral_id {
                        continue;
                    }
                    info!("Scale disconnected unexpectedly");
                    if let Some(handler) = handler.write().take() {
                        handler.stop_notifications();
                        handler.clear();
                    }
                    let _ = tx.send(TransportEvent::Disconnected);
                    break;
                }
            }
            debug!("Disconnect watcher stopped");
        });

        if let Some(previous) = self.watcher.write().replace(handle) {
            previous.abort();
        }

        Ok(())
    }
}

#[async_trait]
impl ScaleTransport for BtleTransport {
    async fn check_platform(&self) -> Result<()> {
        if self.scanner.read().is_some() {
            return Ok(());
        }

        let scanner = BleScanner::new().await?;
        *self.scanner.write() = Some(Arc::new(scanner));

        Ok(())
    }

    async fn discover(&self) -> Result<String> {
        let scanner = self.scanner()?;

        let found = scanner
            .find_scale(self.config.scan_timeout, self.config.name_filter.as_deref())
            .await?;

        *self.connection.write() = Some(Arc::new(PeripheralConnection::new(found.peripheral)));

        Ok(found.name)
    }

    async fn open(&self) -> Result<()> {
        let scanner = self.scanner()?;
        let connection = self
            .connection
            .read()
            .clone()
            .ok_or(Error::DeviceNotFound)?;

        connection.connect().await?;

        let handler = Arc::new(CharacteristicHandler::new(connection.peripheral().clone()));
        handler.resolve()?;
        handler.subscribe_weight().await?;
        handler.start_notifications(self.event_tx.clone()).await?;

        *self.handler.write() = Some(handler);

        self.watch_disconnect(scanner.adapter(), connection.id())
            .await?;

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Some(watcher) = self.watcher.write().take() {
            watcher.abort();
        }

        if let Some(handler) = self.handler.write().take() {
            handler.stop_notifications();
            handler.clear();
        }

        let connection = self.connection.write().take();
        match connection {
            Some(connection) => connection.disconnect().await,
            None => Ok(()),
        }
    }

    async fn read(&self, characteristic: ScaleCharacteristic) -> Result<Vec<u8>> {
        self.handler()?.read(characteristic).await
    }

    async fn write(&self, characteristic: ScaleCharacteristic, data: Vec<u8>) -> Result<()> {
        self.handler()?.write(characteristic, &data).await
    }

    fn events(&self) -> broadcast::Receiver<TransportEvent> {
        self.event_tx.subscribe()
    }
}

impl Drop for BtleTransport {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.write().take() {
            watcher.abort();
        }
        if self.handler.read().is_some() {
            warn!("Transport dropped while connected; notifications stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_event_clone() {
        let event = TransportEvent::Notification {
            characteristic: ScaleCharacteristic::Weight,
            data: vec![0, 0, 0x80, 0x3F],
        };
        assert_eq!(event.clone(), event);
    }

    #[tokio::test]
    async fn test_operations_before_platform_check() {
        let transport = BtleTransport::new(LinkConfig::default());

        assert!(matches!(
            transport.discover().await,
            Err(Error::UnsupportedPlatform)
        ));
        assert!(matches!(
            transport.read(ScaleCharacteristic::SampleRate).await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            transport.write(ScaleCharacteristic::Tare, vec![0x01]).await,
            Err(Error::NotConnected)
        ));
        // Closing an unopened transport is a no-op.
        assert!(transport.close().await.is_ok());
    }
}
