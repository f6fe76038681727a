//! GATT characteristic handling.
//!
//! Resolves the five OpenScale characteristics on a connected peripheral and
//! provides reading, writing and weight notification forwarding.

use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::ble::transport::TransportEvent;
use crate::ble::uuids::{ScaleCharacteristic, SERVICE_UUID};
use crate::error::{Error, Result};

/// Handler for the OpenScale characteristics on one peripheral.
pub struct CharacteristicHandler {
    /// The peripheral to communicate with.
    peripheral: Peripheral,
    /// Resolved characteristics.
    characteristics: Arc<RwLock<HashMap<ScaleCharacteristic, Characteristic>>>,
    /// Handle to the notification listener task.
    listener_handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl CharacteristicHandler {
    /// Create a new characteristic handler for a peripheral.
    ///
    /// Note: Services must be discovered before calling [`resolve`](Self::resolve).
    pub fn new(peripheral: Peripheral) -> Self {
        Self {
            peripheral,
            characteristics: Arc::new(RwLock::new(HashMap::new())),
            listener_handle: Arc::new(RwLock::new(None)),
        }
    }

    /// Resolve the OpenScale service and all five characteristics.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::ServiceNotFound`] or
    /// [`Error::CharacteristicNotFound`] when the peripheral does not expose
    /// the complete service.
    pub fn resolve(&self) -> Result<()> {
        let service = self
            .peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == SERVICE_UUID)
            .ok_or_else(|| Error::ServiceNotFound {
                uuid: SERVICE_UUID.to_string(),
            })?;

        let mut resolved = HashMap::new();
        for wanted in ScaleCharacteristic::ALL {
            let characteristic = service
                .characteristics
                .iter()
                .find(|c| c.uuid == wanted.uuid())
                .cloned()
                .ok_or_else(|| Error::CharacteristicNotFound {
                    uuid: wanted.uuid().to_string(),
                })?;
            debug!(
                "Resolved {} characteristic, properties: {:?}",
                wanted, characteristic.properties
            );
            resolved.insert(wanted, characteristic);
        }

        *self.characteristics.write() = resolved;

        Ok(())
    }

    /// Drop all resolved characteristic handles.
    pub fn clear(&self) {
        self.characteristics.write().clear();
    }

    fn get(&self, which: ScaleCharacteristic) -> Result<Characteristic> {
        self.characteristics
            .read()
            .get(&which)
            .cloned()
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: which.uuid().to_string(),
            })
    }

    /// Read a characteristic value.
    pub async fn read(&self, which: ScaleCharacteristic) -> Result<Vec<u8>> {
        let characteristic = self.get(which)?;

        let data = self.peripheral.read(&characteristic).await?;

        trace!("Read {} bytes from {} characteristic", data.len(), which);

        Ok(data)
    }

    /// Write to a characteristic, waiting for the scale's response.
    pub async fn write(&self, which: ScaleCharacteristic, data: &[u8]) -> Result<()> {
        let characteristic = self.get(which)?;

        self.peripheral
            .write(&characteristic, data, WriteType::WithResponse)
            .await?;

        trace!("Wrote {} bytes to {} characteristic", data.len(), which);

        Ok(())
    }

    /// Subscribe to weight notifications.
    pub async fn subscribe_weight(&self) -> Result<()> {
        let characteristic = self.get(ScaleCharacteristic::Weight)?;

        self.peripheral.subscribe(&characteristic).await.map_err(|e| {
            debug!("Failed to subscribe to weight: {:?}", e);
            Error::Transport(e)
        })?;

        debug!("Subscribed to weight notifications");

        Ok(())
    }

    /// Forward notifications from the peripheral into `tx`.
    pub async fn start_notifications(&self, tx: broadcast::Sender<TransportEvent>) -> Result<()> {
        if self.listener_handle.read().is_some() {
            return Ok(());
        }

        let mut notifications = self.peripheral.notifications().await?;

        let handle = tokio::spawn(async move {
            debug!("Notification listener started");

            while let Some(notification) = notifications.next().await {
                let Some(characteristic) = ScaleCharacteristic::from_uuid(&notification.uuid)
                else {
                    trace!("Ignoring notification from {}", notification.uuid);
                    continue;
                };

                trace!(
                    "{} notification: {:02X?}",
                    characteristic,
                    notification.value
                );

                let _ = tx.send(TransportEvent::Notification {
                    characteristic,
                    data: notification.value,
                });
            }

            debug!("Notification listener stopped");
        });

        *self.listener_handle.write() = Some(handle);

        Ok(())
    }

    /// Stop forwarding notifications.
    pub fn stop_notifications(&self) {
        if let Some(handle) = self.listener_handle.write().take() {
            handle.abort();
        }
    }
}

impl Drop for CharacteristicHandler {
    fn drop(&mut self) {
        self.stop_notifications();
    }
}
