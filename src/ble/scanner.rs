//! BLE scanning functionality.
//!
//! Provides the scanner for discovering OpenScale scales.

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::ble::uuids::{is_scale_service, SERVICE_UUID};
use crate::data::DEFAULT_DEVICE_NAME;
use crate::error::{Error, Result};

/// A scale found while scanning.
#[derive(Debug, Clone)]
pub struct ScaleDiscoveryEvent {
    /// The BLE peripheral identifier.
    pub identifier: String,
    /// The peripheral handle.
    pub peripheral: Peripheral,
    /// Advertised local name.
    pub name: String,
    /// Signal strength in dBm.
    pub rssi: Option<i16>,
}

/// BLE scanner for discovering OpenScale scales.
pub struct BleScanner {
    /// The BLE adapter to use for scanning.
    adapter: Adapter,
}

impl BleScanner {
    /// Create a new BLE scanner on the first available adapter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedPlatform`] when no Bluetooth manager or
    /// adapter exists, and [`Error::InsecureContext`] when the platform denies
    /// this process access to Bluetooth.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new().await.map_err(platform_error)?;

        let adapters = manager.adapters().await.map_err(platform_error)?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::UnsupportedPlatform)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Ok(Self::with_adapter(adapter))
    }

    /// Create a new BLE scanner with a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self { adapter }
    }

    /// Scan until a scale matching `name_filter` advertises the OpenScale
    /// service, or until `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] when nothing matched in time.
    pub async fn find_scale(
        &self,
        timeout: Duration,
        name_filter: Option<&str>,
    ) -> Result<ScaleDiscoveryEvent> {
        info!("Starting BLE scan for OpenScale devices");

        let mut events = self.adapter.events().await?;
        self.adapter
            .start_scan(ScanFilter {
                services: vec![SERVICE_UUID],
            })
            .await?;

        let deadline = tokio::time::Instant::now() + timeout;

        let found = loop {
            let event = match tokio::time::timeout_at(deadline, events.next()).await {
                Ok(Some(event)) => event,
                Ok(None) => {
                    debug!("Adapter event stream ended");
                    break None;
                }
                Err(_) => {
                    debug!("Scan timed out after {:?}", timeout);
                    break None;
                }
            };

            let id = match event {
                CentralEvent::DeviceDiscovered(id)
                | CentralEvent::DeviceUpdated(id)
                | CentralEvent::ServicesAdvertisement { id, .. } => id,
                _ => continue,
            };

            if let Some(found) = self.process_peripheral(id, name_filter).await {
                break Some(found);
            }
        };

        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        let found = found.ok_or(Error::DeviceNotFound)?;
        info!("Found scale {} ({})", found.name, found.identifier);
        Ok(found)
    }

    /// Get the underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Inspect a peripheral and return it if it is a matching scale.
    async fn process_peripheral(
        &self,
        id: PeripheralId,
        name_filter: Option<&str>,
    ) -> Option<ScaleDiscoveryEvent> {
        let peripheral = match self.adapter.peripheral(&id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                return None;
            }
        };

        let properties = match peripheral.properties().await {
            Ok(Some(p)) => p,
            _ => return None,
        };

        // Some platforms ignore the scan filter.
        if !properties.services.iter().any(is_scale_service) {
            trace!("Ignoring peripheral without OpenScale service: {:?}", id);
            return None;
        }

        let name = properties
            .local_name
            .unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string());

        if !matches_name(&name, name_filter) {
            debug!("Skipping scale {} (name filter {:?})", name, name_filter);
            return None;
        }

        Some(ScaleDiscoveryEvent {
            identifier: id.to_string(),
            peripheral,
            name,
            rssi: properties.rssi,
        })
    }
}

/// Map a platform setup failure to the platform-support error kinds.
fn platform_error(e: btleplug::Error) -> Error {
    match e {
        btleplug::Error::PermissionDenied => Error::InsecureContext,
        other => {
            debug!("Bluetooth unavailable: {}", other);
            Error::UnsupportedPlatform
        }
    }
}

/// Check a scale name against an optional filter.
fn matches_name(name: &str, filter: Option<&str>) -> bool {
    match filter {
        Some(filter) => name.contains(filter),
        None => true,
    }
}
