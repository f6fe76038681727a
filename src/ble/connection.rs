//! BLE connection management.
//!
//! Handles the transport-level connection to a single scale peripheral.

use btleplug::api::Peripheral as _;
use btleplug::platform::{Peripheral, PeripheralId};
use tracing::{debug, error, info};

use crate::error::{Error, Result};

/// Connection state for a scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    /// Not connected to the scale.
    #[default]
    Disconnected,
    /// Looking for a scale advertising the OpenScale service.
    Scanning,
    /// Currently attempting to connect.
    Connecting,
    /// Connected to the scale.
    Connected,
}

impl ConnectionState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if in a transitional state.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Scanning | Self::Connecting)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Scanning => write!(f, "Scanning"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Transport-level connection to one scale peripheral.
///
/// Makes a single attempt per call; retry policy belongs to the caller.
pub struct PeripheralConnection {
    /// The peripheral to manage.
    peripheral: Peripheral,
}

impl PeripheralConnection {
    /// Create a new connection wrapper for a peripheral.
    pub fn new(peripheral: Peripheral) -> Self {
        Self { peripheral }
    }

    /// Get the peripheral.
    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }

    /// Platform identifier of the peripheral.
    pub fn id(&self) -> PeripheralId {
        self.peripheral.id()
    }

    /// Connect and discover the peripheral's GATT services.
    pub async fn connect(&self) -> Result<()> {
        if self.peripheral.is_connected().await.unwrap_or(false) {
            info!("Peripheral already connected at BLE level");
        } else {
            self.peripheral.connect().await.map_err(|e| {
                error!("Failed to connect to scale: {}", e);
                Error::Transport(e)
            })?;
            info!("Connected to scale peripheral");
        }

        debug!("Discovering services");
        self.peripheral.discover_services().await?;

        Ok(())
    }

    /// Disconnect from the peripheral if connected.
    pub async fn disconnect(&self) -> Result<()> {
        if !self.peripheral.is_connected().await.unwrap_or(false) {
            debug!("Peripheral already disconnected");
            return Ok(());
        }

        match self.peripheral.disconnect().await {
            Ok(_) => {
                info!("Successfully disconnected from scale");
                Ok(())
            }
            Err(e) => {
                error!("Failed to disconnect: {}", e);
                Err(Error::Transport(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state() {
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());

        assert!(ConnectionState::Scanning.is_transitioning());
        assert!(ConnectionState::Connecting.is_transitioning());
        assert!(!ConnectionState::Connected.is_transitioning());
        assert!(!ConnectionState::Disconnected.is_transitioning());
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(format!("{}", ConnectionState::Connected), "Connected");
        assert_eq!(format!("{}", ConnectionState::Scanning), "Scanning");
        assert_eq!(format!("{}", ConnectionState::Disconnected), "Disconnected");
    }

    #[test]
    fn test_default_state() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }
}
