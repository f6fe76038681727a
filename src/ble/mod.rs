//! BLE communication module.
//!
//! This module provides low-level Bluetooth Low Energy functionality
//! for discovering and communicating with OpenScale scales.

pub mod characteristics;
pub mod connection;
pub mod scanner;
pub mod transport;
pub mod uuids;

pub use characteristics::CharacteristicHandler;
pub use connection::{ConnectionState, PeripheralConnection};
pub use scanner::{BleScanner, ScaleDiscoveryEvent};
pub use transport::{BtleTransport, ScaleTransport, TransportEvent};
pub use uuids::*;
