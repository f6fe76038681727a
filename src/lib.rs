// Allow derivable impls for clarity
#![allow(clippy::derivable_impls)]
// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # openscale-ble
//!
//! A cross-platform Rust library for OpenScale Bluetooth Low Energy weight
//! scales, with a software emulator that behaves like a real device.
//!
//! ## Features
//!
//! - **Discovery**: Find scales advertising the OpenScale GATT service
//! - **Live Weight**: Stream weight notifications as timestamped samples
//! - **Device Control**: Tare, sample rate, calibration factor and device name
//! - **Calibration**: Two-step calibration against a reference weight
//! - **Peak and History**: Peak weight since tare and a bounded recording
//!   buffer
//! - **Emulator**: Noise, pulls, hold, ramp and manual signal generators for
//!   development without hardware
//!
//! Both [`DeviceLink`] and [`DeviceEmulator`] implement [`ScaleSource`], so
//! application code can switch between them freely.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use openscale_ble::{DeviceLink, LinkConfig, Result, ScaleSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let scale = DeviceLink::new(LinkConfig::default());
//!
//!     let _weights = scale.events().on_weight_updated(|sample| {
//!         println!("{:.1} g", sample.weight_grams);
//!     });
//!
//!     let name = scale.connect().await?;
//!     println!("Connected to {}", name);
//!
//!     scale.tare().await?;
//!     scale.set_sample_rate(20).await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(10)).await;
//!     scale.disconnect().await
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps. A denied permission surfaces as
//! [`Error::InsecureContext`].
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for data types

// Public modules
pub mod ble;
pub mod config;
pub mod data;
pub mod device_link;
pub mod emulator;
pub mod error;
pub mod events;
pub mod protocol;
pub mod source;
pub mod utils;

// Re-exports for convenience
pub use config::{EmulatorConfig, LinkConfig};
pub use device_link::DeviceLink;
pub use emulator::{DeviceEmulator, SimulationMode, SimulationPhase, SimulationState};
pub use error::{Error, Result};
pub use events::{CallbackHandle, EventHub, ScaleEvent};
pub use source::ScaleSource;
pub use utils::{grams_to_kilograms, grams_to_ounces, grams_to_pounds, pounds_to_grams};

// Re-export commonly used types from submodules
pub use ble::connection::ConnectionState;
pub use ble::transport::{BtleTransport, ScaleTransport, TransportEvent};
pub use ble::uuids::ScaleCharacteristic;
pub use data::{DeviceConfig, WeightSample, WeightTracker, CALIBRATION_REFERENCE_GRAMS};
