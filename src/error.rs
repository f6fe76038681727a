//! Error types for the openscale-ble crate.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level failure from the underlying BLE library.
    #[error("BLE transport error: {0}")]
    Transport(#[from] btleplug::Error),

    /// No Bluetooth Low Energy capability on this platform.
    #[error("Bluetooth Low Energy is not supported on this platform")]
    UnsupportedPlatform,

    /// The platform refused access to Bluetooth for this process.
    #[error("Bluetooth access requires a trusted execution context")]
    InsecureContext,

    /// Operation requires a connection but the scale is not connected.
    #[error("Scale not connected")]
    NotConnected,

    /// Discovery, connection or characteristic resolution failed.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// Description of why the connection failed.
        reason: String,
        /// The underlying error, when there is one.
        #[source]
        source: Option<Box<Error>>,
    },

    /// No scale advertising the OpenScale service was found.
    #[error("No scale found advertising the OpenScale service")]
    DeviceNotFound,

    /// Service not found on the device.
    #[error("Service not found: {uuid}")]
    ServiceNotFound {
        /// The UUID of the service that was not found.
        uuid: String,
    },

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// Invalid data was received from the scale.
    #[error("Invalid data received: {context}")]
    InvalidData {
        /// Description of what was invalid about the data.
        context: String,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },
}

impl Error {
    /// Wrap an error raised while establishing a connection.
    pub fn connection_failed(cause: Error) -> Self {
        match cause {
            // Already wrapped by an inner step.
            Error::ConnectionFailed { .. } => cause,
            cause => Error::ConnectionFailed {
                reason: cause.to_string(),
                source: Some(Box::new(cause)),
            },
        }
    }

    /// Check whether this error is a `NotConnected` error.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected)
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
