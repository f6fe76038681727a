//! BLE Service and Characteristic UUIDs.
//!
//! Contains the UUID constants of the OpenScale GATT service. These must
//! match the scale firmware exactly.

use uuid::Uuid;

/// OpenScale service UUID.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x4faf_c201_1fb5_459e_8fcc_c5c9c331914b);
/// Weight characteristic UUID (Notify, f32 little-endian grams).
pub const WEIGHT_CHAR_UUID: Uuid = Uuid::from_u128(0xbeb5_483e_36e1_4688_b7f5_ea07361b26a8);
/// Tare characteristic UUID (Write, single command byte).
pub const TARE_CHAR_UUID: Uuid = Uuid::from_u128(0x1c95_d5e3_d8f7_413a_bf3d_7a2e5d7be87e);
/// Sample rate characteristic UUID (Read/Write, u8 Hz).
pub const SAMPLE_RATE_CHAR_UUID: Uuid = Uuid::from_u128(0xa898_5fae_51a4_4e28_b0a2_6c1aeede3f3d);
/// Calibration factor characteristic UUID (Read/Write, f32 little-endian).
pub const CALIBRATION_CHAR_UUID: Uuid = Uuid::from_u128(0xd587_5408_fa51_4e89_a0f7_3c7e8e8c5e41);
/// Device name characteristic UUID (Read/Write, UTF-8).
pub const DEVICE_NAME_CHAR_UUID: Uuid = Uuid::from_u128(0x8a2c_5f47_b91e_4d36_a6c8_9f0e7d3b1c28);

/// The five characteristics of the OpenScale service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScaleCharacteristic {
    /// Streamed weight notifications.
    Weight,
    /// Tare command.
    Tare,
    /// Sample rate control.
    SampleRate,
    /// Calibration factor.
    Calibration,
    /// User-assigned device name.
    DeviceName,
}

impl ScaleCharacteristic {
    /// All characteristics, in resolution order.
    pub const ALL: [ScaleCharacteristic; 5] = [
        Self::Weight,
        Self::Tare,
        Self::SampleRate,
        Self::Calibration,
        Self::DeviceName,
    ];

    /// UUID of this characteristic.
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::Weight => WEIGHT_CHAR_UUID,
            Self::Tare => TARE_CHAR_UUID,
            Self::SampleRate => SAMPLE_RATE_CHAR_UUID,
            Self::Calibration => CALIBRATION_CHAR_UUID,
            Self::DeviceName => DEVICE_NAME_CHAR_UUID,
        }
    }

    /// Look up a characteristic by UUID.
    pub fn from_uuid(uuid: &Uuid) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.uuid() == *uuid)
    }
}

impl std::fmt::Display for ScaleCharacteristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Weight => write!(f, "Weight"),
            Self::Tare => write!(f, "Tare"),
            Self::SampleRate => write!(f, "Sample Rate"),
            Self::Calibration => write!(f, "Calibration"),
            Self::DeviceName => write!(f, "Device Name"),
        }
    }
}

/// Check if a service UUID is the OpenScale service.
pub fn is_scale_service(uuid: &Uuid) -> bool {
    *uuid == SERVICE_UUID
}
