//! Wire encoding for the OpenScale characteristics.
//!
//! | Characteristic | Encoding |
//! |---|---|
//! | Weight | 4-byte little-endian IEEE-754 float, grams |
//! | Tare | 1 byte, `0x01` |
//! | Sample Rate | 1 byte unsigned, range [1, 80] |
//! | Calibration Factor | 4-byte little-endian IEEE-754 float |
//! | Device Name | UTF-8, at most 20 characters, no terminator |

use bytes::{Buf, BufMut, BytesMut};

use crate::data::{clamp_sample_rate, truncate_device_name};
use crate::error::{Error, Result};

/// Command byte written to the tare characteristic.
pub const TARE_COMMAND: u8 = 0x01;

/// Size of an encoded f32 value.
const F32_SIZE: usize = 4;

/// Decode a weight notification into grams.
///
/// Trailing bytes beyond the first four are ignored.
pub fn decode_weight(data: &[u8]) -> Result<f32> {
    decode_f32(data, "weight")
}

/// Encode a weight in grams as the scale would notify it.
pub fn encode_weight(weight_grams: f32) -> Vec<u8> {
    encode_f32(weight_grams)
}

/// Encode the tare command.
pub fn encode_tare() -> Vec<u8> {
    vec![TARE_COMMAND]
}

/// Encode a sample rate, clamping it into [1, 80] first.
pub fn encode_sample_rate(rate: u32) -> Vec<u8> {
    vec![clamp_sample_rate(rate)]
}

/// Decode a sample rate read from the scale.
pub fn decode_sample_rate(data: &[u8]) -> Result<u8> {
    let mut buf = data;
    if !buf.has_remaining() {
        return Err(Error::InvalidData {
            context: "Sample rate value is empty".to_string(),
        });
    }
    Ok(buf.get_u8())
}

/// Encode a calibration factor.
pub fn encode_calibration(factor: f32) -> Vec<u8> {
    encode_f32(factor)
}

/// Decode a calibration factor read from the scale.
pub fn decode_calibration(data: &[u8]) -> Result<f32> {
    decode_f32(data, "calibration factor")
}

/// Encode a device name, truncated to 20 characters.
pub fn encode_device_name(name: &str) -> Vec<u8> {
    truncate_device_name(name).into_bytes()
}

/// Decode a device name read from the scale.
///
/// Invalid sequences are replaced rather than rejected, matching how
/// browsers decode the characteristic.
pub fn decode_device_name(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

fn encode_f32(value: f32) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(F32_SIZE);
    buf.put_f32_le(value);
    buf.to_vec()
}

fn decode_f32(data: &[u8], what: &str) -> Result<f32> {
    let mut buf = data;
    if buf.remaining() < F32_SIZE {
        return Err(Error::InvalidData {
            context: format!(
                "{} value too short: {} bytes (need {})",
                what,
                data.len(),
                F32_SIZE
            ),
        });
    }
    Ok(buf.get_f32_le())
}
