//! Protocol module for encoding and decoding characteristic values.
//!
//! This module contains the byte-level contract with the scale firmware.

pub mod codec;

pub use codec::{
    decode_calibration, decode_device_name, decode_sample_rate, decode_weight,
    encode_calibration, encode_device_name, encode_sample_rate, encode_tare, encode_weight,
    TARE_COMMAND,
};
