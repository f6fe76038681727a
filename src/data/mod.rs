//! Data structures for scale data.
//!
//! This module contains the weight sample type, the running weight tracker
//! and the device configuration mirror shared by the real link and the emulator.

pub mod config;
pub mod sample;
pub mod tracker;

pub use config::{
    clamp_sample_rate, sample_period, truncate_device_name, DeviceConfig,
    CALIBRATION_REFERENCE_GRAMS, DEFAULT_CALIBRATION_FACTOR, DEFAULT_DEVICE_NAME,
    DEFAULT_SAMPLE_RATE_HZ, MAX_DEVICE_NAME_LENGTH, MAX_SAMPLE_RATE_HZ, MIN_SAMPLE_RATE_HZ,
};
pub use sample::WeightSample;
pub use tracker::{WeightTracker, MAX_HISTORY_POINTS};
