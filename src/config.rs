//! Configuration for the device link and the emulator.

use std::time::Duration;

use crate::data::{
    clamp_sample_rate, truncate_device_name, DEFAULT_CALIBRATION_FACTOR, DEFAULT_SAMPLE_RATE_HZ,
};
use crate::emulator::SimulationMode;
use crate::events::DEFAULT_EVENT_CAPACITY;

/// Settings for a [`DeviceLink`](crate::DeviceLink).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkConfig {
    /// How long to scan for a scale before giving up.
    pub scan_timeout: Duration,
    /// Only connect to scales whose advertised name contains this string.
    pub name_filter: Option<String>,
    /// Capacity of the event channels.
    pub event_capacity: usize,
}

impl LinkConfig {
    /// Default scan timeout (10 seconds).
    pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scan timeout.
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Restrict discovery to scales whose name contains `filter`.
    pub fn with_name_filter(mut self, filter: impl Into<String>) -> Self {
        self.name_filter = Some(filter.into());
        self
    }

    /// Set the event channel capacity.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            scan_timeout: Self::DEFAULT_SCAN_TIMEOUT,
            name_filter: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Settings for a [`DeviceEmulator`](crate::DeviceEmulator).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EmulatorConfig {
    /// Name reported by the emulated scale.
    pub device_name: String,
    /// Initial sample rate in Hz.
    pub sample_rate_hz: u8,
    /// Initial calibration factor.
    pub calibration_factor: f32,
    /// Noise amplitude in grams.
    pub noise_level: f64,
    /// Initial simulation mode.
    pub mode: SimulationMode,
    /// Simulated connection latency.
    pub connect_delay: Duration,
    /// Seed for the random source; `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Capacity of the event channel.
    pub event_capacity: usize,
}

impl EmulatorConfig {
    /// Default emulated device name.
    pub const DEFAULT_DEVICE_NAME: &'static str = "OpenScale-EMU";
    /// Default noise amplitude in grams.
    pub const DEFAULT_NOISE_LEVEL: f64 = 50.0;
    /// Default simulated connection latency (500 ms).
    pub const DEFAULT_CONNECT_DELAY: Duration = Duration::from_millis(500);

    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the device name (truncated to 20 characters).
    pub fn with_device_name(mut self, name: &str) -> Self {
        self.device_name = truncate_device_name(name);
        self
    }

    /// Set the initial sample rate (clamped to [1, 80]).
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate_hz = clamp_sample_rate(rate);
        self
    }

    /// Set the initial calibration factor.
    pub fn with_calibration_factor(mut self, factor: f32) -> Self {
        self.calibration_factor = factor;
        self
    }

    /// Set the noise amplitude in grams.
    pub fn with_noise_level(mut self, level: f64) -> Self {
        self.noise_level = level;
        self
    }

    /// Set the initial simulation mode.
    pub fn with_mode(mut self, mode: SimulationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the simulated connection latency.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    /// Seed the random source for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            device_name: Self::DEFAULT_DEVICE_NAME.to_string(),
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            calibration_factor: DEFAULT_CALIBRATION_FACTOR,
            noise_level: Self::DEFAULT_NOISE_LEVEL,
            mode: SimulationMode::Pulls,
            connect_delay: Self::DEFAULT_CONNECT_DELAY,
            seed: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}
