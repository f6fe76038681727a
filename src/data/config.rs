//! Device-resident configuration and its limits.
//!
//! The scale owns the authoritative values; [`DeviceConfig`] is the local
//! mirror refreshed on explicit reads and after successful writes.

/// Lowest sample rate the scale accepts, in Hz.
pub const MIN_SAMPLE_RATE_HZ: u8 = 1;
/// Highest sample rate the scale accepts (HX711 high-speed mode), in Hz.
pub const MAX_SAMPLE_RATE_HZ: u8 = 80;
/// Sample rate the firmware boots with, in Hz.
pub const DEFAULT_SAMPLE_RATE_HZ: u8 = 10;
/// Maximum device name length in characters.
pub const MAX_DEVICE_NAME_LENGTH: usize = 20;
/// Calibration factor the firmware ships with.
pub const DEFAULT_CALIBRATION_FACTOR: f32 = 420.0;
/// Name the firmware advertises until the user renames it.
pub const DEFAULT_DEVICE_NAME: &str = "OpenScale";
/// Known calibration reference weight (10 lbs) in grams.
pub const CALIBRATION_REFERENCE_GRAMS: f32 = 4535.92;

/// Clamp a requested sample rate into the supported range.
///
/// # Example
///
/// ```
/// use openscale_ble::data::clamp_sample_rate;
///
/// assert_eq!(clamp_sample_rate(0), 1);
/// assert_eq!(clamp_sample_rate(25), 25);
/// assert_eq!(clamp_sample_rate(500), 80);
/// ```
pub fn clamp_sample_rate(rate: u32) -> u8 {
    rate.clamp(MIN_SAMPLE_RATE_HZ as u32, MAX_SAMPLE_RATE_HZ as u32) as u8
}

/// Truncate a device name to [`MAX_DEVICE_NAME_LENGTH`] characters.
///
/// Truncation counts characters, not bytes, so multi-byte names are never
/// split inside a code point.
pub fn truncate_device_name(name: &str) -> String {
    name.chars().take(MAX_DEVICE_NAME_LENGTH).collect()
}

/// Local mirror of the scale's configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceConfig {
    /// Samples per second, always within [1, 80].
    pub sample_rate_hz: u8,
    /// Raw-count divisor producing grams.
    pub calibration_factor: f32,
    /// User-assigned name, at most 20 characters.
    pub device_name: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            calibration_factor: DEFAULT_CALIBRATION_FACTOR,
            device_name: DEFAULT_DEVICE_NAME.to_string(),
        }
    }
}

impl DeviceConfig {
    /// Tick period for the configured sample rate.
    pub fn sample_period(&self) -> std::time::Duration {
        sample_period(self.sample_rate_hz)
    }
}

/// Period between samples at `rate_hz`, i.e. `1000 / rate_hz` milliseconds.
pub fn sample_period(rate_hz: u8) -> std::time::Duration {
    let rate = rate_hz.max(MIN_SAMPLE_RATE_HZ) as u64;
    std::time::Duration::from_nanos(1_000_000_000 / rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    #[test]
    fn test_default_config_matches_firmware() {
        let config = DeviceConfig::default();
        assert_eq!(config.sample_rate_hz, 10);
        assert_eq!(config.calibration_factor, 420.0);
        assert_eq!(config.device_name, "OpenScale");
    }

    #[test]
    fn test_sample_period() {
        assert_eq!(sample_period(10), Duration::from_millis(100));
        assert_eq!(sample_period(80), Duration::from_micros(12_500));
        assert_eq!(sample_period(1), Duration::from_secs(1));
        // A zero rate is treated as the minimum rather than dividing by zero.
        assert_eq!(sample_period(0), Duration::from_secs(1));
    }

    #[test]
    fn test_truncate_multibyte_name() {
        let name = "é".repeat(25);
        let truncated = truncate_device_name(&name);
        assert_eq!(truncated.chars().count(), 20);
        assert_eq!(truncated.len(), 40);
    }

    proptest! {
        #[test]
        fn clamp_matches_min_max(rate in any::<u32>()) {
            let applied = clamp_sample_rate(rate) as u32;
            prop_assert_eq!(applied, rate.min(80).max(1));
        }

        #[test]
        fn truncated_name_is_prefix(name in ".{0,40}") {
            let truncated = truncate_device_name(&name);
            prop_assert!(truncated.chars().count() <= MAX_DEVICE_NAME_LENGTH);
            let expected: String = name.chars().take(20).collect();
            prop_assert_eq!(truncated, expected);
        }
    }
}
