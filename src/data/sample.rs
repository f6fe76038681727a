//! Weight sample data structures.

use chrono::Utc;

/// A single weight reading.
///
/// Produced once per sample tick (emulator) or weight notification (scale).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeightSample {
    /// Wall-clock time at receipt, in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// Weight in grams.
    pub weight_grams: f32,
}

impl WeightSample {
    /// Create a sample with an explicit timestamp.
    pub fn new(timestamp_ms: i64, weight_grams: f32) -> Self {
        Self {
            timestamp_ms,
            weight_grams,
        }
    }

    /// Create a sample stamped with the current wall-clock time.
    pub fn now(weight_grams: f32) -> Self {
        Self::new(Utc::now().timestamp_millis(), weight_grams)
    }

    /// Weight in kilograms.
    pub fn weight_kilograms(&self) -> f32 {
        crate::utils::grams_to_kilograms(self.weight_grams)
    }

    /// Weight in pounds.
    pub fn weight_pounds(&self) -> f32 {
        crate::utils::grams_to_pounds(self.weight_grams)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_now_is_stamped() {
        let before = Utc::now().timestamp_millis();
        let sample = WeightSample::now(1500.0);
        let after = Utc::now().timestamp_millis();

        assert!(sample.timestamp_ms >= before && sample.timestamp_ms <= after);
        assert_eq!(sample.weight_grams, 1500.0);
    }

    #[test]
    fn test_sample_units() {
        let sample = WeightSample::new(0, 4535.92);
        assert!((sample.weight_kilograms() - 4.53592).abs() < 0.0001);
        assert!((sample.weight_pounds() - 10.0).abs() < 0.001);
    }
}
