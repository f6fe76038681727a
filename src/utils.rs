//! Utility functions for the openscale-ble crate.

/// Grams per kilogram.
const GRAMS_TO_KG: f32 = 0.001;
/// Pounds per gram, as used by the scale firmware.
const GRAMS_TO_LBS: f32 = 0.002_204_62;
/// Ounces per gram, as used by the scale firmware.
const GRAMS_TO_OZ: f32 = 0.035_274;

/// Convert grams to kilograms.
///
/// # Example
///
/// ```
/// use openscale_ble::grams_to_kilograms;
///
/// assert!((grams_to_kilograms(2500.0) - 2.5).abs() < 0.0001);
/// ```
#[inline]
pub fn grams_to_kilograms(grams: f32) -> f32 {
    grams * GRAMS_TO_KG
}

/// Convert grams to pounds.
///
/// # Example
///
/// ```
/// use openscale_ble::grams_to_pounds;
///
/// let pounds = grams_to_pounds(4535.92);
/// assert!((pounds - 10.0).abs() < 0.001);
/// ```
#[inline]
pub fn grams_to_pounds(grams: f32) -> f32 {
    grams * GRAMS_TO_LBS
}

/// Convert grams to ounces.
#[inline]
pub fn grams_to_ounces(grams: f32) -> f32 {
    grams * GRAMS_TO_OZ
}

/// Convert pounds to grams.
#[inline]
pub fn pounds_to_grams(pounds: f32) -> f32 {
    pounds / GRAMS_TO_LBS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grams_to_kilograms() {
        assert_eq!(grams_to_kilograms(0.0), 0.0);
        assert!((grams_to_kilograms(40000.0) - 40.0).abs() < 0.001);
    }

    #[test]
    fn test_grams_to_pounds() {
        assert!((grams_to_pounds(453.592) - 1.0).abs() < 0.001);
        assert!((grams_to_pounds(20000.0) - 44.0924).abs() < 0.01);
    }

    #[test]
    fn test_grams_to_ounces() {
        assert!((grams_to_ounces(28.3495) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_pound_roundtrip() {
        let original = 10.0;
        let converted = grams_to_pounds(pounds_to_grams(original));
        assert!((converted - original).abs() < 0.0001);
    }
}
