//! Signal shaping primitives for the emulator.

use rand::{Rng, RngCore};
use std::f64::consts::PI;

/// Peak of the ramp waveform in grams.
pub const RAMP_PEAK_GRAMS: f64 = 30_000.0;
/// Length of one ramp leg (up or down) in seconds.
pub const RAMP_LEG_SECS: u64 = 10;

/// Gaussian noise from the Box–Muller transform, scaled by `amplitude * 0.5`.
///
/// A zero amplitude yields exactly zero without drawing from `rng`.
pub fn gaussian_noise(rng: &mut dyn RngCore, amplitude: f64) -> f64 {
    if amplitude == 0.0 {
        return 0.0;
    }
    // In (0, 1] so the logarithm stays finite.
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    let gaussian = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    gaussian * amplitude * 0.5
}

/// `value` plus [`gaussian_noise`] of the given amplitude.
pub fn add_noise(rng: &mut dyn RngCore, value: f64, amplitude: f64) -> f64 {
    value + gaussian_noise(rng, amplitude)
}

/// Uniform draw from `[low, high)`.
pub fn uniform(rng: &mut dyn RngCore, low: f64, high: f64) -> f64 {
    low + rng.gen::<f64>() * (high - low)
}

/// Quadratic ease-out: fast start, slow finish.
#[inline]
pub fn ease_out_quad(t: f64) -> f64 {
    1.0 - (1.0 - t) * (1.0 - t)
}

/// Quadratic ease-in: slow start, fast finish.
#[inline]
pub fn ease_in_quad(t: f64) -> f64 {
    t * t
}

/// Triangular ramp weight at `tick` for the given sample rate.
///
/// Rises linearly to [`RAMP_PEAK_GRAMS`] over ten seconds of ticks, then falls
/// back to zero over the next ten. The result depends only on
/// `tick % (20 * sample_rate_hz)`.
pub fn ramp_weight(tick: u64, sample_rate_hz: u8) -> f64 {
    let leg = (sample_rate_hz.max(1) as u64) * RAMP_LEG_SECS;
    let position = (tick % (leg * 2)) as f64 / leg as f64;

    if position < 1.0 {
        RAMP_PEAK_GRAMS * position
    } else {
        RAMP_PEAK_GRAMS * (2.0 - position)
    }
}
