//! Simulation state machine for the emulator.
//!
//! Every mode is advanced once per sample tick by [`SimulationState::step`],
//! which returns the simulated weight in grams before any tare offset. Phase
//! lengths are kept in seconds and compared against
//! `phase_tick_count / sample_rate_hz`, so the wall-clock shape of a pull
//! does not depend on the sample rate.

use rand::RngCore;
use std::str::FromStr;

use super::signal::{add_noise, ease_in_quad, ease_out_quad, ramp_weight, uniform};
use crate::error::Error;

/// Pull targets are drawn from `[PULL_TARGET_MIN, PULL_TARGET_MAX)` grams.
pub const PULL_TARGET_MIN: f64 = 15_000.0;
/// Upper (exclusive) bound of pull targets in grams.
pub const PULL_TARGET_MAX: f64 = 40_000.0;
/// Target of the sustained hold in grams.
pub const HOLD_TARGET: f64 = 20_000.0;

const PULL_REST_SECS: (f64, f64) = (2.0, 5.0);
const PULL_LOAD_SECS: (f64, f64) = (0.3, 0.5);
const PULL_HOLD_SECS: (f64, f64) = (3.0, 10.0);
const PULL_RELEASE_SECS: (f64, f64) = (0.2, 0.4);
/// Pull fatigue: 10 % loss per 15 s of holding, never more than 10 %.
const PULL_FATIGUE_SECS: f64 = 15.0;
const PULL_FATIGUE_LOSS: f64 = 0.1;

const HOLD_REST_SECS: f64 = 2.0;
const HOLD_LOAD_SECS: f64 = 0.5;
/// Hold fatigue: 15 % loss per 60 s, floored at 70 % of target.
const HOLD_FATIGUE_SECS: f64 = 60.0;
const HOLD_FATIGUE_LOSS: f64 = 0.15;
const HOLD_FATIGUE_FLOOR: f64 = 0.7;

/// Manual mode applies this fraction of the configured noise level.
const MANUAL_NOISE_FRACTION: f64 = 0.1;

/// Signal generator selected on the emulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SimulationMode {
    /// Baseline noise around zero.
    Noise,
    /// Repeated pulls with random rest, load, hold and release phases.
    #[default]
    Pulls,
    /// One sustained hold with slow fatigue.
    Hold,
    /// Deterministic triangular ramp.
    Ramp,
    /// Externally set weight plus a little noise.
    Manual,
}

impl SimulationMode {
    /// All modes.
    pub const ALL: [SimulationMode; 5] = [
        Self::Noise,
        Self::Pulls,
        Self::Hold,
        Self::Ramp,
        Self::Manual,
    ];

    /// Lower-case name of this mode.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Noise => "noise",
            Self::Pulls => "pulls",
            Self::Hold => "hold",
            Self::Ramp => "ramp",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for SimulationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SimulationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidParameter {
                name: "mode".to_string(),
                value: s.to_string(),
            })
    }
}

/// Phase of a pull or hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SimulationPhase {
    /// Nothing on the scale.
    #[default]
    Rest,
    /// Weight rising towards the target.
    Loading,
    /// Weight held near the target.
    Holding,
    /// Weight falling back to zero.
    Releasing,
}

/// Per-tick inputs owned by the emulator rather than the state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationInput {
    /// Ticks per second.
    pub sample_rate_hz: u8,
    /// Noise amplitude in grams.
    pub noise_level: f64,
    /// Weight emitted in manual mode.
    pub manual_weight: f64,
}

/// Simulation state, reset whenever the mode changes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationState {
    /// Active mode.
    pub mode: SimulationMode,
    /// Current phase (Pulls and Hold).
    pub phase: SimulationPhase,
    /// Ticks spent in the current phase (tick count in Ramp).
    pub phase_tick_count: u64,
    /// Weight the current pull or hold aims for.
    pub target_weight_grams: f64,
    /// Completed pulls.
    pub pull_count: u64,
    /// Length of the current phase, drawn on entry.
    phase_duration_secs: Option<f64>,
}

impl SimulationState {
    /// Fresh state for `mode`.
    pub fn new(mode: SimulationMode) -> Self {
        Self {
            mode,
            phase: SimulationPhase::Rest,
            phase_tick_count: 0,
            target_weight_grams: 0.0,
            pull_count: 0,
            phase_duration_secs: None,
        }
    }

    /// Switch to `mode`, discarding all progress.
    pub fn reset(&mut self, mode: SimulationMode) {
        *self = Self::new(mode);
    }

    /// Length of the current phase in seconds, once drawn.
    pub fn phase_duration_secs(&self) -> Option<f64> {
        self.phase_duration_secs
    }

    /// Advance one tick and return the simulated weight in grams.
    pub fn step(&mut self, input: &SimulationInput, rng: &mut dyn RngCore) -> f64 {
        let noise = input.noise_level;

        match self.mode {
            SimulationMode::Noise => add_noise(rng, 0.0, noise),
            SimulationMode::Pulls => self.step_pulls(input, rng),
            SimulationMode::Hold => self.step_hold(input, rng),
            SimulationMode::Ramp => {
                self.phase_tick_count += 1;
                let weight = ramp_weight(self.phase_tick_count, input.sample_rate_hz);
                add_noise(rng, weight, noise)
            }
            SimulationMode::Manual => {
                add_noise(rng, input.manual_weight, noise * MANUAL_NOISE_FRACTION)
            }
        }
    }

    fn enter(&mut self, phase: SimulationPhase, duration_secs: Option<f64>) {
        self.phase = phase;
        self.phase_tick_count = 0;
        self.phase_duration_secs = duration_secs;
    }

    fn step_pulls(&mut self, input: &SimulationInput, rng: &mut dyn RngCore) -> f64 {
        let rate = input.sample_rate_hz.max(1) as f64;
        let noise = input.noise_level;

        self.phase_tick_count += 1;
        let ticks = self.phase_tick_count as f64;

        match self.phase {
            SimulationPhase::Rest => {
                let rest = *self
                    .phase_duration_secs
                    .get_or_insert_with(|| uniform(rng, PULL_REST_SECS.0, PULL_REST_SECS.1));

                if ticks > rate * rest {
                    let load = uniform(rng, PULL_LOAD_SECS.0, PULL_LOAD_SECS.1);
                    self.enter(SimulationPhase::Loading, Some(load));
                    self.target_weight_grams = uniform(rng, PULL_TARGET_MIN, PULL_TARGET_MAX);
                }
                add_noise(rng, 0.0, noise)
            }
            SimulationPhase::Loading => {
                let load = self.current_duration(rng, PULL_LOAD_SECS);
                let progress = (ticks / (rate * load)).min(1.0);
                let weight = self.target_weight_grams * ease_out_quad(progress);

                if progress >= 1.0 {
                    let hold = uniform(rng, PULL_HOLD_SECS.0, PULL_HOLD_SECS.1);
                    self.enter(SimulationPhase::Holding, Some(hold));
                }
                add_noise(rng, weight, noise)
            }
            SimulationPhase::Holding => {
                let hold = self.current_duration(rng, PULL_HOLD_SECS);
                let fatigue = (1.0 - ticks / (rate * PULL_FATIGUE_SECS) * PULL_FATIGUE_LOSS)
                    .max(1.0 - PULL_FATIGUE_LOSS);
                let weight = self.target_weight_grams * fatigue;

                if ticks > rate * hold {
                    let release = uniform(rng, PULL_RELEASE_SECS.0, PULL_RELEASE_SECS.1);
                    self.enter(SimulationPhase::Releasing, Some(release));
                }
                add_noise(rng, weight, noise)
            }
            SimulationPhase::Releasing => {
                let release = self.current_duration(rng, PULL_RELEASE_SECS);
                let progress = (ticks / (rate * release)).min(1.0);
                let weight = self.target_weight_grams * (1.0 - ease_in_quad(progress));

                if progress >= 1.0 {
                    self.enter(SimulationPhase::Rest, None);
                    self.pull_count += 1;
                }
                add_noise(rng, weight, noise)
            }
        }
    }

    fn step_hold(&mut self, input: &SimulationInput, rng: &mut dyn RngCore) -> f64 {
        let rate = input.sample_rate_hz.max(1) as f64;
        let noise = input.noise_level;

        self.phase_tick_count += 1;
        let ticks = self.phase_tick_count as f64;

        match self.phase {
            SimulationPhase::Rest => {
                if ticks > rate * HOLD_REST_SECS {
                    self.enter(SimulationPhase::Loading, Some(HOLD_LOAD_SECS));
                    self.target_weight_grams = HOLD_TARGET;
                }
                add_noise(rng, 0.0, noise)
            }
            SimulationPhase::Loading => {
                let progress = (ticks / (rate * HOLD_LOAD_SECS)).min(1.0);
                if progress >= 1.0 {
                    // Fatigue is timed from full load, not from the start of loading.
                    self.enter(SimulationPhase::Holding, None);
                }
                add_noise(rng, self.target_weight_grams * ease_out_quad(progress), noise)
            }
            // A hold never releases on its own.
            SimulationPhase::Holding | SimulationPhase::Releasing => {
                let fatigue = 1.0 - ticks / (rate * HOLD_FATIGUE_SECS) * HOLD_FATIGUE_LOSS;
                let weight = self.target_weight_grams * fatigue.max(HOLD_FATIGUE_FLOOR);
                add_noise(rng, weight, noise)
            }
        }
    }

    /// Duration of the current phase, drawing one if the phase was entered
    /// without it.
    fn current_duration(&mut self, rng: &mut dyn RngCore, range: (f64, f64)) -> f64 {
        *self
            .phase_duration_secs
            .get_or_insert_with(|| uniform(rng, range.0, range.1))
    }
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::new(SimulationMode::default())
    }
}
