//! Running weight statistics kept alongside a scale connection.

use std::collections::VecDeque;

use super::sample::WeightSample;

/// Most samples kept while recording. Ten minutes at 10 Hz.
pub const MAX_HISTORY_POINTS: usize = 6000;

/// Latest weight, peak weight and an optional recording buffer.
///
/// The peak only grows until [`reset_peak`](Self::reset_peak) is called,
/// which tare does. Samples are kept only between
/// [`start_recording`](Self::start_recording) and
/// [`stop_recording`](Self::stop_recording), oldest dropped first once
/// [`MAX_HISTORY_POINTS`] is reached.
#[derive(Debug, Clone, Default)]
pub struct WeightTracker {
    last: Option<f32>,
    peak: f32,
    recording: bool,
    history: VecDeque<WeightSample>,
}

impl WeightTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for a new sample.
    pub fn record(&mut self, sample: WeightSample) {
        self.last = Some(sample.weight_grams);
        if sample.weight_grams > self.peak {
            self.peak = sample.weight_grams;
        }

        if self.recording {
            if self.history.len() == MAX_HISTORY_POINTS {
                self.history.pop_front();
            }
            self.history.push_back(sample);
        }
    }

    /// Most recent weight in grams.
    pub fn last_weight(&self) -> Option<f32> {
        self.last
    }

    /// Forget the most recent weight so the next sample is the first one
    /// seen.
    pub fn discard_last_weight(&mut self) {
        self.last = None;
    }

    /// Highest weight since the last reset, in grams.
    pub fn peak_weight(&self) -> f32 {
        self.peak
    }

    pub fn reset_peak(&mut self) {
        self.peak = 0.0;
    }

    /// Clear the buffer and start keeping samples.
    pub fn start_recording(&mut self) {
        self.history.clear();
        self.recording = true;
    }

    /// Stop keeping samples. Returns how many were kept.
    pub fn stop_recording(&mut self) -> usize {
        self.recording = false;
        self.history.len()
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Recorded samples, oldest first.
    pub fn history(&self) -> Vec<WeightSample> {
        self.history.iter().copied().collect()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}
