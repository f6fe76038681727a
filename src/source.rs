//! The contract shared by the BLE device link and the emulator.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;

use crate::ble::connection::ConnectionState;
use crate::data::{DeviceConfig, WeightSample, WeightTracker};
use crate::error::{Error, Result};
use crate::events::{EventHub, ScaleEvent};

/// Calibration factor that makes the scale report raw load-cell counts.
pub const RAW_CALIBRATION_FACTOR: f32 = 1.0;

/// A connected (or connectable) weight scale.
///
/// Commands that change device state require [`ConnectionState::Connected`]
/// and fail with [`Error::NotConnected`] otherwise. Reads never fail: they
/// resolve to `None` when the value cannot be obtained.
#[async_trait]
pub trait ScaleSource: Send + Sync {
    /// Event hub of this scale.
    fn events(&self) -> &EventHub;

    /// Current connection state.
    fn connection_state(&self) -> ConnectionState;

    /// Locally cached device configuration.
    fn device_config(&self) -> DeviceConfig;

    /// Latest, peak and recorded weights of this scale.
    fn weight_tracker(&self) -> &Mutex<WeightTracker>;

    /// Connect and return the device name.
    async fn connect(&self) -> Result<String>;

    /// Disconnect. Calling this while disconnected is a no-op.
    async fn disconnect(&self) -> Result<()>;

    /// Zero the scale at the current load.
    async fn tare(&self) -> Result<()>;

    /// Read the sample rate from the device.
    async fn read_sample_rate(&self) -> Option<u8>;

    /// Set the sample rate, clamped to [1, 80] Hz. Returns the applied rate.
    async fn set_sample_rate(&self, rate_hz: u32) -> Result<u8>;

    /// Read the calibration factor from the device.
    async fn read_calibration(&self) -> Option<f32>;

    /// Set the calibration factor. Returns the applied factor.
    async fn set_calibration(&self, factor: f32) -> Result<f32>;

    /// Read the device name.
    async fn read_device_name(&self) -> Option<String>;

    /// Set the device name, truncated to 20 characters. Returns the applied
    /// name.
    async fn set_device_name(&self, name: &str) -> Result<String>;

    /// Switch the scale to raw readings so a reference weight can be
    /// measured.
    async fn start_calibration(&self) -> Result<()> {
        info!("Starting calibration");
        self.set_calibration(RAW_CALIBRATION_FACTOR).await?;
        // Readings cached before the switch are not raw counts.
        self.weight_tracker().lock().discard_last_weight();
        Ok(())
    }

    /// Finish calibration against a reference weight and apply the new
    /// factor.
    ///
    /// The factor is the latest raw reading divided by `reference_grams`. It
    /// must come out positive and finite, otherwise nothing is written and
    /// [`Error::InvalidParameter`] is returned. Until a reading arrives after
    /// [`start_calibration`](Self::start_calibration) this fails with
    /// [`Error::InvalidData`].
    async fn complete_calibration(&self, reference_grams: f32) -> Result<f32> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        let raw = self.last_weight().ok_or_else(|| Error::InvalidData {
            context: "no weight reading to calibrate against".to_string(),
        })?;

        let factor = raw / reference_grams;
        if !(factor.is_finite() && factor > 0.0) {
            return Err(Error::InvalidParameter {
                name: "calibration_factor".to_string(),
                value: factor.to_string(),
            });
        }

        info!(
            "Calibration complete: raw {} / reference {} g = {}",
            raw, reference_grams, factor
        );
        self.set_calibration(factor).await
    }

    /// Most recent weight reading in grams.
    fn last_weight(&self) -> Option<f32> {
        self.weight_tracker().lock().last_weight()
    }

    /// Highest reading since the last tare or peak reset, in grams.
    fn peak_weight(&self) -> f32 {
        self.weight_tracker().lock().peak_weight()
    }

    /// Zero the peak without taring.
    fn reset_peak(&self) {
        self.weight_tracker().lock().reset_peak();
    }

    /// Start keeping incoming samples, discarding any earlier recording.
    fn start_recording(&self) {
        self.weight_tracker().lock().start_recording();
    }

    /// Stop keeping samples. Returns the number recorded.
    fn stop_recording(&self) -> usize {
        self.weight_tracker().lock().stop_recording()
    }

    /// Samples kept by the current or last recording, oldest first.
    fn weight_history(&self) -> Vec<WeightSample> {
        self.weight_tracker().lock().history()
    }

    /// Whether the scale is connected.
    fn is_connected(&self) -> bool {
        self.connection_state().is_connected()
    }

    /// Subscribe to all events.
    fn subscribe(&self) -> broadcast::Receiver<ScaleEvent> {
        self.events().subscribe()
    }
}
