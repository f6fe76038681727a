//! Software emulation of an OpenScale device.
//!
//! [`DeviceEmulator`] implements the same [`ScaleSource`] contract as the BLE
//! link, generating weight samples on a tokio timer instead of receiving
//! notifications. It needs no Bluetooth hardware and is deterministic when
//! seeded.

pub mod signal;
pub mod simulation;

pub use simulation::{SimulationInput, SimulationMode, SimulationPhase, SimulationState};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::ble::connection::ConnectionState;
use crate::config::EmulatorConfig;
use crate::data::{
    clamp_sample_rate, sample_period, truncate_device_name, DeviceConfig, WeightSample,
    WeightTracker, DEFAULT_CALIBRATION_FACTOR,
};
use crate::error::{Error, Result};
use crate::events::{EventHub, ScaleEvent};
use crate::source::ScaleSource;

/// Mutable emulator state.
struct EmulatorState {
    connection: ConnectionState,
    config: DeviceConfig,
    /// Last emitted weight, tare already applied.
    current_weight: f32,
    tare_offset: f32,
    manual_weight: f64,
    noise_level: f64,
    simulation: SimulationState,
    rng: Box<dyn RngCore + Send>,
    /// Bumped on every connect, disconnect and timer restart. A tick task or
    /// pending connect whose epoch no longer matches is stale.
    epoch: u64,
}

impl EmulatorState {
    fn require_connected(&self) -> Result<()> {
        if self.connection.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    /// Advance the simulation one tick and return the sample to emit.
    fn tick(&mut self) -> WeightSample {
        let input = SimulationInput {
            sample_rate_hz: self.config.sample_rate_hz,
            noise_level: self.noise_level,
            manual_weight: self.manual_weight,
        };
        let raw = self.simulation.step(&input, self.rng.as_mut());
        let weight = raw as f32 - self.tare_offset;

        self.current_weight = weight;
        WeightSample::now(weight)
    }
}

struct EmulatorShared {
    state: Mutex<EmulatorState>,
    events: EventHub,
    tracker: Mutex<WeightTracker>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    connect_delay: Duration,
}

impl EmulatorShared {
    fn stop_ticker(&self) {
        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }
    }
}

/// An emulated scale.
pub struct DeviceEmulator {
    shared: Arc<EmulatorShared>,
}

impl DeviceEmulator {
    /// Create an emulator. The random source is seeded from
    /// [`EmulatorConfig::seed`], or from the OS when no seed is set.
    pub fn new(config: EmulatorConfig) -> Self {
        let rng: Box<dyn RngCore + Send> = match config.seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(StdRng::from_entropy()),
        };
        Self::with_rng(config, rng)
    }

    /// Create an emulator drawing noise and phase durations from `rng`.
    ///
    /// The configured rate and name are held to the firmware limits even when
    /// `config` was built without its `with_*` setters.
    pub fn with_rng(config: EmulatorConfig, rng: Box<dyn RngCore + Send>) -> Self {
        let state = EmulatorState {
            connection: ConnectionState::Disconnected,
            config: DeviceConfig {
                sample_rate_hz: clamp_sample_rate(config.sample_rate_hz as u32),
                calibration_factor: config.calibration_factor,
                device_name: truncate_device_name(&config.device_name),
            },
            current_weight: 0.0,
            tare_offset: 0.0,
            manual_weight: 0.0,
            noise_level: config.noise_level.max(0.0),
            simulation: SimulationState::new(config.mode),
            rng,
            epoch: 0,
        };

        Self {
            shared: Arc::new(EmulatorShared {
                state: Mutex::new(state),
                events: EventHub::new(config.event_capacity),
                tracker: Mutex::new(WeightTracker::new()),
                ticker: Mutex::new(None),
                connect_delay: config.connect_delay,
            }),
        }
    }

    /// Switch the signal generator. Resets the simulation state.
    pub fn set_simulation_mode(&self, mode: SimulationMode) {
        info!("Simulation mode set to {}", mode);
        self.shared.state.lock().simulation.reset(mode);
    }

    /// Set the weight produced in [`SimulationMode::Manual`].
    pub fn set_manual_weight(&self, grams: f64) {
        debug!("Manual weight set to {} g", grams);
        self.shared.state.lock().manual_weight = grams;
    }

    /// Set the noise amplitude in grams. Negative values count as zero.
    pub fn set_noise_level(&self, grams: f64) {
        debug!("Noise level set to {} g", grams);
        self.shared.state.lock().noise_level = grams.max(0.0);
    }

    /// Snapshot of the simulation state.
    pub fn simulation_state(&self) -> SimulationState {
        self.shared.state.lock().simulation.clone()
    }

    /// Current tare offset in grams.
    pub fn tare_offset(&self) -> f32 {
        self.shared.state.lock().tare_offset
    }

    /// Stop any running timer and start a new one at the current rate.
    fn restart_ticker(&self) {
        let (epoch, period) = {
            let mut state = self.shared.state.lock();
            state.epoch += 1;
            (state.epoch, sample_period(state.config.sample_rate_hz))
        };

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);

            loop {
                interval.tick().await;

                let sample = {
                    let mut state = shared.state.lock();
                    if state.epoch != epoch || !state.connection.is_connected() {
                        break;
                    }
                    state.tick()
                };

                shared.tracker.lock().record(sample);
                trace!("Emulated weight: {:.1} g", sample.weight_grams);
                shared.events.emit(ScaleEvent::WeightUpdated(sample));
            }
            debug!("Emulator timer {} stopped", epoch);
        });

        if let Some(previous) = self.shared.ticker.lock().replace(handle) {
            previous.abort();
        }
        debug!("Emulator timer {} started every {:?}", epoch, period);
    }
}

impl Default for DeviceEmulator {
    fn default() -> Self {
        Self::new(EmulatorConfig::default())
    }
}

impl Drop for DeviceEmulator {
    fn drop(&mut self) {
        self.shared.stop_ticker();
    }
}

impl std::fmt::Debug for DeviceEmulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("DeviceEmulator")
            .field("connection", &state.connection)
            .field("config", &state.config)
            .field("mode", &state.simulation.mode)
            .field("tare_offset", &state.tare_offset)
            .finish()
    }
}

#[async_trait]
impl ScaleSource for DeviceEmulator {
    fn events(&self) -> &EventHub {
        &self.shared.events
    }

    fn connection_state(&self) -> ConnectionState {
        self.shared.state.lock().connection
    }

    fn device_config(&self) -> DeviceConfig {
        self.shared.state.lock().config.clone()
    }

    fn weight_tracker(&self) -> &Mutex<WeightTracker> {
        &self.shared.tracker
    }

    async fn connect(&self) -> Result<String> {
        let epoch = {
            let mut state = self.shared.state.lock();
            match state.connection {
                ConnectionState::Connected => return Ok(state.config.device_name.clone()),
                ConnectionState::Scanning | ConnectionState::Connecting => {
                    return Err(Error::ConnectionFailed {
                        reason: "connection already in progress".to_string(),
                        source: None,
                    });
                }
                ConnectionState::Disconnected => {}
            }
            state.connection = ConnectionState::Connecting;
            state.epoch += 1;
            state.epoch
        };

        info!("Connecting to emulated scale");
        self.shared.events.emit(ScaleEvent::ConnectionChanged {
            state: ConnectionState::Connecting,
            device_name: None,
        });

        tokio::time::sleep(self.shared.connect_delay).await;

        let config = {
            let mut state = self.shared.state.lock();
            if state.epoch != epoch || state.connection != ConnectionState::Connecting {
                debug!("Emulated connect cancelled");
                return Err(Error::ConnectionFailed {
                    reason: "cancelled".to_string(),
                    source: None,
                });
            }
            state.connection = ConnectionState::Connected;
            state.config.clone()
        };

        self.restart_ticker();

        info!("Connected to emulated scale {}", config.device_name);
        let events = &self.shared.events;
        events.emit(ScaleEvent::ConnectionChanged {
            state: ConnectionState::Connected,
            device_name: Some(config.device_name.clone()),
        });
        events.emit(ScaleEvent::SampleRateUpdated(config.sample_rate_hz));
        events.emit(ScaleEvent::CalibrationUpdated(config.calibration_factor));
        events.emit(ScaleEvent::DeviceNameUpdated(config.device_name.clone()));

        Ok(config.device_name)
    }

    async fn disconnect(&self) -> Result<()> {
        let previous = {
            let mut state = self.shared.state.lock();
            let previous = state.connection;
            state.connection = ConnectionState::Disconnected;
            state.epoch += 1;
            previous
        };

        self.shared.stop_ticker();

        if previous != ConnectionState::Disconnected {
            info!("Disconnected from emulated scale");
            self.shared.events.emit(ScaleEvent::ConnectionChanged {
                state: ConnectionState::Disconnected,
                device_name: None,
            });
        }

        Ok(())
    }

    async fn tare(&self) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            state.require_connected()?;

            let current = state.current_weight;
            state.tare_offset += current;
            info!("Tared at offset {:.1} g", state.tare_offset);
        }
        self.shared.tracker.lock().reset_peak();
        Ok(())
    }

    async fn read_sample_rate(&self) -> Option<u8> {
        let rate = {
            let state = self.shared.state.lock();
            state.require_connected().ok()?;
            state.config.sample_rate_hz
        };
        self.shared.events.emit(ScaleEvent::SampleRateUpdated(rate));
        Some(rate)
    }

    async fn set_sample_rate(&self, rate_hz: u32) -> Result<u8> {
        let rate = clamp_sample_rate(rate_hz);
        {
            let mut state = self.shared.state.lock();
            state.require_connected()?;
            state.config.sample_rate_hz = rate;
        }

        self.restart_ticker();

        info!("Sample rate set to {} Hz", rate);
        self.shared.events.emit(ScaleEvent::SampleRateUpdated(rate));
        Ok(rate)
    }

    async fn read_calibration(&self) -> Option<f32> {
        let factor = {
            let state = self.shared.state.lock();
            state.require_connected().ok()?;
            state.config.calibration_factor
        };
        self.shared.events.emit(ScaleEvent::CalibrationUpdated(factor));
        Some(factor)
    }

    async fn set_calibration(&self, factor: f32) -> Result<f32> {
        {
            let mut state = self.shared.state.lock();
            state.require_connected()?;
            state.config.calibration_factor = factor;
        }

        info!("Calibration factor set to {}", factor);
        self.shared.events.emit(ScaleEvent::CalibrationUpdated(factor));
        Ok(factor)
    }

    async fn read_device_name(&self) -> Option<String> {
        let name = {
            let state = self.shared.state.lock();
            state.require_connected().ok()?;
            state.config.device_name.clone()
        };
        self.shared
            .events
            .emit(ScaleEvent::DeviceNameUpdated(name.clone()));
        Some(name)
    }

    async fn set_device_name(&self, name: &str) -> Result<String> {
        let name = truncate_device_name(name);
        {
            let mut state = self.shared.state.lock();
            state.require_connected()?;
            state.config.device_name = name.clone();
        }

        info!("Device name set to {}", name);
        self.shared
            .events
            .emit(ScaleEvent::DeviceNameUpdated(name.clone()));
        Ok(name)
    }

    /// Emulated scales have no raw counts to calibrate against, so completing
    /// calibration restores the default factor.
    async fn complete_calibration(&self, reference_grams: f32) -> Result<f32> {
        if !(reference_grams.is_finite() && reference_grams > 0.0) {
            return Err(Error::InvalidParameter {
                name: "reference_grams".to_string(),
                value: reference_grams.to_string(),
            });
        }
        self.set_calibration(DEFAULT_CALIBRATION_FACTOR).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::sync::broadcast;

    fn quiet_config() -> EmulatorConfig {
        EmulatorConfig::new()
            .with_mode(SimulationMode::Manual)
            .with_noise_level(0.0)
            .with_seed(7)
    }

    async fn next_weight(rx: &mut broadcast::Receiver<ScaleEvent>) -> f32 {
        loop {
            if let ScaleEvent::WeightUpdated(sample) = rx.recv().await.unwrap() {
                return sample.weight_grams;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_event_order() {
        let emulator = DeviceEmulator::new(quiet_config());
        let mut rx = emulator.subscribe();

        let name = emulator.connect().await.unwrap();
        assert_eq!(name, "OpenScale-EMU");
        assert_eq!(emulator.connection_state(), ConnectionState::Connected);

        let expected = vec![
            ScaleEvent::ConnectionChanged {
                state: ConnectionState::Connecting,
                device_name: None,
            },
            ScaleEvent::ConnectionChanged {
                state: ConnectionState::Connected,
                device_name: Some("OpenScale-EMU".to_string()),
            },
            ScaleEvent::SampleRateUpdated(10),
            ScaleEvent::CalibrationUpdated(420.0),
            ScaleEvent::DeviceNameUpdated("OpenScale-EMU".to_string()),
        ];
        for event in expected {
            assert_eq!(rx.recv().await.unwrap(), event);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_literal_is_held_to_limits() {
        let config = EmulatorConfig {
            sample_rate_hz: 0,
            device_name: "x".repeat(30),
            ..quiet_config()
        };
        let emulator = DeviceEmulator::new(config);
        assert_eq!(emulator.device_config().sample_rate_hz, 1);

        let mut rx = emulator.subscribe();
        assert_eq!(emulator.connect().await.unwrap(), "x".repeat(20));

        let mut reported = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                ScaleEvent::SampleRateUpdated(rate) => reported.push(rate.to_string()),
                ScaleEvent::DeviceNameUpdated(name) => reported.push(name),
                _ => {}
            }
        }
        assert_eq!(reported, vec!["1".to_string(), "x".repeat(20)]);

        // One sample per second at the floor rate.
        let started = tokio::time::Instant::now();
        next_weight(&mut rx).await;
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_takes_configured_delay() {
        let emulator = DeviceEmulator::new(
            quiet_config().with_connect_delay(Duration::from_millis(1200)),
        );
        let started = tokio::time::Instant::now();
        emulator.connect().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1200));

        // Connecting again is immediate and returns the same name.
        let again = tokio::time::Instant::now();
        assert_eq!(emulator.connect().await.unwrap(), "OpenScale-EMU");
        assert_eq!(again.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_during_connect_cancels() {
        let emulator = Arc::new(DeviceEmulator::new(quiet_config()));

        let connecting = {
            let emulator = Arc::clone(&emulator);
            tokio::spawn(async move { emulator.connect().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(emulator.connection_state(), ConnectionState::Connecting);

        // A second connect while the first is pending fails.
        assert!(matches!(
            emulator.connect().await,
            Err(Error::ConnectionFailed { .. })
        ));

        emulator.disconnect().await.unwrap();
        let result = connecting.await.unwrap();
        match result {
            Err(Error::ConnectionFailed { reason, .. }) => assert_eq!(reason, "cancelled"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(emulator.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_commands_require_connection() {
        let emulator = DeviceEmulator::new(quiet_config());

        assert!(emulator.tare().await.unwrap_err().is_not_connected());
        assert!(emulator.set_sample_rate(20).await.unwrap_err().is_not_connected());
        assert!(emulator.set_calibration(1.0).await.unwrap_err().is_not_connected());
        assert!(emulator
            .set_device_name("Bench")
            .await
            .unwrap_err()
            .is_not_connected());

        assert_eq!(emulator.read_sample_rate().await, None);
        assert_eq!(emulator.read_calibration().await, None);
        assert_eq!(emulator.read_device_name().await, None);

        // Disconnecting while disconnected is a no-op.
        assert!(emulator.disconnect().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_setters_apply_limits_and_emit() {
        let emulator = DeviceEmulator::new(quiet_config());
        emulator.connect().await.unwrap();
        let mut rx = emulator.subscribe();

        assert_eq!(emulator.set_sample_rate(0).await.unwrap(), 1);
        assert_eq!(emulator.set_sample_rate(500).await.unwrap(), 80);
        assert_eq!(
            emulator.set_device_name("Training Board Left Side").await.unwrap(),
            "Training Board Left "
        );
        assert_eq!(emulator.set_calibration(123.25).await.unwrap(), 123.25);

        assert_eq!(rx.recv().await.unwrap(), ScaleEvent::SampleRateUpdated(1));
        assert_eq!(rx.recv().await.unwrap(), ScaleEvent::SampleRateUpdated(80));
        assert_eq!(
            rx.recv().await.unwrap(),
            ScaleEvent::DeviceNameUpdated("Training Board Left ".to_string())
        );
        assert_eq!(rx.recv().await.unwrap(), ScaleEvent::CalibrationUpdated(123.25));

        assert_eq!(emulator.read_calibration().await, Some(123.25));
        let config = emulator.device_config();
        assert_eq!(config.sample_rate_hz, 80);
        assert_eq!(config.device_name, "Training Board Left ");
    }

    #[tokio::test(start_paused = true)]
    async fn test_tare_offsets_following_samples() {
        let emulator = DeviceEmulator::new(quiet_config());
        emulator.set_manual_weight(750.0);
        emulator.connect().await.unwrap();
        let mut rx = emulator.subscribe();

        assert_eq!(next_weight(&mut rx).await, 750.0);
        emulator.tare().await.unwrap();
        assert_eq!(emulator.tare_offset(), 750.0);
        assert_eq!(next_weight(&mut rx).await, 0.0);

        // Taring again at zero leaves the offset alone.
        emulator.tare().await.unwrap();
        assert_eq!(emulator.tare_offset(), 750.0);

        emulator.set_manual_weight(1000.0);
        assert_eq!(next_weight(&mut rx).await, 250.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peak_follows_samples_until_tare() {
        let emulator = DeviceEmulator::new(quiet_config());
        emulator.set_manual_weight(1200.0);
        emulator.connect().await.unwrap();
        let mut rx = emulator.subscribe();

        next_weight(&mut rx).await;
        emulator.set_manual_weight(800.0);
        next_weight(&mut rx).await;
        assert_eq!(emulator.peak_weight(), 1200.0);
        assert_eq!(emulator.last_weight(), Some(800.0));

        emulator.tare().await.unwrap();
        assert_eq!(emulator.peak_weight(), 0.0);

        emulator.set_manual_weight(1100.0);
        assert_eq!(next_weight(&mut rx).await, 300.0);
        assert_eq!(emulator.peak_weight(), 300.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recording_keeps_emitted_samples() {
        let emulator = DeviceEmulator::new(quiet_config());
        emulator.set_manual_weight(50.0);
        emulator.connect().await.unwrap();
        let mut rx = emulator.subscribe();

        next_weight(&mut rx).await;
        emulator.start_recording();
        for _ in 0..3 {
            next_weight(&mut rx).await;
        }
        assert_eq!(emulator.stop_recording(), 3);
        next_weight(&mut rx).await;

        let history = emulator.weight_history();
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|sample| sample.weight_grams == 50.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mode_change_resets_simulation() {
        let emulator = DeviceEmulator::new(quiet_config().with_mode(SimulationMode::Ramp));
        emulator.connect().await.unwrap();
        let mut rx = emulator.subscribe();

        for _ in 0..5 {
            next_weight(&mut rx).await;
        }
        assert_eq!(emulator.simulation_state().phase_tick_count, 5);

        emulator.set_simulation_mode(SimulationMode::Hold);
        let state = emulator.simulation_state();
        assert_eq!(state, SimulationState::new(SimulationMode::Hold));
    }

    #[tokio::test(start_paused = true)]
    async fn test_calibration_workflow() {
        let emulator = DeviceEmulator::new(quiet_config());
        emulator.connect().await.unwrap();

        let mut rx = emulator.subscribe();
        next_weight(&mut rx).await;
        assert!(emulator.last_weight().is_some());

        emulator.start_calibration().await.unwrap();
        assert_eq!(emulator.device_config().calibration_factor, 1.0);
        assert_eq!(emulator.last_weight(), None);

        assert!(matches!(
            emulator.complete_calibration(0.0).await,
            Err(Error::InvalidParameter { .. })
        ));
        assert_eq!(emulator.complete_calibration(4535.92).await.unwrap(), 420.0);
        assert_eq!(emulator.read_calibration().await, Some(420.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_seeded_emulators_agree() {
        let config = EmulatorConfig::new()
            .with_mode(SimulationMode::Noise)
            .with_noise_level(80.0)
            .with_seed(1234);
        let a = DeviceEmulator::new(config.clone());
        let b = DeviceEmulator::new(config);
        a.connect().await.unwrap();
        b.connect().await.unwrap();
        let mut rx_a = a.subscribe();
        let mut rx_b = b.subscribe();

        for _ in 0..20 {
            assert_eq!(next_weight(&mut rx_a).await, next_weight(&mut rx_b).await);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_samples_after_disconnect() {
        let emulator = DeviceEmulator::new(quiet_config());
        emulator.connect().await.unwrap();
        let mut rx = emulator.subscribe();
        next_weight(&mut rx).await;

        emulator.disconnect().await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            ScaleEvent::ConnectionChanged {
                state: ConnectionState::Disconnected,
                device_name: None,
            }
        );

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
