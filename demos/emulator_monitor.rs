//! Run the emulator through each simulation mode and print a summary
//!
//! Run with: cargo run --example emulator_monitor

use openscale_ble::{DeviceEmulator, EmulatorConfig, Result, ScaleSource, SimulationMode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("openscale_ble=info".parse().unwrap()),
        )
        .init();

    let emulator = DeviceEmulator::new(
        EmulatorConfig::new()
            .with_sample_rate(20)
            .with_noise_level(30.0)
            .with_seed(2024),
    );

    let samples = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&samples);
    let _handle = emulator.events().on_weight_updated(move |sample| {
        let n = counter.fetch_add(1, Ordering::Relaxed);
        // Print every half second at 20 Hz.
        if n % 10 == 0 {
            println!("  {:>9.1} g", sample.weight_grams);
        }
    });

    let name = emulator.connect().await?;
    println!("Connected to {}\n", name);

    emulator.set_manual_weight(12_500.0);

    for mode in SimulationMode::ALL {
        println!("--- {} ---", mode);
        emulator.set_simulation_mode(mode);

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(8)) => {}
            _ = tokio::signal::ctrl_c() => {
                println!("\nInterrupted!");
                break;
            }
        }

        let state = emulator.simulation_state();
        println!(
            "phase: {:?}, target: {:.0} g, pulls: {}\n",
            state.phase, state.target_weight_grams, state.pull_count
        );
    }

    println!("Peak weight: {:.1} g", emulator.peak_weight());
    emulator.tare().await?;
    println!("Tare offset: {:.1} g", emulator.tare_offset());
    println!("Samples received: {}", samples.load(Ordering::Relaxed));

    emulator.disconnect().await?;
    println!("\nDone!");

    Ok(())
}
