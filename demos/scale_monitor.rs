//! Connect to a nearby OpenScale and print live weight readings
//!
//! Run with: cargo run --example scale_monitor [name-filter]

use openscale_ble::{
    grams_to_kilograms, grams_to_pounds, ConnectionState, DeviceLink, LinkConfig, Result,
    ScaleSource,
};
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

    let mut config = LinkConfig::new().with_scan_timeout(Duration::from_secs(15));
    if let Some(filter) = std::env::args().nth(1) {
        println!("Only connecting to scales named *{}*", filter);
        config = config.with_name_filter(filter);
    }

    let scale = DeviceLink::new(config);

    let _state_handle = scale.events().on_connection_changed(|state, name| match state {
        ConnectionState::Connected => {
            println!("Connected to {}", name.unwrap_or("unknown scale"))
        }
        other => println!("Connection: {}", other),
    });

    let _weight_handle = scale.events().on_weight_updated(|sample| {
        println!(
            "{:>10.1} g  {:>7.2} kg  {:>7.2} lb",
            sample.weight_grams,
            grams_to_kilograms(sample.weight_grams),
            grams_to_pounds(sample.weight_grams)
        );
    });

    println!("Scanning for OpenScale devices...");
    scale.connect().await?;

    let config = scale.device_config();
    println!(
        "Device name: {}, sample rate: {} Hz, calibration factor: {}",
        config.device_name, config.sample_rate_hz, config.calibration_factor
    );

    scale.tare().await?;
    println!("Tared. Press Ctrl+C to exit.\n");

    tokio::signal::ctrl_c().await.ok();

    println!("\nDisconnecting...");
    scale.disconnect().await?;

    Ok(())
}
