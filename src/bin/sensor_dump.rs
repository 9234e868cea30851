//! Print freshly generated sensor-data blobs, optionally encrypted.

use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::info;

use mymazda_lib::sensordata::encryptor::HybridSensorEncryptor;
use mymazda_lib::sensordata::{SensorDataBuilder, SensorDataOptions};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of blobs to print.
    #[arg(short, long, default_value_t = 1)]
    count: u32,
    /// Pretend the collection window opened this many seconds ago.
    #[arg(short, long, default_value_t = 0)]
    elapsed: i64,
    /// Emit key and background events whenever their time gate allows.
    #[arg(long)]
    always_events: bool,
    /// Base64 DER RSA public key; prints the encrypted header instead.
    #[arg(long, env = "MAZDA_SENSOR_DATA_KEY")]
    public_key: Option<String>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.verbose.tracing_level_filter())
        .with_writer(std::io::stderr)
        .init();

    let options = if cli.always_events {
        SensorDataOptions {
            key_event_odds: 1,
            background_event_odds: 1,
        }
    } else {
        SensorDataOptions::default()
    };
    let start = Utc::now() - TimeDelta::seconds(cli.elapsed);
    let mut builder = SensorDataBuilder::started_at(start, options);
    if let Some(key) = &cli.public_key {
        let encryptor = HybridSensorEncryptor::new(key).context("Invalid public key")?;
        builder = builder.with_encryptor(Box::new(encryptor));
    }

    info!(started = %builder.started(), encrypted = builder.has_encryptor(), "Generating sensor data");
    for _ in 0..cli.count {
        let line = if builder.has_encryptor() {
            builder.generate()?
        } else {
            builder.build()
        };
        println!("{line}");
    }

    Ok(())
}
