use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::path::PathBuf;
use std::process;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use mymazda_lib::{ClientConfig, Connection, Controller, Credentials, Region};

/// Command-line client for the MyMazda connected-vehicle service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Account email address.
    #[arg(short, long, env = "MAZDA_EMAIL")]
    email: String,
    /// Account password.
    #[arg(short, long, env = "MAZDA_PASSWORD", hide_env_values = true)]
    password: String,
    /// Regional deployment: MNAO, MME or MJO.
    #[arg(short, long, env = "MAZDA_REGION", default_value = "MNAO")]
    region: Region,
    /// Locale sent with every request.
    #[arg(long, default_value = "en-US")]
    locale: String,
    /// Base64 DER RSA public key for the sensor-data header.
    #[arg(long, env = "MAZDA_SENSOR_DATA_KEY")]
    sensor_data_key: Option<String>,
    /// Optional directory for daily-rolling log files, in addition to the console.
    #[arg(long)]
    log_dir: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and print the token expiry.
    Login,
    /// Terms and conditions.
    Tac,
    /// Language package for the app.
    LanguagePkg,
    /// Vehicles registered to the account.
    Vehicles,
    /// Current status of one vehicle.
    Status { internal_vin: String },
    /// Health report of one vehicle.
    Health { internal_vin: String },
    Lock { internal_vin: String },
    Unlock { internal_vin: String },
    /// Turn hazard lights on.
    LightOn { internal_vin: String },
    /// Turn hazard lights off.
    LightOff { internal_vin: String },
    EngineStart { internal_vin: String },
    EngineStop { internal_vin: String },
}

fn setup_logging(log_dir: Option<&PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    let (file_layer, guard) = if let Some(dir) = log_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create log directory {:?}", dir))?;
        let appender = tracing_appender::rolling::daily(dir, "mymazda.log");
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // -v gives DEBUG, -vv TRACE; RUST_LOG overrides both
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(dir) = log_dir {
        info!("Logging to directory: {:?}", dir);
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_dir.as_ref(), &cli.verbose)?;

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = ClientConfig::for_region(cli.region).with_locale(cli.locale);
    if let Some(key) = cli.sensor_data_key {
        config = config.with_sensor_data_public_key(key);
    }

    let connection = Connection::new(Credentials::new(cli.email, cli.password), config)
        .context("Failed to create connection")?;
    let controller = Controller::new(connection);

    let response = match &cli.command {
        Command::Login => {
            let token = controller.connection().login().await.context("Login failed")?;
            serde_json::json!({ "accessTokenExpirationTs": token.expiration_ts })
        }
        Command::Tac => controller.get_tac().await?,
        Command::LanguagePkg => controller.get_language_pkg().await?,
        Command::Vehicles => controller.get_vec_base_infos().await?,
        Command::Status { internal_vin } => controller.get_vehicle_status(internal_vin).await?,
        Command::Health { internal_vin } => controller.get_health_report(internal_vin).await?,
        Command::Lock { internal_vin } => controller.door_lock(internal_vin).await?,
        Command::Unlock { internal_vin } => controller.door_unlock(internal_vin).await?,
        Command::LightOn { internal_vin } => controller.light_on(internal_vin).await?,
        Command::LightOff { internal_vin } => controller.light_off(internal_vin).await?,
        Command::EngineStart { internal_vin } => controller.engine_start(internal_vin).await?,
        Command::EngineStop { internal_vin } => controller.engine_stop(internal_vin).await?,
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    controller.close();
    Ok(())
}
