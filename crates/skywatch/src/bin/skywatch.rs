use std::fs::File;
use std::process::ExitCode;

use anyhow::{Context, Result};
use argh::FromArgs;
use skywatch::client::SocketIoConnector;
use skywatch::tui::{self, Tui};
use skywatch::{Config, Station};
use tokio::sync::watch;

#[derive(FromArgs)]
/// Live terminal dashboard for a personal weather station
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    config: Option<String>,

    /// write logs to this file (the dashboard owns the terminal)
    #[argh(option)]
    log_file: Option<String>,

    /// observer latitude in degrees, north positive
    #[argh(option)]
    latitude: Option<f64>,

    /// observer longitude in degrees, east positive
    #[argh(option)]
    longitude: Option<f64>,

    /// observer timezone, IANA name such as America/New_York
    #[argh(option)]
    timezone: Option<String>,
}

/// Logs only ever go to a file. Without `--log-file` no logger is installed,
/// so nothing can write over the dashboard whatever `RUST_LOG` says.
fn file_logger(log_file: Option<&str>, env: env_logger::Env) -> Result<Option<env_logger::Builder>> {
    let Some(path) = log_file else {
        return Ok(None);
    };
    let file =
        File::create(path).with_context(|| format!("Failed to open log file '{}'", path))?;
    let mut builder = env_logger::Builder::from_env(env.default_filter_or("info"));
    builder.target(env_logger::Target::Pipe(Box::new(file)));
    Ok(Some(builder))
}

fn init_logging(log_file: Option<&str>) -> Result<()> {
    if let Some(mut builder) = file_logger(log_file, env_logger::Env::default())? {
        builder.init();
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from '{}'", path))?,
        None => {
            log::info!("No config file specified, using defaults and environment");
            Config::default()
        }
    };

    config.apply_env();
    if let Some(latitude) = args.latitude {
        config.observer.latitude = latitude;
    }
    if let Some(longitude) = args.longitude {
        config.observer.longitude = longitude;
    }
    if let Some(timezone) = &args.timezone {
        config.observer.timezone = timezone.clone();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn run(config: Config) -> Result<()> {
    // wss:// needs exactly one process-wide crypto provider; a second install is harmless
    let _ = rustls::crypto::ring::default_provider().install_default();

    let mut station = Station::from_config(&config)?;
    let connector = SocketIoConnector::new(
        &config.endpoint,
        &config.application_key,
        config.connect_timeout(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Signals from outside the terminal (kill -INT, a parent process)
    {
        let shutdown_tx = shutdown_tx.clone();
        ctrlc::set_handler(move || {
            log::info!("Received interrupt, shutting down gracefully...");
            let _ = shutdown_tx.send(true);
        })
        .context("Failed to install interrupt handler")?;
    }

    let mut terminal = Tui::enter().context("Failed to initialise terminal")?;
    let keys = tokio::spawn(tui::watch_keys(shutdown_tx));

    let result = station.run(&connector, &mut terminal, shutdown_rx).await;
    keys.abort();

    match result {
        Ok(()) => {
            terminal.restore()?;
            log::info!("Skywatch shut down");
            Ok(())
        }
        Err(e) => {
            log::error!("Session failed: {}", e);
            terminal.show_fatal(&e.to_string())?;
            tui::wait_for_keypress().await?;
            terminal.restore()?;
            Err(e.into())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Args = argh::from_env();

    if let Err(e) = init_logging(args.log_file.as_deref()) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
