// lockbell - audible lock-key indicator
// Entry point: logging, config, signal handling and command dispatch

mod cli;
mod commands;

use clap::Parser;
use tracing::{error, info};

use cli::{Cli, Commands};
use lockbell::{Config, Outcome, Shutdown};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { cli.log_level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Load config
    let config_path = cli.config.clone().unwrap_or_else(Config::resolve_path);
    let mut config = Config::load(&config_path)?;
    tracing::debug!("Config: {}", config_path.display());

    let outcome = match cli.command {
        Commands::Devices => return commands::devices::run(),
        Commands::Watch { device } => {
            let shutdown = Shutdown::install()?;
            return commands::watch::run(device.or(config.server.device), shutdown).await;
        }
        Commands::Server {
            device,
            fifo,
            pid_file,
        } => {
            config.server.device = device.or(config.server.device);
            if let Some(fifo) = fifo {
                config.channel.path = fifo;
            }
            if let Some(pid_file) = pid_file {
                config.server.pid_file = pid_file;
            }
            match Shutdown::install() {
                Ok(shutdown) => commands::server::run(&config, shutdown).await,
                Err(e) => Outcome::from(lockbell::Fatal::from(e)),
            }
        }
        Commands::Client {
            fifo,
            pid_file,
            cue,
        } => {
            if let Some(fifo) = fifo {
                config.channel.path = fifo;
            }
            config.client.pid_file = pid_file.or(config.client.pid_file);
            if let Some(cue) = cue {
                config.client.cue = cue;
            }
            match Shutdown::install() {
                Ok(shutdown) => commands::client::run(&config, shutdown).await,
                Err(e) => Outcome::from(lockbell::Fatal::from(e)),
            }
        }
    };

    match &outcome {
        Outcome::AlreadyRunning { pid: Some(pid) } => info!("Already running as pid {pid}"),
        Outcome::AlreadyRunning { pid: None } => info!("Already running"),
        Outcome::Fatal(e) => error!("Exiting: {e}"),
        Outcome::Requested | Outcome::ProducerGone => {}
    }

    // Exit without waiting for blocking-pool threads parked in a FIFO open
    std::process::exit(outcome.exit_code());
}
