use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use voice_sos::{Config, EmergencyController, console};

/// sos - Listen for a spoken trigger phrase and place an emergency call
#[derive(Parser)]
#[command(name = "sos", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/voice-sos/config.toml)
    #[arg(short, long, env = "SOS_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Listen on stdin for the trigger phrase until Ctrl-C (default)
    Listen,
    /// Run the emergency sequence once, as a panic button would
    Trigger,
    /// Print the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,voice_sos=info",
        1 => "info,voice_sos=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Listen) {
        Command::Listen => listen(config).await,
        Command::Trigger => trigger(config).await,
        Command::Config => show_config(&config, cli.config),
    }
}

async fn listen(config: Config) -> anyhow::Result<()> {
    let caps = console::capabilities(&config);
    let controller = EmergencyController::new(config, caps)?;

    controller.start_listening().await?;
    eprintln!("Say (type) the trigger phrase to raise an emergency. Ctrl-C to quit.");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    controller.teardown().await;
    Ok(())
}

async fn trigger(config: Config) -> anyhow::Result<()> {
    let caps = console::capabilities(&config);
    let controller = EmergencyController::new(config, caps)?;

    let report = controller.trigger_emergency().await;
    controller.teardown().await;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.call_placed() {
        Ok(())
    } else {
        anyhow::bail!(
            "emergency call failed: {}",
            report.failure.as_deref().unwrap_or("unknown error")
        )
    }
}

fn show_config(config: &Config, explicit_path: Option<PathBuf>) -> anyhow::Result<()> {
    match explicit_path.or_else(Config::file_path) {
        Some(path) => println!("# config file: {}", path.display()),
        None => println!("# config file: none (no home directory)"),
    }
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
