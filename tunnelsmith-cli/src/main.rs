use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use clap::error::ErrorKind;
use tracing::error;

mod commands;
mod config;
mod logging;
mod output;

use config::{ConfigLoader, LogSettings, Settings};

#[derive(Parser)]
#[command(
    name = "tunnelsmith",
    about = "Expose a local port through a Cloudflare Tunnel"
)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    provision: commands::provision::ProvisionArgs,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Settings file [default: ~/.config/tunnelsmith/config.toml]
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return argument_error(err),
    };

    let settings = match ConfigLoader::load(cli.settings.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            log_early_error(&LogSettings::default(), cli.verbose, &format!("{:#}", e));
            return ExitCode::FAILURE;
        }
    };

    match run(cli, &settings).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, settings: &Settings) -> Result<ExitCode> {
    // Held until exit so the run log is flushed
    let _log_guard = logging::init_logging(&settings.log, cli.verbose)?;

    Ok(commands::provision::run(cli.provision, settings).await)
}

/// Help and version exit 0; any other argument error is a failed run.
fn argument_error(err: clap::Error) -> ExitCode {
    let printed = err.print();
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            if printed.is_err() {
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        _ => {
            let message = err.to_string();
            let summary = message.lines().next().unwrap_or("invalid arguments");
            // The settings file named on the command line is unknown here
            let log = ConfigLoader::load(None).unwrap_or_default().log;
            log_early_error(&log, false, &format!("Invalid arguments: {}", summary));
            ExitCode::FAILURE
        }
    }
}

/// Log an error raised before the run's own logging is set up.
fn log_early_error(log: &LogSettings, verbose: bool, message: &str) {
    match logging::init_logging(log, verbose) {
        Ok(_guard) => error!("{}", message),
        Err(e) => eprintln!("Error: {} (run log unavailable: {:#})", message, e),
    }
}
