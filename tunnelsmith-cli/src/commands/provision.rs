//! Provision a tunnel for a local port

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use tracing::{error, info, warn};

use tunnelsmith_core::{
    Cloudflared, MergeOutcome, OperationRequest, ProvisionError, ProvisionFailure, Provisioner,
};

use crate::config::Settings;
use crate::output::Console;

/// Arguments for provisioning
#[derive(Debug, Args)]
pub struct ProvisionArgs {
    /// Local port to expose (1-65535)
    #[arg(short, long, allow_hyphen_values = true)]
    pub port: String,

    /// Public hostname routed to the tunnel
    #[arg(short, long)]
    pub domain: String,

    /// Tunnel name; an existing tunnel with this name is reused
    #[arg(short, long)]
    pub name: String,

    /// Directory holding config.yaml and tunnel credentials [default: ~/.cloudflared]
    #[arg(short, long, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Path to the cloudflared binary
    #[arg(long, value_name = "PATH")]
    pub daemon: Option<PathBuf>,
}

impl ProvisionArgs {
    /// Build the request, filling the config directory from settings.
    fn request(&self, settings: &Settings) -> OperationRequest {
        OperationRequest {
            port: self.port.clone(),
            domain: self.domain.clone(),
            tunnel_name: self.name.clone(),
            config_dir: self
                .config_dir
                .clone()
                .or_else(|| settings.ingress.config_dir.clone()),
        }
    }
}

/// Run the provisioning sequence and map its outcome to an exit code
pub async fn run(args: ProvisionArgs, settings: &Settings) -> ExitCode {
    let mut console = Console::stdout();

    let request = match args.request(settings).validate() {
        Ok(request) => request,
        Err(e) => {
            error!("Invalid request: {}", e);
            shown(console.failure(&e.to_string(), Some(USAGE_HINT)));
            return ExitCode::FAILURE;
        }
    };

    let binary = args
        .daemon
        .clone()
        .unwrap_or_else(|| settings.daemon.binary.clone());
    let daemon = match Cloudflared::locate(&binary) {
        Ok(daemon) => daemon
            .with_origin_cert(&settings.daemon.origin_cert)
            .with_log_dir(&settings.log.dir),
        Err(e) => {
            error!("{}", e);
            shown(console.failure(&e.to_string(), Some(INSTALL_HINT)));
            return ExitCode::FAILURE;
        }
    };
    match daemon.version().await {
        Some(version) => info!("Using cloudflared {} ({})", version, daemon.binary().display()),
        None => info!("Using {}", daemon.binary().display()),
    }

    shown(console.request(&request));

    let mut provisioner = Provisioner::new(daemon);
    match provisioner.run_validated(request).await {
        Ok(report) => {
            match report.merge {
                MergeOutcome::Merged => info!(
                    "Provisioned {} -> localhost:{} on tunnel {}",
                    report.domain, report.port, report.tunnel_id
                ),
                MergeOutcome::Skipped(reason) => info!(
                    "Tunnel {} running for {}; config unchanged ({})",
                    report.tunnel_id, report.domain, reason
                ),
            }
            shown(console.success("Tunnel is up"));
            shown(console.report(&report));
            ExitCode::SUCCESS
        }
        Err(failure) => {
            shown(console.failure(&failure.to_string(), hint(&failure)));
            ExitCode::FAILURE
        }
    }
}

/// The run log holds the outcome, so a console write failure does not fail the run.
fn shown(result: io::Result<()>) {
    if let Err(e) = result {
        warn!("Failed to write console output: {}", e);
    }
}

const USAGE_HINT: &str = "Run 'tunnelsmith --help' for usage.";

const INSTALL_HINT: &str = "Install cloudflared: https://developers.cloudflare.com/cloudflare-one/connections/connect-networks/downloads/";

fn hint(failure: &ProvisionFailure) -> Option<&'static str> {
    match &failure.cause {
        ProvisionError::Authentication(_) => {
            Some("Run 'cloudflared tunnel login' yourself, then retry.")
        }
        ProvisionError::MissingCredentials { .. } => Some(
            "Copy the tunnel's credentials file into the config dir, or delete the tunnel with 'cloudflared tunnel delete'.",
        ),
        cause if cause.is_identifier_extraction() => {
            Some("cloudflared printed no tunnel ID; check 'cloudflared tunnel list'.")
        }
        ProvisionError::DnsRouting(_) => Some(
            "The tunnel is running and configured; route DNS with 'cloudflared tunnel route dns'.",
        ),
        _ => None,
    }
}
