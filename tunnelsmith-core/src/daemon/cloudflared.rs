//! cloudflared CLI wrapper and output parsing

use std::ffi::{OsStr, OsString};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use super::{CommandOutput, LaunchedTunnel, TunnelDaemon};
use crate::error::DaemonError;

/// The cloudflared binary plus the paths it reads and writes
#[derive(Debug, Clone)]
pub struct Cloudflared {
    binary: PathBuf,
    origin_cert: PathBuf,
    log_dir: PathBuf,
}

impl Cloudflared {
    /// Use `binary` as given, without checking that it exists.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            origin_cert: tunnelsmith_paths::origin_cert_path(),
            log_dir: tunnelsmith_paths::log_dir(),
        }
    }

    /// Resolve `binary` on PATH (or as a path) and fail early if it is missing.
    pub fn locate(binary: impl AsRef<OsStr>) -> Result<Self, DaemonError> {
        let binary = binary.as_ref();
        let path = which::which(binary)
            .map_err(|_| DaemonError::NotInstalled(binary.to_string_lossy().into_owned()))?;
        Ok(Self::new(path))
    }

    /// Origin certificate whose presence means login already happened.
    pub fn with_origin_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.origin_cert = path.into();
        self
    }

    /// Directory for background tunnel output.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Version reported by `cloudflared --version`, if it runs.
    pub async fn version(&self) -> Option<String> {
        let output = self.run(["--version"]).await.ok()?;
        parse_version(&output.stdout)
    }

    /// Run a subcommand to completion and capture its stdout.
    ///
    /// A non-zero exit is returned as [`DaemonError::ExitStatus`].
    pub async fn run<I, S>(&self, args: I) -> Result<CommandOutput, DaemonError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
        let command = self.describe(&args);
        debug!("Running {}", command);

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| DaemonError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(DaemonError::ExitStatus {
                command,
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            exit_code: output.status.code().unwrap_or_default(),
        })
    }

    /// Run a subcommand attached to the terminal (login prints a URL to open).
    async fn run_interactive(&self, args: &[&str]) -> Result<(), DaemonError> {
        let args: Vec<OsString> = args.iter().map(OsString::from).collect();
        let command = self.describe(&args);
        debug!("Running {} interactively", command);

        let status = Command::new(&self.binary)
            .args(&args)
            .status()
            .await
            .map_err(|source| DaemonError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !status.success() {
            return Err(DaemonError::ExitStatus {
                command,
                exit_code: status.code(),
                stderr: String::new(),
            });
        }
        Ok(())
    }

    /// Human-readable command line for logs and errors.
    fn describe(&self, args: &[OsString]) -> String {
        let program = self
            .binary
            .file_name()
            .unwrap_or(self.binary.as_os_str())
            .to_string_lossy();
        let mut command = program.into_owned();
        for arg in args {
            command.push(' ');
            command.push_str(&arg.to_string_lossy());
        }
        command
    }

    fn tunnel_log_path(&self, tunnel_id: &str) -> PathBuf {
        self.log_dir.join(format!("cloudflared-{tunnel_id}.log"))
    }
}

#[async_trait]
impl TunnelDaemon for Cloudflared {
    async fn ensure_authenticated(&self) -> Result<(), DaemonError> {
        if self.origin_cert.exists() {
            info!(
                "Origin certificate found at {}, skipping login",
                self.origin_cert.display()
            );
            return Ok(());
        }

        info!("Logging in to Cloudflare (a browser window may open)");
        self.run_interactive(&["tunnel", "login"]).await
    }

    async fn find_tunnel(&self, name: &str) -> Result<Option<String>, DaemonError> {
        let output = self.run(["tunnel", "list", "--output", "json"]).await?;
        let tunnels = parse_tunnel_list(&output.stdout)?;
        Ok(tunnels.into_iter().find(|t| t.name == name).map(|t| t.id))
    }

    async fn create_tunnel(
        &self,
        name: &str,
        credentials_file: &Path,
    ) -> Result<String, DaemonError> {
        let output = self
            .run([
                OsStr::new("tunnel"),
                OsStr::new("create"),
                OsStr::new("--credentials-file"),
                credentials_file.as_os_str(),
                OsStr::new(name),
            ])
            .await?;
        extract_tunnel_id(&output.stdout)
    }

    async fn run_tunnel_background(
        &self,
        tunnel_id: &str,
        config_file: &Path,
    ) -> Result<LaunchedTunnel, DaemonError> {
        let args = [
            OsStr::new("--config"),
            config_file.as_os_str(),
            OsStr::new("tunnel"),
            OsStr::new("run"),
            OsStr::new(tunnel_id),
        ];
        let command = self.describe(&args.map(OsStr::to_owned));
        let spawn_error = |source: std::io::Error| DaemonError::Spawn {
            command: command.clone(),
            source,
        };

        let log_path = self.tunnel_log_path(tunnel_id);
        std::fs::create_dir_all(&self.log_dir).map_err(spawn_error)?;
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(spawn_error)?;
        let log_err = log.try_clone().map_err(spawn_error)?;

        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(false);
        // Keep the tunnel alive when the terminal sends SIGINT to our group
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(spawn_error)?;
        debug!("Spawned {} as pid {:?}", command, child.id());

        Ok(LaunchedTunnel::spawned(tunnel_id, child, log_path))
    }

    async fn route_dns(&self, tunnel_id: &str, domain: &str) -> Result<(), DaemonError> {
        self.run(["tunnel", "route", "dns", tunnel_id, domain])
            .await
            .map(drop)
    }
}

/// An existing tunnel from `cloudflared tunnel list --output json`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ExistingTunnel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn parse_tunnel_list(stdout: &str) -> Result<Vec<ExistingTunnel>, DaemonError> {
    // cloudflared prints `null` when no tunnels exist, not `[]`
    let tunnels: Option<Vec<ExistingTunnel>> = serde_json::from_str(stdout.trim())?;
    Ok(tunnels.unwrap_or_default())
}

/// Parse version from cloudflared --version output.
/// Example: "cloudflared version 2024.1.0 (built 2024-01-15-1234)"
fn parse_version(output: &str) -> Option<String> {
    output
        .lines()
        .next()?
        .split_whitespace()
        .nth(2)
        .map(String::from)
}

/// Find a tunnel ID in free-text create output.
///
/// Accepts `ID: <token>` and cloudflared's own `with id <token>`, where the
/// token is ASCII alphanumerics and hyphens.
pub fn parse_tunnel_id(output: &str) -> Option<String> {
    const MARKERS: [&str; 2] = ["ID: ", "with id "];

    output.lines().find_map(|line| {
        MARKERS.iter().find_map(|marker| {
            let start = line.find(marker)? + marker.len();
            let id: String = line[start..]
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
                .collect();
            (!id.is_empty()).then_some(id)
        })
    })
}

/// Like [`parse_tunnel_id`], treating a missing ID as an error.
pub fn extract_tunnel_id(output: &str) -> Result<String, DaemonError> {
    parse_tunnel_id(output).ok_or_else(|| DaemonError::IdentifierNotFound {
        output: output.to_string(),
    })
}
