//! Tunnel daemon invocation
//!
//! [`TunnelDaemon`] is the seam between the orchestrator and the external
//! `cloudflared` binary. [`Cloudflared`] runs the real subcommands;
//! [`MockDaemon`] scripts their outcomes for tests.

mod cloudflared;
mod mock;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Child;

use crate::error::DaemonError;

pub use cloudflared::{Cloudflared, ExistingTunnel, extract_tunnel_id, parse_tunnel_id};
pub use mock::{DaemonCall, MockDaemon};

/// Captured result of a daemon subcommand that exited successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub exit_code: i32,
}

/// Operations the provisioner needs from the tunnel daemon
#[async_trait]
pub trait TunnelDaemon: Send + Sync {
    /// Make sure the daemon holds an origin certificate, logging in if needed.
    async fn ensure_authenticated(&self) -> Result<(), DaemonError>;

    /// Look up an existing tunnel by name, returning its ID.
    async fn find_tunnel(&self, name: &str) -> Result<Option<String>, DaemonError>;

    /// Create a tunnel, writing its credentials to `credentials_file`.
    ///
    /// Succeeding without a tunnel ID in the output is an error.
    async fn create_tunnel(
        &self,
        name: &str,
        credentials_file: &Path,
    ) -> Result<String, DaemonError>;

    /// Start the tunnel in the background and return without waiting on it.
    async fn run_tunnel_background(
        &self,
        tunnel_id: &str,
        config_file: &Path,
    ) -> Result<LaunchedTunnel, DaemonError>;

    /// Point `domain` at the tunnel.
    async fn route_dns(&self, tunnel_id: &str, domain: &str) -> Result<(), DaemonError>;
}

/// A tunnel process that was launched and is not awaited
///
/// Dropping this value leaves the process running.
#[derive(Debug)]
pub struct LaunchedTunnel {
    pub tunnel_id: String,
    pub pid: Option<u32>,
    pub log_path: Option<PathBuf>,
    child: Option<Child>,
}

impl LaunchedTunnel {
    /// Wrap a spawned child process, retaining its handle.
    pub fn spawned(tunnel_id: impl Into<String>, child: Child, log_path: PathBuf) -> Self {
        Self {
            tunnel_id: tunnel_id.into(),
            pid: child.id(),
            log_path: Some(log_path),
            child: Some(child),
        }
    }

    /// Describe a launch without a local child handle.
    pub fn detached(tunnel_id: impl Into<String>, pid: Option<u32>) -> Self {
        Self {
            tunnel_id: tunnel_id.into(),
            pid,
            log_path: None,
            child: None,
        }
    }

    /// Whether the child process handle is still held.
    pub fn is_retained(&self) -> bool {
        self.child.is_some()
    }

    /// Whether the retained child is still running; `None` without a handle.
    pub fn is_running(&mut self) -> Option<bool> {
        let child = self.child.as_mut()?;
        Some(matches!(child.try_wait(), Ok(None)))
    }
}
