//! Scripted daemon for testing
//!
//! MockDaemon records every call and answers from a script, so provisioning
//! logic can be tested without a cloudflared binary or a Cloudflare account.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{LaunchedTunnel, TunnelDaemon, extract_tunnel_id};
use crate::error::DaemonError;

/// A call received by [`MockDaemon`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonCall {
    Login,
    FindTunnel {
        name: String,
    },
    CreateTunnel {
        name: String,
        credentials_file: PathBuf,
    },
    RunTunnel {
        tunnel_id: String,
        config_file: PathBuf,
    },
    RouteDns {
        tunnel_id: String,
        domain: String,
    },
}

/// Mock implementation of TunnelDaemon
///
/// Every operation succeeds unless scripted to fail. Tunnel creation parses
/// `create_output` exactly like the real daemon's stdout.
#[derive(Debug)]
pub struct MockDaemon {
    create_output: String,
    existing: Vec<(String, String)>,
    login_exit: Option<i32>,
    create_exit: Option<i32>,
    launch_exit: Option<i32>,
    route_exit: Option<i32>,
    calls: Mutex<Vec<DaemonCall>>,
}

impl MockDaemon {
    /// A daemon whose create output announces `tunnel_id`.
    pub fn new(tunnel_id: &str) -> Self {
        Self::with_create_output(format!("Created tunnel mock with id {tunnel_id}\n"))
    }

    /// A daemon that prints `stdout` on create and exits 0.
    pub fn with_create_output(stdout: impl Into<String>) -> Self {
        Self {
            create_output: stdout.into(),
            existing: Vec::new(),
            login_exit: None,
            create_exit: None,
            launch_exit: None,
            route_exit: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Report a tunnel as already existing in the account.
    pub fn with_existing_tunnel(mut self, name: &str, tunnel_id: &str) -> Self {
        self.existing.push((name.to_string(), tunnel_id.to_string()));
        self
    }

    pub fn fail_login(mut self, exit_code: i32) -> Self {
        self.login_exit = Some(exit_code);
        self
    }

    pub fn fail_create(mut self, exit_code: i32) -> Self {
        self.create_exit = Some(exit_code);
        self
    }

    pub fn fail_launch(mut self, exit_code: i32) -> Self {
        self.launch_exit = Some(exit_code);
        self
    }

    pub fn fail_route(mut self, exit_code: i32) -> Self {
        self.route_exit = Some(exit_code);
        self
    }

    /// Calls received so far, in order.
    pub async fn calls(&self) -> Vec<DaemonCall> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: DaemonCall) {
        self.calls.lock().await.push(call);
    }
}

fn scripted(command: &str, exit_code: Option<i32>) -> Result<(), DaemonError> {
    match exit_code {
        Some(code) => Err(DaemonError::ExitStatus {
            command: command.to_string(),
            exit_code: Some(code),
            stderr: "scripted failure".to_string(),
        }),
        None => Ok(()),
    }
}

#[async_trait]
impl TunnelDaemon for MockDaemon {
    async fn ensure_authenticated(&self) -> Result<(), DaemonError> {
        self.record(DaemonCall::Login).await;
        scripted("cloudflared tunnel login", self.login_exit)
    }

    async fn find_tunnel(&self, name: &str) -> Result<Option<String>, DaemonError> {
        self.record(DaemonCall::FindTunnel {
            name: name.to_string(),
        })
        .await;
        Ok(self
            .existing
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, id)| id.clone()))
    }

    async fn create_tunnel(
        &self,
        name: &str,
        credentials_file: &Path,
    ) -> Result<String, DaemonError> {
        self.record(DaemonCall::CreateTunnel {
            name: name.to_string(),
            credentials_file: credentials_file.to_path_buf(),
        })
        .await;
        scripted("cloudflared tunnel create", self.create_exit)?;
        let tunnel_id = extract_tunnel_id(&self.create_output)?;

        // Like cloudflared, write the credentials file on success
        tokio::fs::write(credentials_file, format!("{{\"TunnelID\":\"{tunnel_id}\"}}"))
            .await
            .map_err(|source| DaemonError::Spawn {
                command: "cloudflared tunnel create".to_string(),
                source,
            })?;
        Ok(tunnel_id)
    }

    async fn run_tunnel_background(
        &self,
        tunnel_id: &str,
        config_file: &Path,
    ) -> Result<LaunchedTunnel, DaemonError> {
        self.record(DaemonCall::RunTunnel {
            tunnel_id: tunnel_id.to_string(),
            config_file: config_file.to_path_buf(),
        })
        .await;
        scripted("cloudflared tunnel run", self.launch_exit)?;
        Ok(LaunchedTunnel::detached(tunnel_id, None))
    }

    async fn route_dns(&self, tunnel_id: &str, domain: &str) -> Result<(), DaemonError> {
        self.record(DaemonCall::RouteDns {
            tunnel_id: tunnel_id.to_string(),
            domain: domain.to_string(),
        })
        .await;
        scripted("cloudflared tunnel route dns", self.route_exit)
    }
}
