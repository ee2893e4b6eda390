//! Error types for tunnelsmith-core

use std::path::PathBuf;

use thiserror::Error;

use crate::provision::Stage;

/// Errors from validating an operation request
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid port '{0}': expected an integer between 1 and 65535")]
    InvalidPort(String),

    #[error("Invalid domain '{0}': only letters, digits, '.' and '-' are allowed")]
    InvalidDomain(String),

    #[error("Tunnel name cannot be empty")]
    MissingTunnelName,

    #[error("Config directory cannot be empty")]
    MissingConfigDir,

    #[error("Failed to create config directory {}: {source}", .path.display())]
    ConfigDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from invoking the tunnel daemon
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("{0} is not installed or not on PATH")]
    NotInstalled(String),

    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}: {stderr}", describe_exit(.exit_code))]
    ExitStatus {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("No tunnel ID found in daemon output")]
    IdentifierNotFound { output: String },

    #[error("Failed to parse tunnel listing: {0}")]
    InvalidListing(#[from] serde_json::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}

impl DaemonError {
    /// Exit code of the failed subcommand, if it ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ExitStatus { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

/// Errors from reading or writing the ingress configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to {op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub(crate) fn io(
        op: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { op, path, source }
    }
}

/// Cause of a failed provisioning run
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Authentication failed: {0}")]
    Authentication(#[source] DaemonError),

    #[error("Tunnel creation failed: {0}")]
    TunnelCreation(#[source] DaemonError),

    #[error(
        "Tunnel {tunnel_id} already exists but its credentials are missing at {}",
        .path.display()
    )]
    MissingCredentials { tunnel_id: String, path: PathBuf },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to launch tunnel: {0}")]
    TunnelLaunch(#[source] DaemonError),

    #[error("DNS routing failed: {0}")]
    DnsRouting(#[source] DaemonError),
}

impl ProvisionError {
    /// Whether the daemon reported success but printed no tunnel ID.
    pub fn is_identifier_extraction(&self) -> bool {
        matches!(
            self,
            Self::TunnelCreation(DaemonError::IdentifierNotFound { .. })
        )
    }
}

/// A provisioning run that stopped at `stage`
#[derive(Error, Debug)]
#[error("{stage} failed: {cause}")]
pub struct ProvisionFailure {
    pub stage: Stage,
    #[source]
    pub cause: ProvisionError,
}
