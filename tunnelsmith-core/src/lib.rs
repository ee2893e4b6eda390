//! tunnelsmith-core: provisioning for cloudflared tunnels
//!
//! This crate holds everything between the command line and the daemon:
//!
//! - **Validation** - [`OperationRequest`] checks port, domain and tunnel name
//! - **Daemon invocation** - [`TunnelDaemon`] and its [`Cloudflared`] implementation
//! - **Ingress config** - [`IngressStore`] merges rules into `config.yaml`
//! - **Provisioning** - [`Provisioner`] runs the stages in order
//!
//! # Quick Start
//!
//! ```no_run
//! use tunnelsmith_core::{Cloudflared, OperationRequest, Provisioner};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let daemon = Cloudflared::locate("cloudflared")?;
//!     let mut provisioner = Provisioner::new(daemon);
//!
//!     let report = provisioner
//!         .run(OperationRequest {
//!             port: "8080".to_string(),
//!             domain: "app.example.com".to_string(),
//!             tunnel_name: "home".to_string(),
//!             config_dir: None,
//!         })
//!         .await?;
//!     println!("Tunnel {} routes {}", report.tunnel_id, report.domain);
//!     Ok(())
//! }
//! ```
//!
//! # Stages
//!
//! ```text
//! Start -> Validated -> Authenticated -> TunnelCreated
//!       -> ConfigMerged -> TunnelRunning -> DnsRouted -> Done
//! ```
//!
//! Any failure ends in `Failed { stage }`. Completed stages are not undone.

pub mod daemon;
pub mod error;
pub mod ingress;
pub mod provision;
pub mod request;

// Re-export key types for convenience
pub use daemon::{
    Cloudflared, CommandOutput, DaemonCall, LaunchedTunnel, MockDaemon, TunnelDaemon,
    parse_tunnel_id,
};
pub use error::{ConfigError, DaemonError, ProvisionError, ProvisionFailure, ValidationError};
pub use ingress::{
    IngressDocument, IngressRule, IngressStore, MergeOutcome, SkipReason, TunnelRecord,
};
pub use provision::{ProvisionReport, ProvisionState, Provisioner, Stage};
pub use request::{OperationRequest, ValidatedRequest};
