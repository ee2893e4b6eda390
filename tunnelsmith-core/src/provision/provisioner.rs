//! Provisioner: validate, authenticate, create, merge, run, route

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::state::{ProvisionState, Stage};
use crate::daemon::{LaunchedTunnel, TunnelDaemon};
use crate::error::{ProvisionError, ProvisionFailure};
use crate::ingress::{IngressStore, MergeOutcome};
use crate::request::{OperationRequest, ValidatedRequest};

/// Summary of a successful provisioning run
#[derive(Debug)]
pub struct ProvisionReport {
    pub tunnel_id: String,
    /// The tunnel already existed and was not created by this run
    pub tunnel_reused: bool,
    pub domain: String,
    pub port: u16,
    pub config_path: PathBuf,
    pub merge: MergeOutcome,
    /// Background tunnel process, still running
    pub launched: LaunchedTunnel,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Drives one provisioning run against a tunnel daemon
///
/// Stages run strictly in order and the first failure ends the run.
pub struct Provisioner<D> {
    daemon: D,
    state: ProvisionState,
    history: Vec<ProvisionState>,
}

impl<D: TunnelDaemon> Provisioner<D> {
    pub fn new(daemon: D) -> Self {
        Self {
            daemon,
            state: ProvisionState::Start,
            history: vec![ProvisionState::Start],
        }
    }

    pub fn state(&self) -> &ProvisionState {
        &self.state
    }

    /// Every state entered so far, starting with `Start`.
    pub fn history(&self) -> &[ProvisionState] {
        &self.history
    }

    pub fn daemon(&self) -> &D {
        &self.daemon
    }

    /// Run every stage for `request`.
    pub async fn run(
        &mut self,
        request: OperationRequest,
    ) -> Result<ProvisionReport, ProvisionFailure> {
        let request = request
            .validate()
            .map_err(|e| self.fail(Stage::Validate, e.into()))?;
        self.run_validated(request).await
    }

    /// Run every stage after validation for an already validated request.
    pub async fn run_validated(
        &mut self,
        request: ValidatedRequest,
    ) -> Result<ProvisionReport, ProvisionFailure> {
        let started_at = Utc::now();
        self.advance(ProvisionState::Validated);

        let authenticated = self.daemon.ensure_authenticated().await;
        authenticated
            .map_err(|e| self.fail(Stage::Authenticate, ProvisionError::Authentication(e)))?;
        self.advance(ProvisionState::Authenticated);

        let store = IngressStore::new(&request.config_dir);
        let (tunnel_id, reused) = self.obtain_tunnel(&request.tunnel_name, &store).await?;
        self.advance(ProvisionState::TunnelCreated {
            tunnel_id: tunnel_id.clone(),
            reused,
        });

        // Blocks on the config lock while another run holds it
        let merge = store
            .merge_ingress_rule(&tunnel_id, &request.domain, request.port)
            .map_err(|e| self.fail(Stage::MergeConfig, e.into()))?;
        match merge {
            MergeOutcome::Merged => {}
            MergeOutcome::Skipped(reason) => {
                warn!("Config left unchanged: {}", reason);
            }
        }
        self.advance(ProvisionState::ConfigMerged { outcome: merge });

        let config_path = store.config_path();
        let launched = self
            .daemon
            .run_tunnel_background(&tunnel_id, &config_path)
            .await;
        let launched =
            launched.map_err(|e| self.fail(Stage::RunTunnel, ProvisionError::TunnelLaunch(e)))?;
        info!("Tunnel {} running (pid {:?})", tunnel_id, launched.pid);
        self.advance(ProvisionState::TunnelRunning { pid: launched.pid });

        let routed = self.daemon.route_dns(&tunnel_id, &request.domain).await;
        routed.map_err(|e| self.fail(Stage::RouteDns, ProvisionError::DnsRouting(e)))?;
        info!("Routed {} to tunnel {}", request.domain, tunnel_id);
        self.advance(ProvisionState::DnsRouted);

        self.advance(ProvisionState::Done);
        Ok(ProvisionReport {
            tunnel_id,
            tunnel_reused: reused,
            domain: request.domain,
            port: request.port,
            config_path,
            merge,
            launched,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Reuse a tunnel with this name, or create one.
    async fn obtain_tunnel(
        &mut self,
        name: &str,
        store: &IngressStore,
    ) -> Result<(String, bool), ProvisionFailure> {
        let existing = self.daemon.find_tunnel(name).await;
        let existing = existing
            .map_err(|e| self.fail(Stage::CreateTunnel, ProvisionError::TunnelCreation(e)))?;

        if let Some(tunnel_id) = existing {
            // The config entry points at these credentials; without them
            // `tunnel run` fails after this run has reported success
            let credentials = store.credentials_path(&tunnel_id);
            if !credentials.exists() {
                return Err(self.fail(
                    Stage::CreateTunnel,
                    ProvisionError::MissingCredentials {
                        tunnel_id,
                        path: credentials,
                    },
                ));
            }
            info!("Reusing existing tunnel '{}' ({})", name, tunnel_id);
            return Ok((tunnel_id, true));
        }

        // The ID is only known after creation, so credentials land under a
        // pending name and are moved to `<id>.json` afterwards
        let pending = store.pending_credentials_path(name);
        let created = self.daemon.create_tunnel(name, &pending).await;
        let tunnel_id = created
            .map_err(|e| self.fail(Stage::CreateTunnel, ProvisionError::TunnelCreation(e)))?;
        info!("Created tunnel '{}' with ID {}", name, tunnel_id);

        store
            .adopt_credentials(name, &tunnel_id)
            .map_err(|e| self.fail(Stage::CreateTunnel, e.into()))?;
        Ok((tunnel_id, false))
    }

    fn advance(&mut self, next: ProvisionState) {
        debug!("Provision state: {:?} -> {:?}", self.state, next);
        self.state = next.clone();
        self.history.push(next);
    }

    fn fail(&mut self, stage: Stage, cause: ProvisionError) -> ProvisionFailure {
        error!("Stage {} failed: {}", stage, cause);
        self.advance(ProvisionState::Failed { stage });
        ProvisionFailure { stage, cause }
    }
}
