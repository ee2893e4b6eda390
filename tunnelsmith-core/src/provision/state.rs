//! Provisioning states and stages

use std::fmt;

use crate::ingress::MergeOutcome;

/// A step of the provisioning sequence, named when it fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validate,
    Authenticate,
    CreateTunnel,
    MergeConfig,
    RunTunnel,
    RouteDns,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Authenticate => "authenticate",
            Self::CreateTunnel => "create-tunnel",
            Self::MergeConfig => "merge-config",
            Self::RunTunnel => "run-tunnel",
            Self::RouteDns => "route-dns",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a provisioning run is
///
/// Runs move strictly forward through these states; any failure moves to
/// `Failed` and nothing already done is undone.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProvisionState {
    #[default]
    Start,
    Validated,
    Authenticated,
    TunnelCreated {
        tunnel_id: String,
        reused: bool,
    },
    ConfigMerged {
        outcome: MergeOutcome,
    },
    TunnelRunning {
        pid: Option<u32>,
    },
    DnsRouted,
    Done,
    Failed {
        stage: Stage,
    },
}

impl ProvisionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }
}
