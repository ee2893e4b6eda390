//! Provisioning state machine

mod provisioner;
mod state;

pub use provisioner::{ProvisionReport, Provisioner};
pub use state::{ProvisionState, Stage};
