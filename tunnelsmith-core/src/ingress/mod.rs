//! Shared ingress configuration (`config.yaml`)

mod document;
mod store;

pub use document::{
    CATCH_ALL_SERVICE, IngressDocument, IngressRule, TunnelRecord, credentials_file,
};
pub use store::{BACKUP_FILE, CONFIG_FILE, IngressStore, LOCK_FILE, MergeOutcome, SkipReason};
