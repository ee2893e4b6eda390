//! Backup-protected merging into the shared config file

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::document::{IngressDocument, TunnelRecord, credentials_file};
use crate::error::ConfigError;

pub const CONFIG_FILE: &str = "config.yaml";
pub const BACKUP_FILE: &str = "config.yaml.bak";
pub const LOCK_FILE: &str = "config.yaml.lock";

/// Why a merge left the file untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    DuplicateTunnel,
    DuplicateDomain,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateTunnel => write!(f, "tunnel already configured"),
            Self::DuplicateDomain => write!(f, "hostname already routed"),
        }
    }
}

/// Result of [`IngressStore::merge_ingress_rule`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged,
    Skipped(SkipReason),
}

/// The `config.yaml` in one config directory
#[derive(Debug, Clone)]
pub struct IngressStore {
    config_dir: PathBuf,
}

impl IngressStore {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.config_dir.join(BACKUP_FILE)
    }

    pub fn credentials_path(&self, tunnel_id: &str) -> PathBuf {
        credentials_file(&self.config_dir, tunnel_id)
    }

    /// Where the daemon writes credentials for `tunnel_name` before its ID is known.
    pub fn pending_credentials_path(&self, tunnel_name: &str) -> PathBuf {
        let safe: String = tunnel_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.config_dir.join(format!("{safe}.pending.json"))
    }

    /// Move pending credentials to `<tunnel_id>.json`.
    ///
    /// Returns `None` when the daemon wrote no pending file.
    pub fn adopt_credentials(
        &self,
        tunnel_name: &str,
        tunnel_id: &str,
    ) -> Result<Option<PathBuf>, ConfigError> {
        let pending = self.pending_credentials_path(tunnel_name);
        if !pending.exists() {
            debug!("No pending credentials at {}", pending.display());
            return Ok(None);
        }

        let target = self.credentials_path(tunnel_id);
        fs::rename(&pending, &target).map_err(ConfigError::io("move credentials", &pending))?;
        debug!("Credentials stored at {}", target.display());
        Ok(Some(target))
    }

    /// Parse the current file (empty document if it does not exist).
    pub fn load(&self) -> Result<IngressDocument, ConfigError> {
        Ok(IngressDocument::parse(&read_or_empty(&self.config_path())?))
    }

    /// Add a record routing `domain` to `localhost:<port>` through `tunnel_id`.
    ///
    /// The existing file is backed up first, even when the merge is skipped.
    /// Holds an exclusive lock on [`LOCK_FILE`] from backup to write.
    pub fn merge_ingress_rule(
        &self,
        tunnel_id: &str,
        domain: &str,
        port: u16,
    ) -> Result<MergeOutcome, ConfigError> {
        let _lock = self.lock()?;
        let path = self.config_path();

        if path.exists() {
            let backup = self.backup_path();
            fs::copy(&path, &backup).map_err(ConfigError::io("back up", &path))?;
            debug!("Backed up {} to {}", path.display(), backup.display());
        }

        let existing = read_or_empty(&path)?;
        let document = IngressDocument::parse(&existing);

        if document.contains_tunnel(tunnel_id) {
            info!("Tunnel {} already in {}, skipping", tunnel_id, path.display());
            return Ok(MergeOutcome::Skipped(SkipReason::DuplicateTunnel));
        }
        if document.contains_hostname(domain) {
            warn!("Hostname {} already routed in {}, skipping", domain, path.display());
            return Ok(MergeOutcome::Skipped(SkipReason::DuplicateDomain));
        }

        let block = TunnelRecord::new(tunnel_id, &self.config_dir, domain, port).render();
        let content = if document.has_tunnel_key() {
            debug!("Appending tunnel {} to existing config", tunnel_id);
            append_block(&existing, &block)
        } else {
            if !existing.trim().is_empty() {
                warn!(
                    "{} has no tunnel entry; replacing it (previous content kept in {})",
                    path.display(),
                    BACKUP_FILE
                );
            }
            block
        };

        self.write_atomic(&path, &content)?;
        info!("Merged {} -> localhost:{} into {}", domain, port, path.display());
        Ok(MergeOutcome::Merged)
    }

    fn lock(&self) -> Result<File, ConfigError> {
        let path = self.config_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(ConfigError::io("open", &path))?;
        // Released when the file is closed
        file.lock().map_err(ConfigError::io("lock", &path))?;
        Ok(file)
    }

    /// Write through a temp file in the same directory, then rename over `path`.
    fn write_atomic(&self, path: &Path, content: &str) -> Result<(), ConfigError> {
        let mut temp = NamedTempFile::new_in(&self.config_dir)
            .map_err(ConfigError::io("create temp file in", &self.config_dir))?;
        temp.write_all(content.as_bytes())
            .map_err(ConfigError::io("write", temp.path()))?;
        temp.as_file()
            .sync_all()
            .map_err(ConfigError::io("sync", temp.path()))?;

        if let Ok(metadata) = fs::metadata(path) {
            temp.as_file()
                .set_permissions(metadata.permissions())
                .map_err(ConfigError::io("set permissions on", temp.path()))?;
        }

        temp.persist(path).map_err(|e| ConfigError::Io {
            op: "replace",
            path: path.to_path_buf(),
            source: e.error,
        })?;
        Ok(())
    }
}

fn read_or_empty(path: &Path) -> Result<String, ConfigError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(ConfigError::io("read", path)(e)),
    }
}

/// Existing bytes, then a blank line, then the new block.
fn append_block(existing: &str, block: &str) -> String {
    let mut content = String::with_capacity(existing.len() + block.len() + 2);
    content.push_str(existing);
    if !existing.ends_with('\n') {
        content.push('\n');
    }
    content.push('\n');
    content.push_str(block);
    content
}
