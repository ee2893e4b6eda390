//! Default directories for tunnelsmith.
//!
//! The ingress directory follows cloudflared's own convention (`~/.cloudflared`),
//! since the daemon looks there for `config.yaml` and credentials. The tool's
//! own settings and logs use XDG paths, like gh, docker and kubectl.

use std::path::PathBuf;

/// Get the default ingress configuration directory.
///
/// Returns `$TUNNELSMITH_INGRESS_DIR` if set, otherwise `~/.cloudflared`.
/// This is where `config.yaml`, its backup and tunnel credentials live.
///
/// # Examples
///
/// ```
/// use tunnelsmith_paths::ingress_dir;
///
/// let config_file = ingress_dir().join("config.yaml");
/// ```
pub fn ingress_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TUNNELSMITH_INGRESS_DIR") {
        PathBuf::from(dir)
    } else if let Some(home) = dirs::home_dir() {
        home.join(".cloudflared")
    } else {
        PathBuf::from(".cloudflared")
    }
}

/// Get the tunnelsmith config directory.
///
/// Returns `$XDG_CONFIG_HOME/tunnelsmith` if set, otherwise `~/.config/tunnelsmith`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join("tunnelsmith")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config/tunnelsmith")
    } else {
        PathBuf::from(".config/tunnelsmith")
    }
}

/// Get the tunnelsmith data directory.
///
/// Returns `$XDG_DATA_HOME/tunnelsmith` if set, otherwise `~/.local/share/tunnelsmith`.
pub fn data_dir() -> PathBuf {
    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data).join("tunnelsmith")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".local/share/tunnelsmith")
    } else {
        PathBuf::from(".local/share/tunnelsmith")
    }
}

/// Directory for the run log and the daemon's output logs.
pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Default location of the daemon's origin certificate (`~/.cloudflared/cert.pem`).
///
/// Independent of `TUNNELSMITH_INGRESS_DIR`: `cloudflared tunnel login` always
/// writes it under the user's home.
pub fn origin_cert_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/"))
        .join(".cloudflared")
        .join("cert.pem")
}
