use super::types::{
    DaemonSettings, LogSettings, RawSettings, Settings, DEFAULT_DAEMON_BINARY, DEFAULT_LOG_LEVEL,
};
use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load settings from `explicit` if given, otherwise from the default path
    ///
    /// An explicit file must exist. A missing default file means built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Settings> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    bail!("Settings file not found: {}", path.display());
                }
                Self::load_from(path)
            }
            None => {
                let path = Self::settings_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Settings::default())
                }
            }
        }
    }

    /// Get the default settings path
    /// Can be overridden with TUNNELSMITH_SETTINGS env var (useful for isolated e2e tests)
    pub fn settings_path() -> PathBuf {
        if let Ok(path) = std::env::var("TUNNELSMITH_SETTINGS") {
            PathBuf::from(path)
        } else {
            tunnelsmith_paths::config_dir().join("config.toml")
        }
    }

    fn load_from(path: &Path) -> Result<Settings> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let raw: RawSettings = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
        Ok(Self::finalize(raw))
    }

    /// Convert raw settings to final settings with defaults applied
    fn finalize(raw: RawSettings) -> Settings {
        Settings {
            daemon: DaemonSettings {
                binary: raw
                    .daemon
                    .binary
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DAEMON_BINARY)),
                origin_cert: raw
                    .daemon
                    .origin_cert
                    .unwrap_or_else(tunnelsmith_paths::origin_cert_path),
            },
            ingress: raw.ingress,
            log: LogSettings {
                dir: raw.log.dir.unwrap_or_else(tunnelsmith_paths::log_dir),
                level: raw
                    .log
                    .level
                    .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            },
        }
    }
}
