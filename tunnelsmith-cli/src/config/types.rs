use serde::Deserialize;
use std::path::PathBuf;

/// Settings as stored in TOML (optional fields so defaults apply per key)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSettings {
    #[serde(default)]
    pub daemon: RawDaemonSettings,

    #[serde(default)]
    pub ingress: IngressSettings,

    #[serde(default)]
    pub log: RawLogSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawDaemonSettings {
    /// Name or path of the cloudflared binary
    pub binary: Option<PathBuf>,

    /// Origin certificate written by `cloudflared tunnel login`
    pub origin_cert: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawLogSettings {
    pub dir: Option<PathBuf>,
    pub level: Option<String>,
}

/// Final settings with defaults applied
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub daemon: DaemonSettings,
    pub ingress: IngressSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone)]
pub struct DaemonSettings {
    pub binary: PathBuf,
    pub origin_cert: PathBuf,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_DAEMON_BINARY),
            origin_cert: tunnelsmith_paths::origin_cert_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct IngressSettings {
    /// Directory holding `config.yaml`; `None` means the built-in default
    pub config_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub dir: PathBuf,
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            dir: tunnelsmith_paths::log_dir(),
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

pub const DEFAULT_DAEMON_BINARY: &str = "cloudflared";

pub const DEFAULT_LOG_LEVEL: &str = "info";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.daemon.binary, PathBuf::from("cloudflared"));
        assert!(settings.daemon.origin_cert.ends_with(".cloudflared/cert.pem"));
        assert!(settings.ingress.config_dir.is_none());
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_str = r#"
[daemon]
binary = "/opt/cloudflared/bin/cloudflared"
"#;
        let raw: RawSettings = toml::from_str(toml_str).unwrap();
        assert_eq!(
            raw.daemon.binary,
            Some(PathBuf::from("/opt/cloudflared/bin/cloudflared"))
        );
        assert!(raw.daemon.origin_cert.is_none());
        assert!(raw.ingress.config_dir.is_none());
        assert!(raw.log.level.is_none());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[daemon]
binary = "cloudflared"
origin_cert = "/home/me/.cloudflared/cert.pem"

[ingress]
config_dir = "/etc/cloudflared"

[log]
dir = "/var/log/tunnelsmith"
level = "debug"
"#;
        let raw: RawSettings = toml::from_str(toml_str).unwrap();
        assert_eq!(
            raw.ingress.config_dir,
            Some(PathBuf::from("/etc/cloudflared"))
        );
        assert_eq!(raw.log.dir, Some(PathBuf::from("/var/log/tunnelsmith")));
        assert_eq!(raw.log.level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_parse_empty_toml() {
        let raw: RawSettings = toml::from_str("").unwrap();
        assert!(raw.daemon.binary.is_none());
        assert!(raw.log.dir.is_none());
    }
}
