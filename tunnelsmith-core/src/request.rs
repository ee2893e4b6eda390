//! Operation request validation

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ValidationError;

/// A provisioning request as given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRequest {
    /// Raw port text; parsed during validation
    pub port: String,
    /// Public hostname to route to the tunnel
    pub domain: String,
    /// Name of the tunnel to create or reuse
    pub tunnel_name: String,
    /// Directory holding `config.yaml` (platform default when `None`)
    pub config_dir: Option<PathBuf>,
}

/// A request that passed validation; its config directory exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub port: u16,
    pub domain: String,
    pub tunnel_name: String,
    pub config_dir: PathBuf,
}

impl OperationRequest {
    /// Validate against the default ingress directory.
    pub fn validate(self) -> Result<ValidatedRequest, ValidationError> {
        self.validate_with_default(&tunnelsmith_paths::ingress_dir())
    }

    /// Validate, falling back to `default_dir` when no config directory was given.
    ///
    /// Creates the config directory if it does not exist.
    pub fn validate_with_default(
        self,
        default_dir: &Path,
    ) -> Result<ValidatedRequest, ValidationError> {
        let port = parse_port(&self.port)?;
        validate_domain(&self.domain)?;

        if self.tunnel_name.trim().is_empty() {
            return Err(ValidationError::MissingTunnelName);
        }

        let config_dir = match self.config_dir {
            Some(dir) if dir.as_os_str().is_empty() => {
                return Err(ValidationError::MissingConfigDir);
            }
            Some(dir) => dir,
            None => default_dir.to_path_buf(),
        };

        std::fs::create_dir_all(&config_dir).map_err(|source| ValidationError::ConfigDir {
            path: config_dir.clone(),
            source,
        })?;
        debug!("Using config directory {}", config_dir.display());

        Ok(ValidatedRequest {
            port,
            domain: self.domain,
            tunnel_name: self.tunnel_name,
            config_dir,
        })
    }
}

/// Parse a port written as a plain base-10 integer in `1..=65535`.
pub fn parse_port(raw: &str) -> Result<u16, ValidationError> {
    let invalid = || ValidationError::InvalidPort(raw.to_string());

    // `u16::from_str` accepts a leading '+', so check the digits first
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    match raw.parse::<u16>() {
        Ok(0) | Err(_) => Err(invalid()),
        Ok(port) => Ok(port),
    }
}

/// Check that a domain only uses `[A-Za-z0-9.-]`.
///
/// No DNS syntax checks beyond the character set.
pub fn validate_domain(domain: &str) -> Result<(), ValidationError> {
    let valid = !domain.is_empty()
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidDomain(domain.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(port: &str, domain: &str, name: &str) -> OperationRequest {
        OperationRequest {
            port: port.to_string(),
            domain: domain.to_string(),
            tunnel_name: name.to_string(),
            config_dir: None,
        }
    }

    #[test]
    fn parse_port_accepts_range_bounds() {
        assert_eq!(parse_port("1").unwrap(), 1);
        assert_eq!(parse_port("8080").unwrap(), 8080);
        assert_eq!(parse_port("65535").unwrap(), 65535);
    }

    #[test]
    fn parse_port_rejects_out_of_range() {
        assert!(parse_port("0").is_err());
        assert!(parse_port("65536").is_err());
        assert!(parse_port("99999999999999999999").is_err());
    }

    #[test]
    fn parse_port_rejects_non_plain_integers() {
        for raw in ["", "+80", "-80", "80.0", " 80", "80 ", "0x50", "eighty"] {
            assert!(
                matches!(parse_port(raw), Err(ValidationError::InvalidPort(_))),
                "port {raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn validate_domain_accepts_charset() {
        assert!(validate_domain("app.example.com").is_ok());
        assert!(validate_domain("my-app.dev").is_ok());
        assert!(validate_domain("localhost").is_ok());
        // charset only, no DNS syntax checks
        assert!(validate_domain(".-.").is_ok());
    }

    #[test]
    fn validate_domain_rejects_other_characters() {
        for domain in ["", "app_1.example.com", "app example.com", "app.com/path", "тест.com"] {
            assert!(
                matches!(
                    validate_domain(domain),
                    Err(ValidationError::InvalidDomain(_))
                ),
                "domain {domain:?} should be rejected"
            );
        }
    }

    #[test]
    fn validate_uses_default_dir_and_creates_it() {
        let temp_dir = TempDir::new().unwrap();
        let default_dir = temp_dir.path().join("nested").join("cloudflared");

        let validated = request("8080", "app.example.com", "home")
            .validate_with_default(&default_dir)
            .unwrap();

        assert_eq!(validated.port, 8080);
        assert_eq!(validated.config_dir, default_dir);
        assert!(default_dir.is_dir());
    }

    #[test]
    fn validate_is_idempotent_for_existing_dir() {
        let temp_dir = TempDir::new().unwrap();
        let mut req = request("443", "app.example.com", "home");
        req.config_dir = Some(temp_dir.path().to_path_buf());

        let first = req.clone().validate_with_default(Path::new("/unused")).unwrap();
        let second = req.validate_with_default(Path::new("/unused")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn validate_rejects_blank_tunnel_name() {
        let temp_dir = TempDir::new().unwrap();
        let result = request("8080", "app.example.com", "  ").validate_with_default(temp_dir.path());
        assert!(matches!(result, Err(ValidationError::MissingTunnelName)));
    }

    #[test]
    fn validate_rejects_empty_config_dir() {
        let mut req = request("8080", "app.example.com", "home");
        req.config_dir = Some(PathBuf::new());
        let result = req.validate_with_default(Path::new("/unused"));
        assert!(matches!(result, Err(ValidationError::MissingConfigDir)));
    }

    #[test]
    fn validate_fails_before_touching_disk_on_bad_port() {
        let temp_dir = TempDir::new().unwrap();
        let default_dir = temp_dir.path().join("never-created");

        let result = request("0", "app.example.com", "home").validate_with_default(&default_dir);

        assert!(matches!(result, Err(ValidationError::InvalidPort(_))));
        assert!(!default_dir.exists());
    }
}
