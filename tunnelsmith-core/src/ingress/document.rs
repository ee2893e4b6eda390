//! Typed view of a cloudflared `config.yaml`
//!
//! The file is a flat list of top-level keys where each `tunnel:` key starts a
//! new record and the following `ingress:` list belongs to it. Parsing is
//! line-based and tolerant: comments, blank lines and keys it does not know
//! are skipped. The parsed view is only used for lookups; writes append text.

use std::path::{Path, PathBuf};

/// Service answering requests that match no hostname.
pub const CATCH_ALL_SERVICE: &str = "http_status:404";

/// One hostname-to-service mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    /// `None` for the catch-all rule
    pub hostname: Option<String>,
    pub service: String,
}

impl IngressRule {
    pub fn catch_all() -> Self {
        Self {
            hostname: None,
            service: CATCH_ALL_SERVICE.to_string(),
        }
    }

    pub fn is_catch_all(&self) -> bool {
        self.hostname.is_none()
    }
}

/// A tunnel and its ingress rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelRecord {
    pub tunnel_id: String,
    pub credentials_path: Option<String>,
    pub ingress: Vec<IngressRule>,
}

impl TunnelRecord {
    /// Record routing `domain` to a local port, followed by the catch-all.
    pub fn new(tunnel_id: &str, config_dir: &Path, domain: &str, port: u16) -> Self {
        let credentials = credentials_file(config_dir, tunnel_id);
        Self {
            tunnel_id: tunnel_id.to_string(),
            credentials_path: Some(credentials.to_string_lossy().into_owned()),
            ingress: vec![
                IngressRule {
                    hostname: Some(domain.to_string()),
                    service: format!("http://localhost:{port}"),
                },
                IngressRule::catch_all(),
            ],
        }
    }

    pub fn ends_with_catch_all(&self) -> bool {
        self.ingress.last().is_some_and(IngressRule::is_catch_all)
    }

    /// Render as a config block, newline-terminated.
    pub fn render(&self) -> String {
        let mut block = format!("tunnel: {}\n", self.tunnel_id);
        if let Some(credentials) = &self.credentials_path {
            block.push_str(&format!("credentials-file: {credentials}\n"));
        }
        block.push_str("\ningress:\n");
        for rule in &self.ingress {
            match &rule.hostname {
                Some(hostname) => {
                    block.push_str(&format!("  - hostname: {hostname}\n"));
                    block.push_str(&format!("    service: {}\n", rule.service));
                }
                None => block.push_str(&format!("  - service: {}\n", rule.service)),
            }
        }
        block
    }
}

/// Path of a tunnel's credentials file inside the config directory.
pub fn credentials_file(config_dir: &Path, tunnel_id: &str) -> PathBuf {
    config_dir.join(format!("{tunnel_id}.json"))
}

/// Records found in a config file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngressDocument {
    pub records: Vec<TunnelRecord>,
    /// Ingress rules that appear before any `tunnel:` key
    pub untracked_rules: Vec<IngressRule>,
}

impl IngressDocument {
    pub fn parse(text: &str) -> Self {
        let mut document = Self::default();
        let mut in_ingress = false;
        // Editors on Windows may save with a byte order mark
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        for raw in text.lines() {
            let Some(line) = significant(raw) else {
                continue;
            };
            let indent = line.len() - line.trim_start().len();
            let mut content = line.trim();

            let item = content.starts_with('-');
            if item {
                content = content[1..].trim_start();
            }

            let Some((key, value)) = content.split_once(':') else {
                continue;
            };
            let key = key.trim();
            let value = unquote(value.trim());

            if indent == 0 && !item {
                in_ingress = key == "ingress";
                match key {
                    "tunnel" if !value.is_empty() => document.records.push(TunnelRecord {
                        tunnel_id: value.to_string(),
                        credentials_path: None,
                        ingress: Vec::new(),
                    }),
                    "credentials-file" => {
                        if let Some(record) = document.records.last_mut() {
                            record.credentials_path = Some(value.to_string());
                        }
                    }
                    _ => {}
                }
                continue;
            }

            if !in_ingress {
                continue;
            }

            let rules = match document.records.last_mut() {
                Some(record) => &mut record.ingress,
                None => &mut document.untracked_rules,
            };
            match (key, item) {
                ("hostname", true) => rules.push(IngressRule {
                    hostname: Some(value.to_string()),
                    service: String::new(),
                }),
                ("service", true) => rules.push(IngressRule {
                    hostname: None,
                    service: value.to_string(),
                }),
                ("hostname", false) => {
                    if let Some(rule) = rules.last_mut() {
                        rule.hostname = Some(value.to_string());
                    }
                }
                ("service", false) => {
                    if let Some(rule) = rules.last_mut() {
                        rule.service = value.to_string();
                    }
                }
                _ => {}
            }
        }

        document
    }

    /// Whether any top-level `tunnel:` key is present.
    pub fn has_tunnel_key(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn contains_tunnel(&self, tunnel_id: &str) -> bool {
        self.records.iter().any(|r| r.tunnel_id == tunnel_id)
    }

    pub fn contains_hostname(&self, hostname: &str) -> bool {
        self.hostnames().any(|h| h == hostname)
    }

    pub fn hostnames(&self) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .flat_map(|r| r.ingress.iter())
            .chain(self.untracked_rules.iter())
            .filter_map(|rule| rule.hostname.as_deref())
    }
}

/// Strip comments; `None` for blank and comment-only lines.
fn significant(line: &str) -> Option<&str> {
    let line = match line.find(" #") {
        Some(idx) => &line[..idx],
        None => line,
    };
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed == "---" {
        None
    } else {
        Some(line.trim_end())
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
