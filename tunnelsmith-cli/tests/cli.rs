//! End-to-end tests that drive the built `tunnelsmith` binary.
//!
//! Each test isolates the binary's settings and log directories in a temp dir.
//! Tests run serially so no child is forked while the fake daemon script is
//! still open for writing.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serial_test::serial;
use tempfile::TempDir;

fn tunnelsmith(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tunnelsmith"));
    cmd.env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env("TUNNELSMITH_SETTINGS", home.join("config/none.toml"))
        .env_remove("RUST_LOG");
    cmd
}

fn default_run_log(home: &Path) -> PathBuf {
    home.join("data/tunnelsmith/logs/tunnelsmith.log")
}

fn combined(output: &Output) -> String {
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

#[test]
#[serial]
fn help_exits_zero_and_lists_flags() {
    let home = TempDir::new().unwrap();
    let output = tunnelsmith(home.path()).arg("-h").output().unwrap();

    assert!(output.status.success());
    let help = String::from_utf8_lossy(&output.stdout);
    for flag in ["--port", "--domain", "--name", "--config-dir"] {
        assert!(help.contains(flag), "help is missing {flag}: {help}");
    }
}

#[test]
#[serial]
fn missing_flags_exit_one_and_reach_run_log() {
    let home = TempDir::new().unwrap();
    let output = tunnelsmith(home.path())
        .args(["-p", "8080"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
    let run_log = std::fs::read_to_string(default_run_log(home.path())).unwrap();
    assert!(run_log.contains("Invalid arguments"), "{run_log}");
}

#[test]
#[serial]
fn version_exits_zero() {
    let home = TempDir::new().unwrap();
    let output = tunnelsmith(home.path()).arg("-V").output().unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("tunnelsmith"));
}

#[test]
#[serial]
fn invalid_port_exits_one_without_touching_config() {
    let home = TempDir::new().unwrap();
    let config_dir = home.path().join("ingress");
    let output = tunnelsmith(home.path())
        .args(["-p", "70000", "-d", "app.example.com", "-n", "home"])
        .arg("-c")
        .arg(&config_dir)
        .args(["--daemon", "/nonexistent/cloudflared"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(combined(&output).contains("Invalid port"));
    assert!(!config_dir.join("config.yaml").exists());
}

#[test]
#[serial]
fn invalid_domain_exits_one() {
    let home = TempDir::new().unwrap();
    let output = tunnelsmith(home.path())
        .args(["-p", "8080", "-d", "app_example.com", "-n", "home"])
        .arg("-c")
        .arg(home.path().join("ingress"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(combined(&output).contains("Invalid domain"));
}

#[test]
#[serial]
fn missing_daemon_exits_one() {
    let home = TempDir::new().unwrap();
    let output = tunnelsmith(home.path())
        .args(["-p", "8080", "-d", "app.example.com", "-n", "home"])
        .arg("-c")
        .arg(home.path().join("ingress"))
        .args(["--daemon", "/nonexistent/cloudflared"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(combined(&output).contains("not installed"));
}

#[test]
#[serial]
fn malformed_settings_file_fails() {
    let home = TempDir::new().unwrap();
    let settings = home.path().join("bad.toml");
    std::fs::write(&settings, "[log\n").unwrap();

    let output = tunnelsmith(home.path())
        .args(["-p", "8080", "-d", "app.example.com", "-n", "home"])
        .arg("--settings")
        .arg(&settings)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(combined(&output).contains("Failed to parse settings file"));
    let run_log = std::fs::read_to_string(default_run_log(home.path())).unwrap();
    assert!(run_log.contains("Failed to parse settings file"), "{run_log}");
}

#[test]
#[serial]
fn missing_settings_file_is_logged() {
    let home = TempDir::new().unwrap();
    let output = tunnelsmith(home.path())
        .args(["-p", "8080", "-d", "app.example.com", "-n", "home"])
        .arg("--settings")
        .arg(home.path().join("absent.toml"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let run_log = std::fs::read_to_string(default_run_log(home.path())).unwrap();
    assert!(run_log.contains("Settings file not found"), "{run_log}");
}

#[cfg(unix)]
mod with_fake_daemon {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::time::{Duration, Instant};

    // Answers the subcommands tunnelsmith issues, logging each invocation.
    const FAKE_DAEMON: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/calls.log"
case "$*" in
  --version) echo "cloudflared version 2024.1.0 (built 2024-01-01)" ;;
  "tunnel login") exit 0 ;;
  "tunnel list --output json") echo "null" ;;
  "tunnel create"*)
    echo '{"TunnelID":"fake-0001"}' > "$4"
    echo "Created tunnel $5 with id fake-0001"
    ;;
  *"tunnel run"*) [ -n "$FAKE_RUN_SECONDS" ] && exec sleep "$FAKE_RUN_SECONDS"; exit 0 ;;
  "tunnel route dns"*) [ -n "$FAKE_ROUTE_FAIL" ] && exit 4; exit 0 ;;
  *) exit 9 ;;
esac
"#;

    struct Fixture {
        home: TempDir,
        daemon: PathBuf,
        config_dir: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let home = TempDir::new().unwrap();
            let bin_dir = home.path().join("bin");
            std::fs::create_dir_all(&bin_dir).unwrap();
            let daemon = bin_dir.join("cloudflared");
            std::fs::write(&daemon, FAKE_DAEMON).unwrap();
            std::fs::set_permissions(&daemon, std::fs::Permissions::from_mode(0o755)).unwrap();

            let settings = home.path().join("settings.toml");
            std::fs::write(
                &settings,
                format!(
                    "[daemon]\norigin_cert = \"{}\"\n\n[log]\ndir = \"{}\"\n",
                    home.path().join("no-cert.pem").display(),
                    home.path().join("logs").display()
                ),
            )
            .unwrap();

            let config_dir = home.path().join("ingress");
            Self {
                home,
                daemon,
                config_dir,
            }
        }

        fn provision(&self, domain: &str) -> Command {
            let mut cmd = tunnelsmith(self.home.path());
            cmd.env("TUNNELSMITH_SETTINGS", self.home.path().join("settings.toml"))
                .args(["-p", "8080", "-d", domain, "-n", "home"])
                .arg("-c")
                .arg(&self.config_dir)
                .arg("--daemon")
                .arg(&self.daemon);
            cmd
        }

        fn calls(&self) -> String {
            std::fs::read_to_string(self.home.path().join("bin/calls.log")).unwrap_or_default()
        }

        fn config(&self) -> String {
            std::fs::read_to_string(self.config_dir.join("config.yaml")).unwrap()
        }
    }

    #[test]
    #[serial]
    fn provisions_into_empty_config_dir() {
        let fixture = Fixture::new();
        let output = fixture.provision("app.example.com").output().unwrap();

        assert!(output.status.success(), "{}", combined(&output));
        let config = fixture.config();
        assert!(config.starts_with("tunnel: fake-0001\n"));
        assert!(config.contains("  - hostname: app.example.com\n    service: http://localhost:8080\n"));
        assert!(config.ends_with("  - service: http_status:404\n"));
        assert!(fixture.config_dir.join("fake-0001.json").exists());
        assert!(!fixture.config_dir.join("home.pending.json").exists());

        let calls = fixture.calls();
        // The background run logs asynchronously, so only foreground calls are ordered
        let order = ["tunnel login", "tunnel create", "tunnel route dns"];
        let positions: Vec<usize> = order
            .iter()
            .map(|call| calls.find(call).unwrap_or_else(|| panic!("missing {call}: {calls}")))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{calls}");

        let logs = fixture.home.path().join("logs");
        assert!(logs.join("cloudflared-fake-0001.log").exists());
        let run_log = std::fs::read_to_string(logs.join("tunnelsmith.log")).unwrap();
        assert!(run_log.contains("Provisioned app.example.com"), "{run_log}");
    }

    #[test]
    #[serial]
    fn rerun_leaves_config_unchanged() {
        let fixture = Fixture::new();
        assert!(fixture.provision("app.example.com").status().unwrap().success());
        let first = fixture.config();

        let output = fixture.provision("app.example.com").output().unwrap();
        assert!(output.status.success(), "{}", combined(&output));
        assert_eq!(fixture.config(), first);
        let backup = std::fs::read_to_string(fixture.config_dir.join("config.yaml.bak")).unwrap();
        assert_eq!(backup, first);
    }

    #[test]
    #[serial]
    fn appends_after_existing_tunnel() {
        let fixture = Fixture::new();
        std::fs::create_dir_all(&fixture.config_dir).unwrap();
        let existing = "tunnel: xyz000\ningress:\n  - service: http_status:404\n";
        std::fs::write(fixture.config_dir.join("config.yaml"), existing).unwrap();

        let output = fixture.provision("app.example.com").output().unwrap();
        assert!(output.status.success(), "{}", combined(&output));

        let config = fixture.config();
        assert!(config.starts_with(existing));
        assert!(config.contains("tunnel: fake-0001\n"));
        let backup = std::fs::read_to_string(fixture.config_dir.join("config.yaml.bak")).unwrap();
        assert_eq!(backup, existing);
    }

    #[test]
    #[serial]
    fn dns_failure_exits_one_and_keeps_config() {
        let fixture = Fixture::new();
        let output = fixture
            .provision("app.example.com")
            .env("FAKE_ROUTE_FAIL", "1")
            .output()
            .unwrap();

        assert_eq!(output.status.code(), Some(1));
        assert!(combined(&output).contains("route-dns failed"));
        assert!(fixture.config().contains("app.example.com"));
    }

    #[test]
    #[serial]
    fn exits_while_tunnel_keeps_running() {
        let fixture = Fixture::new();
        let started = Instant::now();
        let output = fixture
            .provision("app.example.com")
            .env("FAKE_RUN_SECONDS", "30")
            .output()
            .unwrap();
        let elapsed = started.elapsed();

        assert!(output.status.success(), "{}", combined(&output));
        assert!(elapsed < Duration::from_secs(10), "took {elapsed:?}");

        let stdout = String::from_utf8_lossy(&output.stdout);
        let pid: u32 = stdout
            .split("pid ")
            .nth(1)
            .and_then(|rest| rest.split(|c: char| !c.is_ascii_digit()).next())
            .and_then(|digits| digits.parse().ok())
            .unwrap_or_else(|| panic!("no pid in summary: {stdout}"));
        let alive = Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .unwrap()
            .success();
        Command::new("kill").arg(pid.to_string()).status().unwrap();
        assert!(alive, "tunnel process {pid} exited with tunnelsmith");
    }
}
