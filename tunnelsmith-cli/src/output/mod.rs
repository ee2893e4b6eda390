//! Console output for a provisioning run.
//!
//! Logs carry the detail; the console shows the request, the result and a
//! short summary. [`Console`] writes to any writer so tests can capture it.

use dialoguer::console::style;
use std::io::{self, Write};

use tunnelsmith_core::{MergeOutcome, ProvisionReport, ValidatedRequest};

const RULE_WIDTH: usize = 60;

/// Styled run output over a writer
pub struct Console<W> {
    out: W,
}

impl Console<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Console<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Announce what is about to be provisioned.
    pub fn request(&mut self, request: &ValidatedRequest) -> io::Result<()> {
        writeln!(self.out, "{}", style("─".repeat(RULE_WIDTH)).dim())?;
        writeln!(
            self.out,
            "{} tunnel {} for {} -> localhost:{}",
            style("tunnelsmith").bold(),
            style(&request.tunnel_name).cyan(),
            style(&request.domain).cyan(),
            request.port
        )?;
        writeln!(self.out, "  config dir: {}", request.config_dir.display())?;
        writeln!(self.out, "{}", style("─".repeat(RULE_WIDTH)).dim())?;
        self.out.flush()
    }

    /// Green check line.
    pub fn success(&mut self, message: &str) -> io::Result<()> {
        writeln!(
            self.out,
            "\n{} {}",
            style("✓").green().bold(),
            style(message).green()
        )
    }

    /// Red cross line, followed by a hint when there is one.
    pub fn failure(&mut self, message: &str, hint: Option<&str>) -> io::Result<()> {
        writeln!(
            self.out,
            "\n{} {}",
            style("✗").red().bold(),
            style(message).red()
        )?;
        if let Some(hint) = hint {
            writeln!(self.out, "  {}", style(hint).yellow())?;
        }
        Ok(())
    }

    /// What a successful run set up.
    pub fn report(&mut self, report: &ProvisionReport) -> io::Result<()> {
        let origin = if report.tunnel_reused {
            "reused"
        } else {
            "created"
        };
        let config = match report.merge {
            MergeOutcome::Merged => "updated".to_string(),
            MergeOutcome::Skipped(reason) => format!("unchanged, {}", reason),
        };

        writeln!(self.out)?;
        writeln!(self.out, "  Tunnel:   {} ({})", report.tunnel_id, origin)?;
        writeln!(
            self.out,
            "  Route:    https://{} -> http://localhost:{}",
            report.domain, report.port
        )?;
        writeln!(
            self.out,
            "  Config:   {} ({})",
            report.config_path.display(),
            config
        )?;
        match (report.launched.pid, &report.launched.log_path) {
            (Some(pid), Some(log)) => writeln!(
                self.out,
                "  Process:  pid {}, output in {}",
                pid,
                log.display()
            )?,
            (Some(pid), None) => writeln!(self.out, "  Process:  pid {}", pid)?,
            _ => writeln!(self.out, "  Process:  running in background")?,
        }
        let elapsed = report.finished_at - report.started_at;
        writeln!(self.out, "  Took:     {} ms", elapsed.num_milliseconds())?;
        self.out.flush()
    }
}
