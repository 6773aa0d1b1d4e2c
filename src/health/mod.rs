// Copyright (c) 2025 Flavio Neto
// Licensed under the MIT License. See LICENSE file for details.

//! Server lifecycle and diagnostics for megactl.
//!
//! MEGAcmd runs a background server process that every `mega-*` command
//! talks to. This module makes a best effort to get one running and tell
//! the user what is wrong when it is not:
//!
//! - readiness probe: run `mega-version` on a fixed cadence until it
//!   succeeds or a deadline passes
//! - server start: spawn the headless `mega-cmd-server` detached when the
//!   install ships one (the macOS app bundle is only waited for, launching
//!   it would pop a GUI window)
//! - doctor checks: binaries on the path, download directory, server
//!   reachability
//!
//! None of this blocks the rest of the tool; a probe timeout degrades to an
//! advisory message.

use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::detect::{self, ServerBinary};
use crate::mega::MegaClient;

/// Overall deadline for the server to come up.
pub const SERVER_READY_TIMEOUT: Duration = Duration::from_secs(15);

/// Per-attempt timeout on the version check.
pub const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Settle time after spawning the server before the first probe.
const SERVER_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Pause between readiness probes.
const READY_RETRY_CADENCE: Duration = Duration::from_secs(1);

/// Severity level for health issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Informational - not a problem, just FYI
    Info,
    /// Warning - the tool works but something is degraded
    Warning,
    /// Critical - transfers cannot work until this is fixed
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A health finding with an actionable fix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthIssue {
    pub severity: Severity,
    /// Component affected (e.g. "MEGAcmd", "Downloads", "Environment")
    pub component: String,
    pub message: String,
    /// Actionable fix instruction; empty for pure FYI entries
    pub fix: String,
}

impl HealthIssue {
    pub fn new(severity: Severity, component: &str, message: &str, fix: &str) -> Self {
        Self {
            severity,
            component: component.to_string(),
            message: message.to_string(),
            fix: fix.to_string(),
        }
    }

    pub fn critical(component: &str, message: &str, fix: &str) -> Self {
        Self::new(Severity::Critical, component, message, fix)
    }

    pub fn warning(component: &str, message: &str, fix: &str) -> Self {
        Self::new(Severity::Warning, component, message, fix)
    }

    pub fn info(component: &str, message: &str) -> Self {
        Self::new(Severity::Info, component, message, "")
    }
}

impl std::fmt::Display for HealthIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            Severity::Critical => "[X]",
            Severity::Warning => "[!]",
            Severity::Info => "[i]",
        };
        write!(f, "{} {}: {}", icon, self.component, self.message)
    }
}

/// True when any issue is a blocker.
pub fn has_critical(issues: &[HealthIssue]) -> bool {
    issues.iter().any(|i| i.severity == Severity::Critical)
}

/// Probe `mega-version` until it succeeds or `max_wait` elapses.
///
/// Each attempt gets its own [`VERSION_CHECK_TIMEOUT`]; attempts are paced
/// one second apart. Returns true as soon as one attempt exits zero.
pub async fn wait_for_server_ready(client: &MegaClient, max_wait: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + max_wait;
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout(VERSION_CHECK_TIMEOUT, client.version()).await {
            Ok(Ok(invocation)) if invocation.success() => return true,
            // Ran and failed, spawn error, or per-attempt timeout: retry
            // until the deadline.
            Ok(_) | Err(_) => {}
        }
        tokio::time::sleep(READY_RETRY_CADENCE).await;
    }
    false
}

/// Get the MEGAcmd server running and wait for it, best effort.
///
/// Containers are assumed to manage the server themselves (the image
/// entrypoint starts it), and the canned-runner modes need no server at
/// all; both short-circuit to ready. Only the headless server binary is
/// ever spawned.
pub async fn ensure_server_running(settings: &Settings, client: &MegaClient) -> bool {
    if settings.simulate || settings.ui_test_mode || detect::in_container() {
        return true;
    }

    if let Some(ServerBinary::Headless(bin)) = detect::server_binary() {
        let spawned = tokio::process::Command::new(&bin)
            .env("PATH", detect::subprocess_path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(_child) => {
                tracing::debug!(server = %bin.display(), "started mega-cmd-server, waiting for ready");
                tokio::time::sleep(SERVER_SETTLE_DELAY).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, server = %bin.display(), "could not start mega-cmd-server");
            }
        }
    }

    wait_for_server_ready(client, SERVER_READY_TIMEOUT).await
}

/// Diagnose the environment the way `megactl doctor` reports it.
pub async fn run_health_check(settings: &Settings, client: &MegaClient) -> Vec<HealthIssue> {
    let mut issues = Vec::new();

    issues.push(HealthIssue::info(
        "Environment",
        &format!("Running in {} mode", settings.run_mode),
    ));

    if settings.simulate {
        issues.push(HealthIssue::info(
            "MEGAcmd",
            "Simulation mode (MEGA_SIMULATE=1) - no MEGAcmd required",
        ));
    } else {
        let path = detect::subprocess_path();
        for binary in ["mega-get", "mega-transfers", "mega-version"] {
            if detect::find_in_path(binary, &path).is_none() {
                issues.push(HealthIssue::critical(
                    "MEGAcmd",
                    &format!("{} not found on PATH", binary),
                    "Install MEGAcmd (https://mega.io/cmd) or set MEGACMD_PATH to its install directory",
                ));
            }
        }

        match detect::server_binary() {
            Some(ServerBinary::Headless(bin)) => {
                issues.push(HealthIssue::info(
                    "Server",
                    &format!("mega-cmd-server found at {}", bin.display()),
                ));
            }
            Some(ServerBinary::AppBundle(_)) => {
                issues.push(HealthIssue::info(
                    "Server",
                    "macOS MEGAcmd app bundle found (server starts when the app is opened)",
                ));
            }
            None => {
                issues.push(HealthIssue::warning(
                    "Server",
                    "No MEGAcmd server binary found",
                    "Install MEGAcmd, or open the MEGAcmd app before running megactl",
                ));
            }
        }

        if !wait_for_server_ready(client, VERSION_CHECK_TIMEOUT).await {
            issues.push(HealthIssue::warning(
                "Server",
                "MEGAcmd server is not responding",
                "Run: megactl server (or open MEGAcmd from Applications on macOS)",
            ));
        }
    }

    match std::fs::create_dir_all(&settings.download_dir) {
        Ok(()) => {
            issues.push(HealthIssue::info(
                "Downloads",
                &format!("Downloads go to {}", settings.download_dir.display()),
            ));
        }
        Err(e) => {
            issues.push(HealthIssue::warning(
                "Downloads",
                &format!(
                    "Download directory {} is not usable: {}",
                    settings.download_dir.display(),
                    e
                ),
                "Set DOWNLOAD_DIR to a writable path",
            ));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::RunMode;
    use crate::mega::SimulatedRunner;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn simulate_settings(dir: PathBuf) -> Settings {
        Settings {
            download_dir: dir,
            list_limit: 50,
            path_display_size: 80,
            poll_interval: Duration::from_millis(500),
            simulate: true,
            ui_test_mode: false,
            megacmd_path: None,
            run_mode: RunMode::Desktop,
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
        assert_eq!(Severity::Warning.to_string(), "WARN");
    }

    #[test]
    fn test_issue_display() {
        let issue = HealthIssue::critical("MEGAcmd", "mega-get not found on PATH", "Install it");
        let line = issue.to_string();
        assert!(line.starts_with("[X]"));
        assert!(line.contains("MEGAcmd"));
        assert!(has_critical(&[issue]));
        assert!(!has_critical(&[HealthIssue::info("Environment", "fine")]));
    }

    #[tokio::test]
    async fn test_simulate_mode_is_always_ready() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let settings = simulate_settings(dir.path().join("downloads"));
        let client = MegaClient::with_runner(Arc::new(SimulatedRunner), &settings);
        assert!(ensure_server_running(&settings, &client).await);
    }

    #[tokio::test]
    async fn test_ready_probe_succeeds_against_simulated_server() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let settings = simulate_settings(dir.path().join("downloads"));
        let client = MegaClient::with_runner(Arc::new(SimulatedRunner), &settings);
        assert!(wait_for_server_ready(&client, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_health_check_in_simulate_mode_has_no_criticals() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let settings = simulate_settings(dir.path().join("downloads"));
        let client = MegaClient::with_runner(Arc::new(SimulatedRunner), &settings);
        let issues = run_health_check(&settings, &client).await;
        assert!(!has_critical(&issues));
        assert!(issues.iter().any(|i| i.component == "Downloads"));
    }
}
