// Copyright (c) 2025 Flavio Neto
// Licensed under the MIT License. See LICENSE file for details.

//! MEGAcmd integration for megactl.
//!
//! Wraps the MEGAcmd command-line tools behind a narrow client so the rest
//! of the crate never touches a subprocess directly:
//!
//! - `mega-get` starts a download
//! - `mega-transfers` lists transfers and targets cancel/pause/resume
//! - `mega-version` doubles as the server liveness check
//!
//! The actual spawning sits behind the [`CommandRunner`] trait so simulate
//! mode and UI test mode are runner swaps rather than branches scattered
//! through call sites.
//!
//! # Example
//!
//! ```no_run
//! use megactl::config::Settings;
//! use megactl::mega::MegaClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let settings = Settings::from_env();
//! let client = MegaClient::from_settings(&settings);
//! let listing = client.list_transfers().await?;
//! println!("{}", listing);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::Settings;
use crate::detect;

/// Delay before the post-start resume-all nudge (see
/// [`MegaClient::start_download`]).
pub const RESUME_NUDGE_DELAY: Duration = Duration::from_secs(2);

/// Outcome of one external command run.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// Process exit code; 0 means success, -1 means killed by signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl Invocation {
    /// MEGAcmd follows the usual convention: zero is success.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// A control action targeting one transfer tag, or all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferAction {
    Cancel,
    Pause,
    Resume,
}

impl TransferAction {
    /// The `mega-transfers` flag for this action.
    pub fn flag(&self) -> &'static str {
        match self {
            Self::Cancel => "-c",
            Self::Pause => "-p",
            Self::Resume => "-r",
        }
    }

    /// Verb for user-visible messages.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Cancel => "Cancel",
            Self::Pause => "Pause",
            Self::Resume => "Resume",
        }
    }
}

/// Runs external commands and reports what happened.
///
/// A spawn failure (binary missing, OS error) is an `Err`; a process that
/// ran and exited non-zero is an `Ok` carrying the code, because for MEGAcmd
/// that is an answer, not a malfunction on our side.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Invocation>;
}

/// Real runner: spawns the command with the MEGAcmd install directory
/// prepended to `PATH`.
pub struct MegaCmdRunner {
    path_env: String,
}

impl MegaCmdRunner {
    pub fn new() -> Self {
        Self {
            path_env: detect::subprocess_path(),
        }
    }
}

impl Default for MegaCmdRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for MegaCmdRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Invocation> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .env("PATH", &self.path_env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to launch {}", program))?;

        Ok(Invocation {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Canned listing served in simulate mode (simplified format).
pub const SIMULATED_LISTING: &str = "\n\
TRANSFER  STATE     PROGRESS  PATH\n\
1         ACTIVE    12%       /data/sample_file.zip\n\
2         QUEUED    0%        /data/another_file.pdf\n";

/// Simulate-mode runner: answers every subcommand with a fixed success and
/// never spawns a process. Useful for automated tests and for trying the UI
/// without MEGAcmd installed.
pub struct SimulatedRunner;

#[async_trait]
impl CommandRunner for SimulatedRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Invocation> {
        let reply = match program {
            "mega-get" => Invocation::ok("URL Accepted (simulated)"),
            "mega-version" => Invocation::ok("MEGAcmd version: 1.7.0 (simulated)"),
            "mega-transfers" if args.first().map_or(false, |a| a.starts_with("--limit")) => {
                Invocation::ok(SIMULATED_LISTING)
            }
            _ => Invocation::ok(""),
        };
        Ok(reply)
    }
}

/// Realistic native-format sample served in UI test mode.
pub const SAMPLE_LISTING: &str = "\n\
⇓    1234  /Downloads/ubuntu-22.04.iso  45.2% of  3.54 GB ACTIVE\n\
↑    5678  /Uploads/video.mp4  78.5% of  1.23 GB ACTIVE\n\
⇓    9012  /Downloads/document.pdf  0.0% of  15.2 MB QUEUED\n\
⇓    3456  /Downloads/large_archive.zip  12.8% of  8.91 GB RETRYING\n";

/// UI-test-mode runner: like [`SimulatedRunner`] but the listing is a
/// realistic native-format sample, including a RETRYING row.
pub struct SampleRunner;

#[async_trait]
impl CommandRunner for SampleRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Invocation> {
        let reply = match program {
            "mega-get" => Invocation::ok("URL Accepted (sample)"),
            "mega-version" => Invocation::ok("MEGAcmd version: 1.7.0 (sample)"),
            "mega-transfers" if args.first().map_or(false, |a| a.starts_with("--limit")) => {
                Invocation::ok(SAMPLE_LISTING)
            }
            _ => Invocation::ok(""),
        };
        Ok(reply)
    }
}

/// Client for the MEGAcmd tools, built over an injected [`CommandRunner`].
pub struct MegaClient {
    runner: Arc<dyn CommandRunner>,
    download_dir: PathBuf,
    list_limit: u32,
    path_display_size: u32,
    resume_nudge_delay: Duration,
}

impl MegaClient {
    /// Build the client the settings ask for: simulate mode and UI test mode
    /// swap in their canned runners, everything else gets real subprocesses.
    pub fn from_settings(settings: &Settings) -> Self {
        let runner: Arc<dyn CommandRunner> = if settings.simulate {
            Arc::new(SimulatedRunner)
        } else if settings.ui_test_mode {
            Arc::new(SampleRunner)
        } else {
            Arc::new(MegaCmdRunner::new())
        };
        // Canned runners answer instantly; no point delaying the nudge.
        let resume_nudge_delay = if settings.simulate || settings.ui_test_mode {
            Duration::ZERO
        } else {
            RESUME_NUDGE_DELAY
        };
        Self {
            runner,
            download_dir: settings.download_dir.clone(),
            list_limit: settings.list_limit,
            path_display_size: settings.path_display_size,
            resume_nudge_delay,
        }
    }

    /// Build a client over an explicit runner (tests, embedding).
    pub fn with_runner(runner: Arc<dyn CommandRunner>, settings: &Settings) -> Self {
        Self {
            runner,
            download_dir: settings.download_dir.clone(),
            list_limit: settings.list_limit,
            path_display_size: settings.path_display_size,
            resume_nudge_delay: Duration::ZERO,
        }
    }

    /// Where downloads land.
    pub fn download_dir(&self) -> &PathBuf {
        &self.download_dir
    }

    /// Start downloading a MEGA URL into the configured directory.
    ///
    /// On success, waits briefly and then fires a best-effort
    /// `mega-transfers -r -a`: freshly queued transfers are known to sit at
    /// 0% in RETRYING until resumed once. That follow-up is advisory and its
    /// failure is swallowed.
    pub async fn start_download(&self, url: &str) -> Result<Invocation> {
        let dir = self.download_dir.display().to_string();
        let invocation = self
            .runner
            .run("mega-get", &["-q", "--ignore-quota-warn", url.trim(), dir.as_str()])
            .await?;

        if invocation.success() {
            if !self.resume_nudge_delay.is_zero() {
                tokio::time::sleep(self.resume_nudge_delay).await;
            }
            if let Err(e) = self.runner.run("mega-transfers", &["-r", "-a"]).await {
                tracing::debug!(error = %e, "resume-all nudge failed");
            }
        }

        Ok(invocation)
    }

    /// Fetch the raw transfer listing.
    ///
    /// On a non-zero exit the captured stderr is appended to the returned
    /// text so the parser (and the raw-output fallback view) see everything
    /// the tool said.
    pub async fn list_transfers(&self) -> Result<String> {
        let limit = format!("--limit={}", self.list_limit);
        let width = format!("--path-display-size={}", self.path_display_size);
        let invocation = self
            .runner
            .run("mega-transfers", &[limit.as_str(), width.as_str()])
            .await?;

        let mut out = invocation.stdout;
        if invocation.exit_code != 0 && !invocation.stderr.is_empty() {
            out.push_str(&invocation.stderr);
        }
        Ok(out)
    }

    /// Cancel, pause, or resume one transfer by tag, or all with `None`.
    pub async fn transfer_action(
        &self,
        action: TransferAction,
        tag: Option<&str>,
    ) -> Result<Invocation> {
        let target = match tag {
            Some(t) if !t.trim().is_empty() => t.trim(),
            _ => "-a",
        };
        self.runner
            .run("mega-transfers", &[action.flag(), target])
            .await
    }

    /// Version check; succeeding means the MEGAcmd server is up.
    pub async fn version(&self) -> Result<Invocation> {
        self.runner.run("mega-version", &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> Settings {
        Settings {
            download_dir: PathBuf::from("/tmp/downloads"),
            list_limit: 50,
            path_display_size: 80,
            poll_interval: Duration::from_millis(500),
            simulate: true,
            ui_test_mode: false,
            megacmd_path: None,
            run_mode: crate::detect::RunMode::Desktop,
        }
    }

    #[tokio::test]
    async fn test_simulated_listing_round_trip() {
        let client = MegaClient::with_runner(Arc::new(SimulatedRunner), &test_settings());
        let raw = client.list_transfers().await.unwrap();
        let records = crate::transfers::parse_listing(&raw);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tag, "1");
        assert_eq!(records[1].tag, "2");
    }

    #[tokio::test]
    async fn test_simulated_start_download_succeeds() {
        let client = MegaClient::with_runner(Arc::new(SimulatedRunner), &test_settings());
        let invocation = client.start_download("https://mega.nz/#!abc!def").await.unwrap();
        assert!(invocation.success());
        assert!(invocation.stdout.contains("simulated"));
    }

    #[tokio::test]
    async fn test_sample_listing_contains_retrying() {
        let client = MegaClient::with_runner(Arc::new(SampleRunner), &test_settings());
        let raw = client.list_transfers().await.unwrap();
        assert!(raw.contains("RETRYING"));
        let records = crate::transfers::parse_listing(&raw);
        assert_eq!(records.len(), 4);
    }

    #[tokio::test]
    async fn test_transfer_action_targets_all_without_tag() {
        let client = MegaClient::with_runner(Arc::new(SimulatedRunner), &test_settings());
        let invocation = client
            .transfer_action(TransferAction::Resume, None)
            .await
            .unwrap();
        assert!(invocation.success());
    }

    #[test]
    fn test_action_flags() {
        assert_eq!(TransferAction::Cancel.flag(), "-c");
        assert_eq!(TransferAction::Pause.flag(), "-p");
        assert_eq!(TransferAction::Resume.flag(), "-r");
    }
}
