// Copyright (c) 2025 Flavio Neto
// Licensed under the MIT License. See LICENSE file for details.

//! Background transfer monitor.
//!
//! One recurring task polls `mega-transfers` on a fixed interval, replaces
//! the shared listing wholesale, and bumps a watch channel so the view
//! redraws. User actions (submit URL, cancel/pause/resume) arrive over a
//! command channel and run as short-lived one-shot tasks on the same
//! runtime, appending their outcome to the shared message log.
//!
//! Nothing in here is fatal: a failed poll or a failed action becomes a log
//! line and the loop keeps going.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::colors::symbols;
use crate::locks::{resilient_read, resilient_write};
use crate::mega::{MegaClient, TransferAction};
use super::parser::parse_listing;
use super::types::TransferRecord;

/// One-time advisory shown the first time a RETRYING transfer is observed.
pub const RETRYING_HINT: &str =
    "[!] If transfers stay at 0% (RETRYING), try Resume, or Cancel and re-add the URL.";

/// Shared state written by the monitor and read by the view.
///
/// The records are rebuilt wholesale on every poll; nothing in them is
/// stable across ticks.
#[derive(Debug, Default)]
pub struct SessionState {
    /// User-visible log lines, oldest first.
    pub messages: Vec<String>,
    /// The listing text exactly as the tool printed it, for the
    /// could-not-parse fallback view.
    pub raw_listing: String,
    /// Parsed records from the most recent poll.
    pub records: Vec<TransferRecord>,
    retrying_hint_shown: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a timestamped line to the message log.
    pub fn push_message(&mut self, line: impl Into<String>) {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        self.messages.push(format!("{} {}", stamp, line.into()));
    }

    /// The last `n` log lines, oldest first.
    pub fn recent_messages(&self, n: usize) -> &[String] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// True when the tool said something but none of it parsed.
    pub fn has_unparsed_output(&self) -> bool {
        self.records.is_empty() && !self.raw_listing.trim().is_empty()
    }
}

/// Commands accepted by the monitor.
#[derive(Debug)]
pub enum MonitorCommand {
    /// Start downloading a URL
    Get { url: String },
    /// Cancel/pause/resume one tag, or all with `None`
    Action {
        action: TransferAction,
        tag: Option<String>,
    },
    /// Stop the poll loop
    Shutdown,
}

/// Handle to the background monitor.
#[derive(Clone)]
pub struct TransferMonitor {
    command_tx: mpsc::Sender<MonitorCommand>,
    state: Arc<RwLock<SessionState>>,
    refresh_rx: watch::Receiver<u64>,
}

impl TransferMonitor {
    /// Start the poll loop. The first poll fires immediately, then on every
    /// interval tick.
    pub fn start(client: Arc<MegaClient>, poll_interval: Duration) -> Self {
        let state = Arc::new(RwLock::new(SessionState::new()));
        let (command_tx, command_rx) = mpsc::channel(32);
        let (refresh_tx, refresh_rx) = watch::channel(0u64);
        let refresh_tx = Arc::new(refresh_tx);

        let worker_state = state.clone();
        tokio::spawn(async move {
            Self::worker_loop(client, command_rx, worker_state, refresh_tx, poll_interval).await;
        });

        Self {
            command_tx,
            state,
            refresh_rx,
        }
    }

    /// The shared session state.
    pub fn state(&self) -> Arc<RwLock<SessionState>> {
        self.state.clone()
    }

    /// A receiver that changes after every state write.
    pub fn refresh(&self) -> watch::Receiver<u64> {
        self.refresh_rx.clone()
    }

    /// Queue a URL for download.
    pub async fn submit(&self, url: impl Into<String>) -> Result<()> {
        self.command_tx
            .send(MonitorCommand::Get { url: url.into() })
            .await
            .context("Transfer monitor is gone")
    }

    /// Queue a cancel/pause/resume.
    pub async fn action(&self, action: TransferAction, tag: Option<String>) -> Result<()> {
        self.command_tx
            .send(MonitorCommand::Action { action, tag })
            .await
            .context("Transfer monitor is gone")
    }

    /// Stop the poll loop.
    pub async fn shutdown(&self) -> Result<()> {
        self.command_tx
            .send(MonitorCommand::Shutdown)
            .await
            .context("Transfer monitor is gone")
    }

    async fn worker_loop(
        client: Arc<MegaClient>,
        mut command_rx: mpsc::Receiver<MonitorCommand>,
        state: Arc<RwLock<SessionState>>,
        refresh_tx: Arc<watch::Sender<u64>>,
        poll_interval: Duration,
    ) {
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    Self::poll_once(&client, &state, &refresh_tx).await;
                }
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(MonitorCommand::Shutdown) | None => break,
                        Some(cmd) => {
                            let client = client.clone();
                            let state = state.clone();
                            let refresh_tx = refresh_tx.clone();
                            tokio::spawn(async move {
                                Self::handle_command(cmd, &client, &state, &refresh_tx).await;
                            });
                        }
                    }
                }
            }
        }
    }

    /// One poll tick: fetch, parse, replace, notify.
    async fn poll_once(
        client: &MegaClient,
        state: &Arc<RwLock<SessionState>>,
        refresh_tx: &watch::Sender<u64>,
    ) {
        match client.list_transfers().await {
            Ok(raw) => {
                let records = parse_listing(&raw);
                let mut guard = resilient_write(state);
                // Shown at most once per run, even if the state disappears
                // and comes back.
                if !guard.retrying_hint_shown && raw.contains("RETRYING") {
                    guard.retrying_hint_shown = true;
                    guard.push_message(RETRYING_HINT);
                }
                guard.raw_listing = raw;
                guard.records = records;
            }
            Err(e) => {
                resilient_write(state).push_message(format!("{} Poll error: {}", symbols::ERROR, e));
            }
        }
        // The state write above lands before the view is told to redraw.
        refresh_tx.send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    async fn handle_command(
        cmd: MonitorCommand,
        client: &MegaClient,
        state: &Arc<RwLock<SessionState>>,
        refresh_tx: &watch::Sender<u64>,
    ) {
        match cmd {
            MonitorCommand::Get { url } => {
                resilient_write(state).push_message(format!(
                    "Starting download to {}...",
                    client.download_dir().display()
                ));
                refresh_tx.send_modify(|g| *g = g.wrapping_add(1));

                match client.start_download(&url).await {
                    Ok(invocation) if invocation.success() => {
                        resilient_write(state)
                            .push_message(format!("{} Download started successfully", symbols::SUCCESS));
                    }
                    Ok(invocation) => {
                        let mut guard = resilient_write(state);
                        guard.push_message(format!(
                            "{} mega-get failed (exit {})",
                            symbols::ERROR, invocation.exit_code
                        ));
                        let err = invocation.stderr.trim();
                        if !err.is_empty() {
                            guard.push_message(format!("Details: {}", err));
                        }
                    }
                    Err(e) => {
                        resilient_write(state)
                            .push_message(format!("{} {:#}", symbols::ERROR, e));
                    }
                }
            }
            MonitorCommand::Action { action, tag } => {
                let target = tag.clone().unwrap_or_else(|| "all".to_string());
                match client.transfer_action(action, tag.as_deref()).await {
                    Ok(invocation) => {
                        let mut guard = resilient_write(state);
                        let out = invocation.stdout.trim();
                        if !out.is_empty() {
                            guard.push_message(out.to_string());
                        }
                        let err = invocation.stderr.trim();
                        if !invocation.success() && !err.is_empty() {
                            guard.push_message(err.to_string());
                        } else {
                            guard.push_message(format!(
                                "{} command sent for transfer {}",
                                action.verb(),
                                target
                            ));
                        }
                    }
                    Err(e) => {
                        resilient_write(state)
                            .push_message(format!("{} {:#}", symbols::ERROR, e));
                    }
                }
            }
            MonitorCommand::Shutdown => {}
        }
        refresh_tx.send_modify(|g| *g = g.wrapping_add(1));
    }
}

/// Read a consistent snapshot of the session state for rendering.
pub fn snapshot(state: &Arc<RwLock<SessionState>>) -> (Vec<TransferRecord>, Vec<String>, bool, String) {
    let guard = resilient_read(state);
    (
        guard.records.clone(),
        guard.messages.clone(),
        guard.has_unparsed_output(),
        guard.raw_listing.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::detect::RunMode;
    use crate::mega::{CommandRunner, Invocation, SampleRunner, SimulatedRunner};
    use async_trait::async_trait;
    use std::path::PathBuf;

    fn test_settings() -> Settings {
        Settings {
            download_dir: PathBuf::from("/tmp/downloads"),
            list_limit: 50,
            path_display_size: 80,
            poll_interval: Duration::from_millis(500),
            simulate: true,
            ui_test_mode: false,
            megacmd_path: None,
            run_mode: RunMode::Desktop,
        }
    }

    fn client_with(runner: Arc<dyn CommandRunner>) -> MegaClient {
        MegaClient::with_runner(runner, &test_settings())
    }

    struct FailingRunner;

    #[async_trait]
    impl CommandRunner for FailingRunner {
        async fn run(&self, program: &str, _args: &[&str]) -> anyhow::Result<Invocation> {
            anyhow::bail!("No such file or directory: {}", program)
        }
    }

    #[tokio::test]
    async fn test_poll_replaces_listing_wholesale() {
        let client = client_with(Arc::new(SimulatedRunner));
        let state = Arc::new(RwLock::new(SessionState::new()));
        let (refresh_tx, _refresh_rx) = watch::channel(0u64);

        TransferMonitor::poll_once(&client, &state, &refresh_tx).await;
        TransferMonitor::poll_once(&client, &state, &refresh_tx).await;

        let guard = resilient_read(&state);
        assert_eq!(guard.records.len(), 2);
        assert_eq!(guard.records[0].tag, "1");
        assert!(!guard.has_unparsed_output());
    }

    #[tokio::test]
    async fn test_retrying_hint_shown_exactly_once() {
        // The sample listing contains a RETRYING row on every poll.
        let client = client_with(Arc::new(SampleRunner));
        let state = Arc::new(RwLock::new(SessionState::new()));
        let (refresh_tx, _refresh_rx) = watch::channel(0u64);

        for _ in 0..3 {
            TransferMonitor::poll_once(&client, &state, &refresh_tx).await;
        }

        let guard = resilient_read(&state);
        let hints = guard
            .messages
            .iter()
            .filter(|m| m.contains("RETRYING"))
            .count();
        assert_eq!(hints, 1);
    }

    #[tokio::test]
    async fn test_poll_errors_are_logged_not_fatal() {
        let client = client_with(Arc::new(FailingRunner));
        let state = Arc::new(RwLock::new(SessionState::new()));
        let (refresh_tx, _refresh_rx) = watch::channel(0u64);

        TransferMonitor::poll_once(&client, &state, &refresh_tx).await;
        TransferMonitor::poll_once(&client, &state, &refresh_tx).await;

        let guard = resilient_read(&state);
        let errors = guard
            .messages
            .iter()
            .filter(|m| m.contains("Poll error"))
            .count();
        assert_eq!(errors, 2);
    }

    #[tokio::test]
    async fn test_refresh_bumps_after_poll() {
        let client = client_with(Arc::new(SimulatedRunner));
        let state = Arc::new(RwLock::new(SessionState::new()));
        let (refresh_tx, refresh_rx) = watch::channel(0u64);

        TransferMonitor::poll_once(&client, &state, &refresh_tx).await;
        assert_eq!(*refresh_rx.borrow(), 1);
    }

    #[tokio::test]
    async fn test_submit_logs_outcome() {
        let client = Arc::new(client_with(Arc::new(SimulatedRunner)));
        let monitor = TransferMonitor::start(client, Duration::from_secs(60));
        let state = monitor.state();

        monitor.submit("https://mega.nz/#!abc!def").await.unwrap();

        let mut rx = monitor.refresh();
        let deadline = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                rx.changed().await.expect("monitor alive");
                let done = resilient_read(&state)
                    .messages
                    .iter()
                    .any(|m| m.contains("Download started successfully"));
                if done {
                    break;
                }
            }
        })
        .await;
        assert!(deadline.is_ok(), "submit outcome never reached the log");

        monitor.shutdown().await.unwrap();
    }

    #[test]
    fn test_recent_messages_window() {
        let mut state = SessionState::new();
        for i in 0..10 {
            state.push_message(format!("line {}", i));
        }
        let recent = state.recent_messages(3);
        assert_eq!(recent.len(), 3);
        assert!(recent[2].contains("line 9"));
        assert_eq!(state.recent_messages(100).len(), 10);
    }
}
