//! Integration tests for the megactl transfer pipeline
//!
//! These run the real monitor, client, and parser end to end against the
//! canned runners (simulate / UI-test mode), so they need no MEGAcmd
//! installation and no network.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use megactl::detect::RunMode;
use megactl::{
    ensure_server_running, resilient_read, MegaClient, SampleRunner, Settings, SimulatedRunner,
    TransferAction, TransferMonitor, TransferState, UrlHistory,
};

fn simulate_settings(download_dir: &Path) -> Settings {
    Settings {
        download_dir: download_dir.to_path_buf(),
        list_limit: 50,
        path_display_size: 80,
        poll_interval: Duration::from_millis(500),
        simulate: true,
        ui_test_mode: false,
        megacmd_path: None,
        run_mode: RunMode::Desktop,
    }
}

/// Wait for refresh ticks until `predicate` holds or the deadline passes.
async fn wait_for(
    monitor: &TransferMonitor,
    predicate: impl Fn(&megactl::SessionState) -> bool,
) -> bool {
    let state = monitor.state();
    let mut refresh = monitor.refresh();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if predicate(&resilient_read(&state)) {
                return;
            }
            if refresh.changed().await.is_err() {
                return;
            }
        }
    })
    .await
    .is_ok()
}

// =============================================================================
// Poll Pipeline Tests
// =============================================================================

#[tokio::test]
async fn test_monitor_polls_simulated_listing() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let settings = simulate_settings(dir.path());
    let client = Arc::new(MegaClient::with_runner(Arc::new(SimulatedRunner), &settings));

    let monitor = TransferMonitor::start(client, settings.poll_interval);
    assert!(wait_for(&monitor, |s| s.records.len() == 2).await);

    let state = monitor.state();
    let guard = resilient_read(&state);
    assert_eq!(guard.records[0].tag, "1");
    assert_eq!(guard.records[0].state, TransferState::Active);
    assert_eq!(guard.records[0].filename, "sample_file.zip");
    assert_eq!(guard.records[1].tag, "2");
    assert_eq!(guard.records[1].state, TransferState::Queued);
    drop(guard);

    monitor.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn test_sample_mode_parses_native_listing() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let settings = simulate_settings(dir.path());
    let client = Arc::new(MegaClient::with_runner(Arc::new(SampleRunner), &settings));

    let monitor = TransferMonitor::start(client, settings.poll_interval);
    assert!(wait_for(&monitor, |s| s.records.len() == 4).await);

    let state = monitor.state();
    let guard = resilient_read(&state);
    assert_eq!(guard.records[0].filename, "ubuntu-22.04.iso");
    assert_eq!(guard.records[0].size_display, "3.54 GB");
    assert_eq!(guard.records[3].state, TransferState::Retrying);
    drop(guard);

    monitor.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn test_retrying_advisory_appears_exactly_once() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let settings = simulate_settings(dir.path());
    // The sample listing reports a RETRYING transfer on every single poll.
    let client = Arc::new(MegaClient::with_runner(Arc::new(SampleRunner), &settings));

    let monitor = TransferMonitor::start(client, Duration::from_millis(500));
    let state = monitor.state();

    // Let several polls land.
    let mut refresh = monitor.refresh();
    for _ in 0..3 {
        let _ = tokio::time::timeout(Duration::from_secs(2), refresh.changed()).await;
    }

    let guard = resilient_read(&state);
    let hints = guard
        .messages
        .iter()
        .filter(|m| m.contains("RETRYING"))
        .count();
    assert_eq!(hints, 1, "advisory must be logged exactly once per run");
    drop(guard);

    monitor.shutdown().await.expect("shutdown");
}

// =============================================================================
// User Action Tests
// =============================================================================

#[tokio::test]
async fn test_submit_url_logs_started() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let settings = simulate_settings(dir.path());
    let client = Arc::new(MegaClient::with_runner(Arc::new(SimulatedRunner), &settings));

    let monitor = TransferMonitor::start(client, Duration::from_secs(60));
    monitor
        .submit("https://mega.nz/file/abc#def")
        .await
        .expect("submit");

    assert!(
        wait_for(&monitor, |s| {
            s.messages
                .iter()
                .any(|m| m.contains("Download started successfully"))
        })
        .await
    );

    monitor.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn test_control_action_logs_confirmation() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let settings = simulate_settings(dir.path());
    let client = Arc::new(MegaClient::with_runner(Arc::new(SimulatedRunner), &settings));

    let monitor = TransferMonitor::start(client, Duration::from_secs(60));
    monitor
        .action(TransferAction::Resume, Some("2".to_string()))
        .await
        .expect("action");

    assert!(
        wait_for(&monitor, |s| {
            s.messages
                .iter()
                .any(|m| m.contains("Resume command sent for transfer 2"))
        })
        .await
    );

    monitor.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn test_shutdown_closes_the_command_channel() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let settings = simulate_settings(dir.path());
    let client = Arc::new(MegaClient::with_runner(Arc::new(SimulatedRunner), &settings));

    let monitor = TransferMonitor::start(client, Duration::from_secs(60));
    monitor.shutdown().await.expect("shutdown");

    // Once the worker has drained the shutdown command, new submissions
    // have nowhere to go.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(monitor.submit("https://mega.nz/late").await.is_err());
}

// =============================================================================
// Readiness and History Tests
// =============================================================================

#[tokio::test]
async fn test_server_always_ready_in_simulate_mode() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let settings = simulate_settings(dir.path());
    let client = MegaClient::with_runner(Arc::new(SimulatedRunner), &settings);
    assert!(ensure_server_running(&settings, &client).await);
}

#[test]
fn test_history_resubmission_moves_to_front() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let path = dir.path().join("history.json");

    let mut history = UrlHistory::load_from(path.clone());
    history.record("https://mega.nz/A").expect("record");
    history.record("https://mega.nz/B").expect("record");
    history.record("https://mega.nz/A").expect("record");
    assert_eq!(history.urls(), &["https://mega.nz/A", "https://mega.nz/B"]);

    // Survives a reload.
    let reloaded = UrlHistory::load_from(path);
    assert_eq!(reloaded.urls(), &["https://mega.nz/A", "https://mega.nz/B"]);
}
