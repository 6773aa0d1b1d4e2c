// Copyright (c) 2025 Flavio Neto
// Licensed under the MIT License. See LICENSE file for details.

//! megactl - MEGAcmd front-end library
//!
//! Add, watch, and control MEGA transfers without the shell.
//!
//! megactl shells out to the MEGAcmd command-line tools, scrapes their
//! console output into structured transfer records, and keeps a terminal
//! view in sync through a recurring poll task:
//!
//! **poll loop** -> **launcher** -> **MEGAcmd** -> **raw text** -> **parser** -> **view**
//!
//! # Core Modules
//!
//! - [`transfers`] - Listing parser, transfer records, and the poll monitor
//! - [`mega`] - MEGAcmd subprocess client and the runner seam (real,
//!   simulated, sample)
//! - [`detect`] - Run-mode, download-dir, and MEGAcmd-install probing
//! - [`config`] - Environment-variable settings surface
//! - [`history`] - Persistent recent-URL list
//! - [`health`] - Server readiness probe and doctor diagnostics
//! - [`error`] - Consistent error formatting utilities

pub mod colors;
pub mod config;
pub mod detect;
pub mod error;
pub mod health;
pub mod history;
pub mod locks;
pub mod mega;
pub mod transfers;

// Re-export commonly used types from the transfers module
pub use transfers::{
    parse_listing, snapshot, Direction, MonitorCommand, SessionState, TransferMonitor,
    TransferRecord, TransferState, MAX_FILENAME_DISPLAY, RETRYING_HINT, UNKNOWN_SIZE,
};

// Re-export the launcher seam
pub use mega::{
    CommandRunner, Invocation, MegaClient, MegaCmdRunner, SampleRunner, SimulatedRunner,
    TransferAction, RESUME_NUDGE_DELAY,
};

// Re-export from other modules
pub use config::{effective_poll_interval, Settings, POLL_FLOOR};
pub use detect::{
    default_download_dir, find_in_path, in_container, megacmd_install_dir, run_mode,
    server_binary, subprocess_path, RunMode, ServerBinary,
};
pub use health::{
    ensure_server_running, has_critical, run_health_check, wait_for_server_ready, HealthIssue,
    Severity, SERVER_READY_TIMEOUT, VERSION_CHECK_TIMEOUT,
};
pub use history::{UrlHistory, HISTORY_MAX};
pub use locks::{resilient_read, resilient_write};

// Re-export error utilities
pub use error::{format_error, format_simple_error, ErrorBuilder, GITHUB_ISSUES_URL};
