// Copyright (c) 2025 Flavio Neto
// Licensed under the MIT License. See LICENSE file for details.

//! Runtime configuration for megactl.
//!
//! Everything is driven by environment variables (optionally seeded from a
//! `.env` file in the working directory) so the same binary works on a
//! desktop, behind a headless session, and inside a container:
//!
//! - `DOWNLOAD_DIR`: where to save downloads (default: ~/Downloads, or /data/
//!   in a container)
//! - `TRANSFER_LIST_LIMIT`: max transfers to request from the listing
//!   (default: 50)
//! - `PATH_DISPLAY_SIZE`: path truncation width for the listing (default: 80)
//! - `INPUT_TIMEOUT`: poll interval in seconds (default: 0.0166, floored to
//!   0.5s)
//! - `MEGA_SIMULATE`: "1" to run without MEGAcmd (canned transfers)
//! - `UI_TEST_MODE`: "1" to show realistic sample transfers for UI work
//! - `MEGACMD_PATH`: path to the MEGAcmd binaries

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::detect::{self, RunMode};

/// Poll intervals below this are clamped up; MEGAcmd gets unhappy when
/// `mega-transfers` is hammered faster than twice a second.
pub const POLL_FLOOR: Duration = Duration::from_millis(500);

/// Default poll interval in seconds (one UI frame at 60 Hz, pre-floor).
pub const DEFAULT_POLL_INTERVAL_SECS: f64 = 0.0166;

/// Default cap on listing rows requested from MEGAcmd.
pub const DEFAULT_LIST_LIMIT: u32 = 50;

/// Default path column width requested from MEGAcmd.
pub const DEFAULT_PATH_DISPLAY_SIZE: u32 = 80;

/// Resolved configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Where `mega-get` writes files.
    pub download_dir: PathBuf,
    /// `--limit` for the listing command.
    pub list_limit: u32,
    /// `--path-display-size` for the listing command.
    pub path_display_size: u32,
    /// Effective poll interval (already floored to [`POLL_FLOOR`]).
    pub poll_interval: Duration,
    /// Bypass MEGAcmd entirely and answer with canned output.
    pub simulate: bool,
    /// Serve a fixed realistic sample listing for UI development.
    pub ui_test_mode: bool,
    /// MEGAcmd install directory, when one could be resolved.
    pub megacmd_path: Option<PathBuf>,
    /// Desktop, headless-web, or container.
    pub run_mode: RunMode,
}

impl Settings {
    /// Resolve settings from the process environment.
    ///
    /// Loads `./.env` first (without overriding variables already set in the
    /// shell) so desktop launches behave like shell launches.
    pub fn from_env() -> Self {
        load_dotenv_if_present();

        let download_dir = std::env::var("DOWNLOAD_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(detect::default_download_dir);

        let list_limit = env_parse("TRANSFER_LIST_LIMIT", DEFAULT_LIST_LIMIT);
        let path_display_size = env_parse("PATH_DISPLAY_SIZE", DEFAULT_PATH_DISPLAY_SIZE);

        let configured_secs = env_parse("INPUT_TIMEOUT", DEFAULT_POLL_INTERVAL_SECS);
        let poll_interval = effective_poll_interval(configured_secs);

        Self {
            download_dir,
            list_limit,
            path_display_size,
            poll_interval,
            simulate: env_truthy("MEGA_SIMULATE"),
            ui_test_mode: env_truthy("UI_TEST_MODE"),
            megacmd_path: detect::megacmd_install_dir(),
            run_mode: detect::run_mode(),
        }
    }
}

/// Clamp a configured interval in seconds to the [`POLL_FLOOR`].
pub fn effective_poll_interval(configured_secs: f64) -> Duration {
    if !configured_secs.is_finite() || configured_secs <= 0.0 {
        return POLL_FLOOR;
    }
    let configured = Duration::from_secs_f64(configured_secs);
    configured.max(POLL_FLOOR)
}

/// "1", "true", and "yes" (any case, surrounding whitespace ignored) are on.
pub fn truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

fn env_truthy(name: &str) -> bool {
    std::env::var(name).map(|v| truthy(&v)).unwrap_or(false)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Load `./.env` into the environment, never overriding existing variables.
///
/// Comments and blank lines are ignored; anything unreadable is skipped, the
/// file is strictly a convenience.
fn load_dotenv_if_present() {
    let Ok(content) = fs::read_to_string(".env") else {
        return;
    };
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if !key.is_empty() && std::env::var_os(key).is_none() {
            std::env::set_var(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthy() {
        assert!(truthy("1"));
        assert!(truthy("true"));
        assert!(truthy(" YES "));
        assert!(!truthy("0"));
        assert!(!truthy(""));
        assert!(!truthy("no"));
    }

    #[test]
    fn test_poll_floor_enforced() {
        assert_eq!(effective_poll_interval(0.0166), POLL_FLOOR);
        assert_eq!(effective_poll_interval(0.0), POLL_FLOOR);
        assert_eq!(effective_poll_interval(-3.0), POLL_FLOOR);
        assert_eq!(effective_poll_interval(f64::NAN), POLL_FLOOR);
    }

    #[test]
    fn test_poll_interval_above_floor_kept() {
        assert_eq!(effective_poll_interval(2.0), Duration::from_secs(2));
    }
}
