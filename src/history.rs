// Copyright (c) 2025 Flavio Neto
// Licensed under the MIT License. See LICENSE file for details.

//! Persistent URL history.
//!
//! Recently submitted MEGA URLs are kept newest-first in a flat JSON array
//! on disk so they can be offered back at the next launch. Writes go through
//! a temp file plus atomic rename under an exclusive lock on a sibling
//! `.lock` file, so two instances cannot shred each other's history.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use fs2::FileExt;

/// Maximum number of URLs kept.
pub const HISTORY_MAX: usize = 50;

/// Default timeout for acquiring the history file lock.
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Retry interval while waiting for the lock.
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Recently submitted URLs, newest first.
#[derive(Debug, Clone)]
pub struct UrlHistory {
    urls: Vec<String>,
    path: PathBuf,
}

impl UrlHistory {
    /// Default on-disk location: `~/.megactl/history.json`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".megactl").join("history.json"))
            .unwrap_or_else(|| PathBuf::from(".megactl/history.json"))
    }

    /// Load history from the default location.
    pub fn load() -> Self {
        Self::load_from(Self::default_path())
    }

    /// Load history from an explicit path.
    ///
    /// A missing or unreadable file is an empty history, never an error; the
    /// file is strictly a convenience. Non-string entries are dropped and the
    /// list is clamped to [`HISTORY_MAX`].
    pub fn load_from(path: PathBuf) -> Self {
        let urls = read_urls(&path).unwrap_or_default();
        Self { urls, path }
    }

    /// The stored URLs, newest first.
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Record a submitted URL: move-to-front, dedup, clamp, persist.
    pub fn record(&mut self, url: &str) -> Result<()> {
        let url = url.trim();
        if url.is_empty() {
            return Ok(());
        }
        self.urls.retain(|u| u != url);
        self.urls.insert(0, url.to_string());
        self.urls.truncate(HISTORY_MAX);
        self.save()
    }

    /// Drop all entries and persist the empty list.
    pub fn clear(&mut self) -> Result<()> {
        self.urls.clear();
        self.save()
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    /// Persist with temp-file + atomic-rename under an exclusive lock.
    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        let _lock_guard = acquire_exclusive_lock(&self.lock_path(), LOCK_TIMEOUT)?;

        let content = serde_json::to_string_pretty(&self.urls)
            .context("Failed to serialize URL history")?;

        let temp_path = self.path.with_extension("tmp");
        {
            let mut temp_file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;
            temp_file
                .write_all(content.as_bytes())
                .context("Failed to write history temp file")?;
            temp_file
                .sync_all()
                .context("Failed to sync history temp file")?;
        }

        // Atomic on POSIX, best-effort on Windows; the lock is still held.
        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to rename {:?} -> {:?}", temp_path, self.path))?;

        Ok(())
    }
}

fn read_urls(path: &Path) -> Option<Vec<String>> {
    if !path.is_file() {
        return None;
    }

    let lock_path = path.with_extension("lock");
    let lock_file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .ok()?;
    acquire_shared_lock(&lock_file, LOCK_TIMEOUT).ok()?;

    let content = fs::read_to_string(path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&content).ok()?;
    let entries = value.as_array()?;

    let mut urls: Vec<String> = entries
        .iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .collect();
    urls.truncate(HISTORY_MAX);
    Some(urls)
}

/// Acquire an exclusive lock on `path`, retrying until `timeout` expires.
fn acquire_exclusive_lock(path: &Path, timeout: Duration) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory for lock file: {:?}", parent))?;
    }

    let lock_file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("Failed to open lock file: {:?}", path))?;

    let start = Instant::now();
    loop {
        match FileExt::try_lock_exclusive(&lock_file) {
            Ok(()) => return Ok(lock_file),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                if start.elapsed() >= timeout {
                    bail!(
                        "Timed out waiting for exclusive lock on {:?} after {:?}. \
                         Another instance may be writing the history file.",
                        path,
                        timeout
                    );
                }
                thread::sleep(LOCK_RETRY_INTERVAL);
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to acquire exclusive lock on {:?}", path));
            }
        }
    }
}

/// Acquire a shared lock on an already-open lock file.
fn acquire_shared_lock(file: &File, timeout: Duration) -> Result<()> {
    let start = Instant::now();
    loop {
        match FileExt::try_lock_shared(file) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                if start.elapsed() >= timeout {
                    bail!("Timed out waiting for shared lock after {:?}", timeout);
                }
                thread::sleep(LOCK_RETRY_INTERVAL);
            }
            Err(e) => return Err(e).context("Failed to acquire shared lock on history file"),
        }
    }
}
