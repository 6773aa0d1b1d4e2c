// Copyright (c) 2025 Flavio Neto
// Licensed under the MIT License. See LICENSE file for details.

//! Environment detection for megactl.
//!
//! Probes the host to answer three questions before anything else runs:
//!
//! 1. What kind of session is this (desktop, headless web, container)?
//! 2. Where should downloads land by default?
//! 3. Where do the MEGAcmd binaries live, and is the background server
//!    binary among them?
//!
//! Everything here is a leaf: plain synchronous probes with no dependencies
//! on the rest of the crate.

use std::env;
use std::path::{Path, PathBuf};

/// Default MEGAcmd install location inside the macOS app bundle.
#[cfg(target_os = "macos")]
const MACOS_MEGACMD_DIR: &str = "/Applications/MEGAcmd.app/Contents/MacOS";

/// How the current session presents its UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Interactive terminal on a desktop session
    Desktop,
    /// Headless host; suitable for serving rather than direct interaction
    Web,
    /// Inside a container (downloads default to /data/)
    Container,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Desktop => write!(f, "desktop"),
            Self::Web => write!(f, "web"),
            Self::Container => write!(f, "container"),
        }
    }
}

/// True when running inside a container.
pub fn in_container() -> bool {
    Path::new("/.dockerenv").exists()
        || env::var_os("container").map_or(false, |v| !v.is_empty())
}

/// Probe the session type.
///
/// `MEGACTL_FORCE_WEB` forces web mode; containers always count as
/// containers; a Linux session without `DISPLAY` is treated as headless.
pub fn run_mode() -> RunMode {
    if in_container() {
        return RunMode::Container;
    }
    if env::var("MEGACTL_FORCE_WEB").map(|v| crate::config::truthy(&v)).unwrap_or(false) {
        return RunMode::Web;
    }
    if cfg!(target_os = "linux") && env::var_os("DISPLAY").is_none() {
        return RunMode::Web;
    }
    RunMode::Desktop
}

/// Platform-aware default download directory.
///
/// `/data/` in containers, the user's Downloads directory elsewhere.
pub fn default_download_dir() -> PathBuf {
    if in_container() {
        return PathBuf::from("/data/");
    }
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// MEGAcmd install directory: `MEGACMD_PATH` override, else the macOS app
/// bundle when present. `None` means the system path alone has to suffice.
pub fn megacmd_install_dir() -> Option<PathBuf> {
    if let Ok(configured) = env::var("MEGACMD_PATH") {
        let configured = configured.trim();
        if !configured.is_empty() {
            return Some(PathBuf::from(configured));
        }
    }
    #[cfg(target_os = "macos")]
    {
        let bundle = Path::new(MACOS_MEGACMD_DIR);
        if bundle.is_dir() {
            return Some(bundle.to_path_buf());
        }
    }
    None
}

/// `PATH` value for child processes, with the MEGAcmd install directory
/// prepended so a locally installed copy wins over whatever is on the
/// system path.
pub fn subprocess_path() -> String {
    let base = env::var("PATH").unwrap_or_default();
    match megacmd_install_dir() {
        Some(dir) => join_path_entries(&dir, &base),
        None => base,
    }
}

fn join_path_entries(prefix: &Path, base: &str) -> String {
    let sep = if cfg!(windows) { ';' } else { ':' };
    if base.is_empty() {
        prefix.display().to_string()
    } else {
        format!("{}{}{}", prefix.display(), sep, base)
    }
}

/// `which`-style lookup of an executable across a `PATH` string.
pub fn find_in_path(name: &str, path: &str) -> Option<PathBuf> {
    let sep = if cfg!(windows) { ';' } else { ':' };
    for dir in path.split(sep).filter(|d| !d.is_empty()) {
        let candidate = Path::new(dir).join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = Path::new(dir).join(format!("{}.exe", name));
            if exe.is_file() {
                return Some(exe);
            }
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.is_file()
        && std::fs::metadata(path)
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// The MEGAcmd background-server binary, when one can be located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerBinary {
    /// `mega-cmd-server`: headless, safe to spawn detached.
    Headless(PathBuf),
    /// The macOS `MEGAcmd` bundle binary. Launching it opens a GUI window,
    /// so callers should only wait for it, never start it.
    AppBundle(PathBuf),
}

/// Locate the background-server binary on the augmented path.
///
/// Linux installs ship `mega-cmd-server`; the macOS bundle has no headless
/// server, only the `MEGAcmd` app binary that starts one when opened.
pub fn server_binary() -> Option<ServerBinary> {
    let path = subprocess_path();
    if path.is_empty() {
        return None;
    }
    if let Some(found) = find_in_path("mega-cmd-server", &path) {
        return Some(ServerBinary::Headless(found));
    }
    #[cfg(target_os = "macos")]
    {
        if let Some(dir) = megacmd_install_dir() {
            let app = dir.join("MEGAcmd");
            if is_executable(&app) {
                return Some(ServerBinary::AppBundle(app));
            }
        }
    }
    None
}
