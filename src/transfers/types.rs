// Copyright (c) 2025 Flavio Neto
// Licensed under the MIT License. See LICENSE file for details.

//! Transfer record types shared by the parser, the monitor, and the view.

use serde::{Deserialize, Serialize};

/// Sentinel shown when the listing line carried no parseable size.
pub const UNKNOWN_SIZE: &str = "Unknown";

/// Filenames longer than this are truncated for display.
pub const MAX_FILENAME_DISPLAY: usize = 60;

/// State of a single transfer as reported by MEGAcmd.
///
/// Values MEGAcmd may grow in the future are passed through verbatim as
/// `Other` so they still render instead of disappearing from the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransferState {
    /// Currently moving bytes
    Active,
    /// Paused by the user
    Paused,
    /// Waiting in the transfer queue
    Queued,
    /// Stalled and being retried by the server
    Retrying,
    /// Finished successfully
    Completed,
    /// Gave up
    Failed,
    /// Any state token this version does not know about
    Other(String),
}

impl TransferState {
    /// Parse a state token from the listing output.
    pub fn from_token(token: &str) -> Self {
        match token {
            "ACTIVE" => Self::Active,
            "PAUSED" => Self::Paused,
            "QUEUED" => Self::Queued,
            "RETRYING" => Self::Retrying,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }

    /// The state exactly as MEGAcmd spells it.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "ACTIVE",
            Self::Paused => "PAUSED",
            Self::Queued => "QUEUED",
            Self::Retrying => "RETRYING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Other(s) => s,
        }
    }

    /// Returns true while the transfer is still being worked on.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Active | Self::Queued | Self::Retrying | Self::Paused)
    }

    /// Returns true once the transfer can no longer make progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl From<String> for TransferState {
    fn from(s: String) -> Self {
        Self::from_token(&s)
    }
}

impl From<TransferState> for String {
    fn from(state: TransferState) -> Self {
        state.as_str().to_string()
    }
}

impl std::fmt::Display for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direction glyph from the native listing format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Download,
    Upload,
}

impl Direction {
    /// The glyph MEGAcmd prints in front of the row.
    pub fn glyph(&self) -> char {
        match self {
            Self::Download => '⇓',
            Self::Upload => '↑',
        }
    }
}

/// One row of the transfer listing.
///
/// Records carry no identity across polls: every poll tick rebuilds the full
/// list from scratch, so nothing here should be treated as stable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Opaque identifier used to target cancel/pause/resume. Kept as a
    /// string so non-numeric tags keep working if MEGAcmd ever emits them.
    pub tag: String,
    pub direction: Direction,
    pub state: TransferState,
    /// Progress in [0, 100].
    pub progress_pct: f64,
    /// The path column as printed, possibly middle-truncated with "...".
    pub path: String,
    /// Last path segment, truncated to [`MAX_FILENAME_DISPLAY`] characters.
    pub filename: String,
    /// Human-readable size ("455.34 MB") or [`UNKNOWN_SIZE`].
    pub size_display: String,
}

impl TransferRecord {
    /// Progress as a fraction in [0, 1], for progress-bar rendering.
    pub fn progress_fraction(&self) -> f64 {
        (self.progress_pct / 100.0).clamp(0.0, 1.0)
    }

    /// "12% of 455.34 MB", or just "12%" when the size is unknown.
    pub fn progress_display(&self) -> String {
        if self.size_display == UNKNOWN_SIZE {
            format!("{:.0}%", self.progress_pct)
        } else {
            format!("{:.0}% of {}", self.progress_pct, self.size_display)
        }
    }
}

/// Truncate a filename for display, keeping the first 57 characters.
pub fn truncate_filename(name: &str) -> String {
    if name.chars().count() > MAX_FILENAME_DISPLAY {
        let head: String = name.chars().take(MAX_FILENAME_DISPLAY - 3).collect();
        format!("{}...", head)
    } else {
        name.to_string()
    }
}
