// Copyright (c) 2025 Flavio Neto
// Licensed under the MIT License. See LICENSE file for details.

//! Unified ANSI color code definitions
//!
//! Single source of truth for all ANSI codes used throughout megactl, so
//! the listing, the log, and the doctor output stay visually consistent.
//!
//! Color usage conventions:
//! - RED = errors, failed transfers, cancel actions
//! - GREEN = success, ACTIVE transfers
//! - YELLOW = warnings, PAUSED and RETRYING transfers
//! - BLUE = QUEUED transfers, secondary info
//! - CYAN = info messages, prompts, branding
//! - GRAY = unrecognized states, subtle secondary text

use crate::transfers::TransferState;

/// Reset all formatting
pub const RESET: &str = "\x1b[0m";

/// Bold text
pub const BOLD: &str = "\x1b[1m";

/// Dimmed/faint text
pub const DIM: &str = "\x1b[2m";

/// Red text (errors, failed transfers)
pub const RED: &str = "\x1b[31m";

/// Green text (success, active transfers)
pub const GREEN: &str = "\x1b[32m";

/// Yellow text (warnings, paused/retrying transfers)
pub const YELLOW: &str = "\x1b[33m";

/// Blue text (queued transfers, secondary info)
pub const BLUE: &str = "\x1b[34m";

/// Cyan text (info messages, prompts, branding)
pub const CYAN: &str = "\x1b[36m";

/// White text (primary text content)
pub const WHITE: &str = "\x1b[37m";

/// Bright cyan text (branding, prominent elements)
pub const BRIGHT_CYAN: &str = "\x1b[96m";

/// Bright black (gray) for subtle secondary text
pub const GRAY: &str = "\x1b[90m";

/// Symbols for status and feedback (Unicode only, no emoji)
pub mod symbols {
    pub const SUCCESS: &str = "[OK]";
    pub const ERROR: &str = "[X]";
    pub const WARNING: &str = "[!]";
    pub const INFO: &str = "[i]";
    pub const ARROW: &str = "->";
    pub const BULLET: &str = "*";
}

/// Color for a transfer state badge.
pub fn state_color(state: &TransferState) -> &'static str {
    match state {
        TransferState::Active => GREEN,
        TransferState::Paused => YELLOW,
        TransferState::Queued => BLUE,
        TransferState::Retrying => YELLOW,
        TransferState::Completed => GREEN,
        TransferState::Failed => RED,
        TransferState::Other(_) => GRAY,
    }
}

/// Render a separator line
pub fn separator(width: usize) -> String {
    format!("{}{}{}", DIM, "─".repeat(width), RESET)
}

/// Render a progress bar (Unicode block chars for a cleaner look)
pub fn progress_bar(percent: usize, width: usize) -> String {
    let percent = percent.min(100);
    let filled = (percent * width) / 100;
    let empty = width.saturating_sub(filled);

    let color = if percent >= 100 { GREEN } else { CYAN };

    format!(
        "{}{}{}{} {}%{}",
        color,
        "█".repeat(filled),
        "░".repeat(empty),
        RESET,
        percent,
        RESET
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_colors() {
        assert_eq!(state_color(&TransferState::Active), GREEN);
        assert_eq!(state_color(&TransferState::Failed), RED);
        assert_eq!(state_color(&TransferState::Other("THROTTLED".into())), GRAY);
    }

    #[test]
    fn test_progress_bar_clamped() {
        let bar = progress_bar(150, 10);
        assert!(bar.contains("100%"));
        assert!(bar.contains(&"█".repeat(10)));
    }
}
