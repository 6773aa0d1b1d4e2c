// Copyright (c) 2025 Flavio Neto
// Licensed under the MIT License. See LICENSE file for details.

//! Consistent error formatting for megactl.
//!
//! Utilities to format user-facing errors with possible causes and
//! actionable fixes, so "mega-get: No such file or directory" becomes
//! something a person can act on.

use std::fmt;

/// GitHub issues URL for support.
pub const GITHUB_ISSUES_URL: &str = "https://github.com/megactl/megactl/issues";

/// Formats an error message with title, causes, fixes, and help link.
///
/// # Example
///
/// ```
/// use megactl::error::format_error;
///
/// let error = format_error(
///     "Could not run mega-get",
///     &[
///         "MEGAcmd is not installed",
///         "MEGAcmd installed outside the system PATH",
///     ],
///     &[
///         "Install MEGAcmd: https://mega.io/cmd",
///         "Point MEGACMD_PATH at the install directory",
///     ],
/// );
/// println!("{}", error);
/// ```
pub fn format_error(title: &str, causes: &[&str], fixes: &[&str]) -> String {
    let mut output = String::new();

    output.push_str(&format!("[X] {}\n\n", title));

    if !causes.is_empty() {
        output.push_str("Possible causes:\n");
        for cause in causes {
            output.push_str(&format!("  - {}\n", cause));
        }
        output.push('\n');
    }

    if !fixes.is_empty() {
        output.push_str("Try these fixes:\n");
        for (i, fix) in fixes.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", i + 1, fix));
        }
        output.push('\n');
    }

    output.push_str(&format!("Need help? {}", GITHUB_ISSUES_URL));

    output
}

/// Formats a simple error with just a title and help link.
pub fn format_simple_error(title: &str) -> String {
    format!("[X] {}\n\nNeed help? {}", title, GITHUB_ISSUES_URL)
}

/// Builder for constructing formatted error messages.
#[derive(Debug, Clone)]
pub struct ErrorBuilder {
    title: String,
    causes: Vec<String>,
    fixes: Vec<String>,
}

impl ErrorBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            causes: Vec::new(),
            fixes: Vec::new(),
        }
    }

    pub fn cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    pub fn fix(mut self, fix: impl Into<String>) -> Self {
        self.fixes.push(fix.into());
        self
    }

    pub fn build(self) -> String {
        let causes: Vec<&str> = self.causes.iter().map(|s| s.as_str()).collect();
        let fixes: Vec<&str> = self.fixes.iter().map(|s| s.as_str()).collect();
        format_error(&self.title, &causes, &fixes)
    }
}

impl fmt::Display for ErrorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clone().build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error() {
        let error = format_error("Test Error", &["Cause 1"], &["Fix 1", "Fix 2"]);
        assert!(error.contains("[X] Test Error"));
        assert!(error.contains("  - Cause 1"));
        assert!(error.contains("  1. Fix 1"));
        assert!(error.contains("  2. Fix 2"));
        assert!(error.contains(GITHUB_ISSUES_URL));
    }

    #[test]
    fn test_empty_sections_omitted() {
        let error = format_error("Empty test", &[], &[]);
        assert!(!error.contains("Possible causes:"));
        assert!(!error.contains("Try these fixes:"));
    }

    #[test]
    fn test_error_builder() {
        let error = ErrorBuilder::new("Builder test")
            .cause("Test cause")
            .fix("Test fix")
            .build();
        assert!(error.contains("[X] Builder test"));
        assert!(error.contains("Test cause"));
        assert!(error.contains("Test fix"));
    }
}
