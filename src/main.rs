// Copyright (c) 2025 Flavio Neto
// Licensed under the MIT License. See LICENSE file for details.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use crossterm::{
    cursor,
    terminal::{Clear, ClearType},
    ExecutableCommand,
};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use unicode_width::UnicodeWidthStr;

use megactl::colors::*;
use megactl::transfers::{parse_listing, snapshot, SessionState, TransferMonitor, TransferRecord};
use megactl::{
    ensure_server_running, has_critical, resilient_write, run_health_check, ErrorBuilder,
    MegaClient, Settings, Severity, TransferAction, UrlHistory, UNKNOWN_SIZE,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit codes following sysexits.h conventions
/// These provide meaningful exit status to calling processes and scripts
mod exit_codes {
    /// Success - operation completed successfully
    pub const SUCCESS: i32 = 0;
    /// General error - unspecified error
    pub const ERROR: i32 = 1;
    /// Usage error - invalid command line arguments
    pub const USAGE: i32 = 64;
    /// Service unavailable - MEGAcmd missing or its server unreachable
    pub const SERVICE_UNAVAILABLE: i32 = 69;
}

use exit_codes::*;

/// Spinner helpers for consistent progress indicators
mod spinner {
    use indicatif::{ProgressBar, ProgressStyle};
    use std::time::Duration;

    /// Create a spinner with consistent styling
    pub fn create(message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .tick_chars("\u{28FB}\u{28F9}\u{28FC}\u{28F8}\u{28FE}\u{28F6}\u{28F7}\u{28E7}\u{28CF}\u{28DF} ")
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
        spinner
    }

    /// Finish spinner with success message
    pub fn finish_success(spinner: &ProgressBar, message: &str) {
        spinner.finish_and_clear();
        println!("\x1b[32m[OK]\x1b[0m {}", message);
    }

    /// Finish spinner with warning message
    pub fn finish_warning(spinner: &ProgressBar, message: &str) {
        spinner.finish_and_clear();
        println!("\x1b[33m[!]\x1b[0m {}", message);
    }

    /// Finish spinner with error message
    pub fn finish_error(spinner: &ProgressBar, message: &str) {
        spinner.finish_and_clear();
        println!("\x1b[31m[X]\x1b[0m {}", message);
    }
}

/// Strip ANSI escape codes from a string for accurate display width calculation
fn strip_ansi_codes(s: &str) -> String {
    let re = regex::Regex::new(r"\x1b\[[0-9;]*m").unwrap();
    re.replace_all(s, "").to_string()
}

/// Calculate the display width of a string, accounting for ANSI escape codes and unicode
fn display_width(s: &str) -> usize {
    let stripped = strip_ansi_codes(s);
    UnicodeWidthStr::width(stripped.as_str())
}

/// Pad a string to a target width, correctly accounting for ANSI escape codes
fn pad_display(s: &str, target_width: usize) -> String {
    let current_width = display_width(s);
    if current_width >= target_width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(target_width - current_width))
    }
}

/// megactl - MEGAcmd front-end. Add, watch, and control MEGA transfers without the shell.
#[derive(Parser)]
#[command(name = "megactl")]
#[command(version = VERSION)]
#[command(about = "MEGAcmd front-end. Add, watch, and control MEGA transfers without the shell.")]
#[command(long_about = "megactl - MEGA transfers without the shell\n\n\
    Start a download:    megactl get https://mega.nz/...\n\
    Watch transfers:     megactl (or: megactl watch)\n\
    One-shot listing:    megactl list (or: megactl ls)\n\
    Pause everything:    megactl pause --all\n\
    Recent URLs:         megactl history\n\
    Get help:            megactl doctor\n\n\
    Needs MEGAcmd installed, or MEGA_SIMULATE=1 to try it without.")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// MEGA URL to download (shortcut for `megactl get <URL>`)
    url: Option<String>,

    /// Quiet mode: minimal output, only essential information
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Verbose mode: detailed output for debugging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start downloading a MEGA URL
    ///
    /// Examples:
    ///   megactl get https://mega.nz/file/xxxx#yyyy
    ///   megactl get            (pick from recent URLs)
    Get {
        /// The MEGA URL; omit to pick one from history
        url: Option<String>,
    },

    /// Show the current transfers once
    ///
    /// Examples:
    ///   megactl list
    ///   megactl ls --json
    #[command(alias = "ls")]
    List {
        /// Emit the parsed records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Live transfer view, refreshed on every poll
    ///
    /// Examples:
    ///   megactl watch
    ///   megactl w
    #[command(alias = "w")]
    Watch,

    /// Cancel a transfer by tag, or all of them
    ///
    /// Examples:
    ///   megactl cancel 1234
    ///   megactl cancel --all
    Cancel {
        /// Transfer tag from `megactl list`
        tag: Option<String>,
        /// Target every transfer
        #[arg(long, conflicts_with = "tag")]
        all: bool,
    },

    /// Pause a transfer by tag, or all of them
    Pause {
        /// Transfer tag from `megactl list`
        tag: Option<String>,
        /// Target every transfer
        #[arg(long, conflicts_with = "tag")]
        all: bool,
    },

    /// Resume a transfer by tag, or all of them
    Resume {
        /// Transfer tag from `megactl list`
        tag: Option<String>,
        /// Target every transfer
        #[arg(long, conflicts_with = "tag")]
        all: bool,
    },

    /// Show or clear the recent-URL history
    ///
    /// Examples:
    ///   megactl history
    ///   megactl history clear
    History {
        #[command(subcommand)]
        command: Option<HistoryCommands>,
    },

    /// Diagnose the environment and MEGAcmd installation
    ///
    /// Example:
    ///   megactl doctor
    Doctor,

    /// Start the MEGAcmd background server and wait until it is ready
    ///
    /// Example:
    ///   megactl server
    Server,
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// Forget every remembered URL
    Clear,
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn print_banner(settings: &Settings) {
    println!();
    println!("{BRIGHT_CYAN}{BOLD}megactl{RESET} {DIM}v{VERSION}{RESET}");
    println!("{DIM}Downloads: {}  Mode: {}{RESET}", settings.download_dir.display(), settings.run_mode);
    println!();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::from_env();
    let code = run(cli, &settings).await;
    std::process::exit(code);
}

async fn run(cli: Cli, settings: &Settings) -> i32 {
    match cli.command {
        Some(Commands::Get { url }) => cmd_get(settings, url, cli.quiet).await,
        Some(Commands::List { json }) => cmd_list(settings, json).await,
        Some(Commands::Watch) => cmd_watch(settings, cli.quiet).await,
        Some(Commands::Cancel { tag, all }) => {
            cmd_action(settings, TransferAction::Cancel, tag, all).await
        }
        Some(Commands::Pause { tag, all }) => {
            cmd_action(settings, TransferAction::Pause, tag, all).await
        }
        Some(Commands::Resume { tag, all }) => {
            cmd_action(settings, TransferAction::Resume, tag, all).await
        }
        Some(Commands::History { command }) => cmd_history(command),
        Some(Commands::Doctor) => cmd_doctor(settings).await,
        Some(Commands::Server) => cmd_server(settings).await,
        None => match cli.url {
            Some(url) => cmd_get(settings, Some(url), cli.quiet).await,
            None => cmd_watch(settings, cli.quiet).await,
        },
    }
}

/// Offer the recent URLs when `get` is called without one.
fn pick_from_history(history: &UrlHistory) -> Result<String> {
    if history.is_empty() {
        anyhow::bail!("No URL given and no history to pick from. Run: megactl get <URL>");
    }
    if !atty::is(atty::Stream::Stdin) {
        anyhow::bail!("No URL given; pass one as an argument when not running interactively");
    }
    let options: Vec<String> = history.urls().to_vec();
    inquire::Select::new("Pick a recent MEGA URL:", options)
        .prompt()
        .context("Failed to get selection")
}

async fn cmd_get(settings: &Settings, url: Option<String>, quiet: bool) -> i32 {
    let mut history = UrlHistory::load();

    let url = match url {
        Some(u) => u,
        None => match pick_from_history(&history) {
            Ok(u) => u,
            Err(e) => {
                eprintln!("{YELLOW}{}{RESET} {}", symbols::WARNING, e);
                return USAGE;
            }
        },
    };
    let url = url.trim().to_string();
    if url.is_empty() {
        eprintln!("{YELLOW}{}{RESET} Please enter a MEGA URL", symbols::WARNING);
        return USAGE;
    }

    if let Err(e) = std::fs::create_dir_all(&settings.download_dir) {
        eprintln!(
            "{YELLOW}{}{RESET} Could not create {}: {}",
            symbols::WARNING,
            settings.download_dir.display(),
            e
        );
    }
    if let Err(e) = history.record(&url) {
        tracing::warn!(error = %e, "could not persist URL history");
    }

    let client = MegaClient::from_settings(settings);

    // Non-container runs own the server lifecycle; containers and canned
    // modes short-circuit inside ensure_server_running.
    if !settings.simulate && !settings.ui_test_mode {
        let sp = spinner::create("Initializing MEGAcmd...");
        if ensure_server_running(settings, &client).await {
            sp.finish_and_clear();
        } else {
            spinner::finish_warning(
                &sp,
                "MEGAcmd server not detected. The download may not start until it is up.",
            );
        }
    }

    if !quiet {
        println!("Starting download to {}...", settings.download_dir.display());
    }
    let sp = spinner::create("Talking to MEGAcmd...");
    match client.start_download(&url).await {
        Ok(invocation) if invocation.success() => {
            spinner::finish_success(&sp, "Download started successfully");
            if !quiet {
                println!("{DIM}Watch progress with: megactl watch{RESET}");
            }
            SUCCESS
        }
        Ok(invocation) => {
            spinner::finish_error(&sp, "Unable to start the download");
            let err = invocation.stderr.trim();
            if !err.is_empty() {
                eprintln!("Details: {}", err);
            }
            ERROR
        }
        Err(e) => {
            spinner::finish_error(&sp, &format!("{:#}", e));
            eprintln!();
            eprintln!(
                "{}",
                ErrorBuilder::new("Could not run mega-get")
                    .cause("MEGAcmd is not installed")
                    .cause("MEGAcmd installed outside the system PATH")
                    .fix("Install MEGAcmd: https://mega.io/cmd")
                    .fix("Point MEGACMD_PATH at the install directory")
                    .fix("Check the setup: megactl doctor")
                    .build()
            );
            SERVICE_UNAVAILABLE
        }
    }
}

async fn cmd_list(settings: &Settings, json: bool) -> i32 {
    let client = MegaClient::from_settings(settings);
    let raw = match client.list_transfers().await {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!(
                "{}",
                ErrorBuilder::new(format!("Could not list transfers: {:#}", e))
                    .fix("Install MEGAcmd: https://mega.io/cmd")
                    .fix("Check the setup: megactl doctor")
                    .build()
            );
            return SERVICE_UNAVAILABLE;
        }
    };

    let records = parse_listing(&raw);

    if json {
        match serde_json::to_string_pretty(&records) {
            Ok(out) => {
                println!("{}", out);
                return SUCCESS;
            }
            Err(e) => {
                eprintln!("{RED}{}{RESET} Could not serialize records: {}", symbols::ERROR, e);
                return ERROR;
            }
        }
    }

    if records.is_empty() {
        if raw.trim().is_empty() {
            println!("No active transfers");
            println!("{DIM}Start one with: megactl get <URL>{RESET}");
        } else {
            print_unparsed_notice(&raw);
        }
        return SUCCESS;
    }

    render_table(&records);
    SUCCESS
}

/// The tool said something, but none of it parsed as transfer rows.
fn print_unparsed_notice(raw: &str) {
    println!("{YELLOW}{}{RESET} Unable to parse transfer data", symbols::WARNING);
    println!("{DIM}Raw output:{RESET}");
    let tail: String = raw.trim().chars().take(500).collect();
    for line in tail.lines() {
        println!("  {GRAY}{}{RESET}", line);
    }
    if raw.trim().chars().count() > 500 {
        println!("  {GRAY}...{RESET}");
    }
}

fn render_table(records: &[TransferRecord]) {
    let names: Vec<String> = records
        .iter()
        .map(|r| format!("{} {}", r.direction.glyph(), r.filename))
        .collect();
    let name_width = names
        .iter()
        .map(|n| display_width(n))
        .max()
        .unwrap_or(4)
        .clamp(4, 44);

    println!(
        "{DIM}{}  {}  {}{RESET}",
        pad_display("TAG", 6),
        pad_display("NAME", name_width),
        "PROGRESS"
    );
    for (record, name) in records.iter().zip(names.iter()) {
        let color = state_color(&record.state);
        let bar = progress_bar(record.progress_pct.round() as usize, 20);
        let size = if record.size_display == UNKNOWN_SIZE {
            String::new()
        } else {
            format!(" of {}", record.size_display)
        };
        println!(
            "{}  {}  {}{}  {}{}{}",
            pad_display(&record.tag, 6),
            pad_display(name, name_width),
            bar,
            size,
            color,
            record.state,
            RESET
        );
    }
}

async fn cmd_watch(settings: &Settings, quiet: bool) -> i32 {
    let client = Arc::new(MegaClient::from_settings(settings));

    if !atty::is(atty::Stream::Stdout) {
        // Piped output gets one snapshot instead of a redraw loop.
        return cmd_list(settings, false).await;
    }

    if !quiet {
        print_banner(settings);
    }
    if !settings.simulate && !settings.ui_test_mode {
        let sp = spinner::create("Initializing MEGAcmd...");
        if ensure_server_running(settings, &client).await {
            spinner::finish_success(
                &sp,
                &format!(
                    "MEGAcmd ready. Downloads will be saved to: {}",
                    settings.download_dir.display()
                ),
            );
        } else {
            spinner::finish_warning(
                &sp,
                "MEGAcmd server not detected. Transfers will appear once it is up.",
            );
        }
    }
    if let Err(e) = std::fs::create_dir_all(&settings.download_dir) {
        tracing::warn!(error = %e, "could not create download directory");
    }

    let monitor = TransferMonitor::start(client, settings.poll_interval);
    let state = monitor.state();
    {
        let mut guard = resilient_write(&state);
        if settings.ui_test_mode {
            guard.push_message(format!(
                "{} UI test mode - showing sample transfers",
                symbols::INFO
            ));
        }
        if settings.simulate {
            guard.push_message(format!(
                "{} Simulation mode (MEGA_SIMULATE=1) - no MEGAcmd required",
                symbols::INFO
            ));
        }
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        if let Err(e) = ctrlc::set_handler(move || running.store(false, Ordering::SeqCst)) {
            tracing::warn!(error = %e, "could not install Ctrl+C handler");
        }
    }

    let mut refresh = monitor.refresh();
    while running.load(Ordering::SeqCst) {
        // Wake on every state write, but also on a short timer so Ctrl+C is
        // noticed between polls.
        let _ = tokio::time::timeout(Duration::from_millis(250), refresh.changed()).await;
        if let Err(e) = redraw(&state, settings) {
            tracing::warn!(error = %e, "redraw failed");
        }
    }

    let _ = monitor.shutdown().await;
    println!();
    println!("{}", "Stopped.".dimmed());
    SUCCESS
}

/// Repaint the live view from the current session state.
fn redraw(state: &Arc<RwLock<SessionState>>, settings: &Settings) -> io::Result<()> {
    let (records, messages, unparsed, raw) = snapshot(state);

    let mut stdout = io::stdout();
    stdout.execute(Clear(ClearType::All))?;
    stdout.execute(cursor::MoveTo(0, 0))?;

    println!("{BRIGHT_CYAN}{BOLD}megactl{RESET} {DIM}v{VERSION}  ->  {}{RESET}", settings.download_dir.display());
    println!("{}", separator(60));

    if records.is_empty() {
        if unparsed {
            print_unparsed_notice(&raw);
        } else {
            println!("No active transfers");
            println!("{DIM}Add one with: megactl get <URL>{RESET}");
        }
    } else {
        render_table(&records);
    }

    println!("{}", separator(60));
    for line in messages.iter().rev().take(8).rev() {
        println!("{GRAY}{}{RESET}", line);
    }
    println!("{DIM}Press Ctrl+C to stop{RESET}");

    stdout.flush()
}

async fn cmd_action(
    settings: &Settings,
    action: TransferAction,
    tag: Option<String>,
    all: bool,
) -> i32 {
    if tag.is_none() && !all {
        eprintln!(
            "{YELLOW}{}{RESET} Provide a transfer tag (see: megactl list) or --all",
            symbols::WARNING
        );
        return USAGE;
    }
    let target = tag.clone().unwrap_or_else(|| "all".to_string());

    let client = MegaClient::from_settings(settings);
    match client.transfer_action(action, tag.as_deref()).await {
        Ok(invocation) => {
            let out = invocation.stdout.trim();
            if !out.is_empty() {
                println!("{}", out);
            }
            let err = invocation.stderr.trim();
            if !invocation.success() && !err.is_empty() {
                eprintln!("{RED}{}{RESET} {}", symbols::ERROR, err);
                ERROR
            } else {
                println!(
                    "{GREEN}{}{RESET} {} command sent for transfer {}",
                    symbols::SUCCESS,
                    action.verb(),
                    target
                );
                SUCCESS
            }
        }
        Err(e) => {
            eprintln!(
                "{}",
                ErrorBuilder::new(format!("Could not run mega-transfers: {:#}", e))
                    .fix("Install MEGAcmd: https://mega.io/cmd")
                    .fix("Check the setup: megactl doctor")
                    .build()
            );
            SERVICE_UNAVAILABLE
        }
    }
}

fn cmd_history(command: Option<HistoryCommands>) -> i32 {
    let mut history = UrlHistory::load();
    match command {
        Some(HistoryCommands::Clear) => match history.clear() {
            Ok(()) => {
                println!("{GREEN}{}{RESET} History cleared", symbols::SUCCESS);
                SUCCESS
            }
            Err(e) => {
                eprintln!("{RED}{}{RESET} Could not clear history: {:#}", symbols::ERROR, e);
                ERROR
            }
        },
        None => {
            if history.is_empty() {
                println!("No remembered URLs yet");
                println!("{DIM}They are recorded by: megactl get <URL>{RESET}");
                return SUCCESS;
            }
            for (i, url) in history.urls().iter().enumerate() {
                let shown = if url.chars().count() > 60 {
                    let head: String = url.chars().take(60).collect();
                    format!("{}...", head)
                } else {
                    url.clone()
                };
                println!("{} {}", format!("{:>3}.", i + 1).dimmed(), shown);
            }
            SUCCESS
        }
    }
}

async fn cmd_doctor(settings: &Settings) -> i32 {
    println!();
    println!("{CYAN}{BOLD}=== megactl doctor ==={RESET}");
    println!();

    let client = MegaClient::from_settings(settings);
    let issues = run_health_check(settings, &client).await;

    for issue in &issues {
        let (icon, color) = match issue.severity {
            Severity::Critical => (symbols::ERROR, RED),
            Severity::Warning => (symbols::WARNING, YELLOW),
            Severity::Info => (symbols::INFO, CYAN),
        };
        println!("{color}{icon}{RESET} {}: {}", issue.component, issue.message);
        if !issue.fix.is_empty() {
            println!("    {DIM}fix: {}{RESET}", issue.fix);
        }
    }
    println!();

    if has_critical(&issues) {
        println!("{RED}{}{RESET} Transfers cannot work until the critical issues are fixed", symbols::ERROR);
        SERVICE_UNAVAILABLE
    } else {
        println!("{GREEN}{}{RESET} Ready to transfer", symbols::SUCCESS);
        SUCCESS
    }
}

async fn cmd_server(settings: &Settings) -> i32 {
    let client = MegaClient::from_settings(settings);
    let sp = spinner::create("Initializing MEGAcmd...");
    if ensure_server_running(settings, &client).await {
        spinner::finish_success(
            &sp,
            &format!(
                "MEGAcmd ready. Downloads will be saved to: {}",
                settings.download_dir.display()
            ),
        );
        SUCCESS
    } else {
        spinner::finish_warning(
            &sp,
            "MEGAcmd server not detected. Open MEGAcmd (macOS) or install mega-cmd-server, then retry.",
        );
        SERVICE_UNAVAILABLE
    }
}
