// Copyright (c) 2025 Flavio Neto
// Licensed under the MIT License. See LICENSE file for details.

//! Parser for `mega-transfers` console output.
//!
//! MEGAcmd prints the transfer listing as free-form text rather than anything
//! machine-readable, so this module scrapes it. Two line shapes are accepted:
//!
//! - the native format, one row per transfer with a direction glyph:
//!   `⇓    76  /path/to/file.mkv  5.42% of  455.34 MB ACTIVE`
//! - the simplified format emitted in simulate mode:
//!   `1         ACTIVE    12%       /data/sample_file.zip`
//!
//! Parsing is total: a line that matches neither shape and is not a header is
//! dropped without comment. Re-parsing the same text always yields the same
//! records.

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{truncate_filename, Direction, TransferRecord, TransferState, UNKNOWN_SIZE};

/// A line containing every one of these is the listing's column header.
const HEADER_KEYWORDS: [&str; 3] = ["TYPE", "TAG", "STATE"];

/// Simplified format: `<tag> <STATE> <pct>% <path>`.
static SIMPLE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s+(\w+)\s+(\d+)%\s+(.+)$").unwrap());

/// Native format: direction glyph, tag, path, `<pct>% of <size> <unit>`, state.
/// The path is matched lazily so the percent/size/state tail anchors the split.
static NATIVE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([⇓↑])\s+(\d+)\s+(.*?)\s+(\d+(?:\.\d+)?)\s*%\s+of\s+([\d.]+)\s*([KMGT]?B)\s+(\w+)\s*$")
        .unwrap()
});

/// Parse a raw `mega-transfers` blob into transfer records, in input order.
///
/// Header lines, blank lines, and anything unrecognizable are skipped; this
/// never fails. Known limitation: a path that genuinely contains a literal
/// `...` is indistinguishable from MEGAcmd's middle-truncation marker, so the
/// filename is always re-derived from the text after the last `...`.
pub fn parse_listing(raw: &str) -> Vec<TransferRecord> {
    let mut records = Vec::new();
    if raw.trim().is_empty() {
        return records;
    }

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if HEADER_KEYWORDS.iter().all(|kw| line.contains(kw)) {
            continue;
        }

        if let Some(caps) = SIMPLE_LINE.captures(line) {
            records.push(parse_simple(&caps));
            continue;
        }
        if let Some(caps) = NATIVE_LINE.captures(line) {
            records.push(parse_native(&caps));
            continue;
        }

        tracing::debug!(line, "skipping unparseable listing line");
    }

    records
}

fn parse_simple(caps: &regex::Captures<'_>) -> TransferRecord {
    let path = caps[4].trim().to_string();
    let filename = truncate_filename(&last_segment(&path));

    TransferRecord {
        tag: caps[1].to_string(),
        direction: Direction::Download,
        state: TransferState::from_token(&caps[2]),
        // Parsed as float even though this grammar only emits integers, so
        // both grammars land in the same representation.
        progress_pct: caps[3].parse().unwrap_or(0.0),
        path,
        filename,
        size_display: UNKNOWN_SIZE.to_string(),
    }
}

fn parse_native(caps: &regex::Captures<'_>) -> TransferRecord {
    let direction = if &caps[1] == "↑" {
        Direction::Upload
    } else {
        Direction::Download
    };
    let path = caps[3].trim().to_string();

    let mut filename = last_segment(&path);
    // MEGAcmd middle-truncates long paths with "..."; the leading half is
    // useless for naming, so re-derive from whatever follows the last marker.
    if path.contains("...") && path.contains('/') {
        if let Some(after) = path.rsplit("...").next() {
            if after.contains('/') {
                filename = last_segment(after.trim());
            }
        }
    }
    filename = truncate_filename(&filename);
    if filename.is_empty() {
        filename = UNKNOWN_SIZE.to_string();
    }

    TransferRecord {
        tag: caps[2].to_string(),
        direction,
        state: TransferState::from_token(&caps[7]),
        progress_pct: caps[4].parse().unwrap_or(0.0),
        path,
        filename,
        size_display: format!("{} {}", &caps[5], &caps[6]),
    }
}

/// Last `/`-delimited segment, or the whole string when there is no slash.
fn last_segment(path: &str) -> String {
    match path.rsplit('/').next() {
        Some(seg) if !seg.is_empty() => seg.trim().to_string(),
        _ => path.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMULATED_LISTING: &str = "\n\
        TRANSFER  STATE     PROGRESS  PATH\n\
        1         ACTIVE    12%       /data/sample_file.zip\n\
        2         QUEUED    0%        /data/another_file.pdf\n";

    #[test]
    fn test_simple_format() {
        let records = parse_listing(SIMULATED_LISTING);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].tag, "1");
        assert_eq!(records[0].state, TransferState::Active);
        assert_eq!(records[0].progress_pct, 12.0);
        assert_eq!(records[0].path, "/data/sample_file.zip");
        assert_eq!(records[0].filename, "sample_file.zip");
        assert_eq!(records[0].size_display, UNKNOWN_SIZE);

        assert_eq!(records[1].tag, "2");
        assert_eq!(records[1].state, TransferState::Queued);
    }

    #[test]
    fn test_native_format() {
        let raw = "⇓    1234  /Downloads/ubuntu-22.04.iso  45.2% of  3.54 GB ACTIVE";
        let records = parse_listing(raw);
        assert_eq!(records.len(), 1);

        let r = &records[0];
        assert_eq!(r.tag, "1234");
        assert_eq!(r.direction, Direction::Download);
        assert_eq!(r.progress_pct, 45.2);
        assert_eq!(r.size_display, "3.54 GB");
        assert_eq!(r.state, TransferState::Active);
        assert_eq!(r.filename, "ubuntu-22.04.iso");
    }

    #[test]
    fn test_native_upload_glyph() {
        let raw = "↑    5678  /Uploads/video.mp4  78.5% of  1.23 GB ACTIVE";
        let records = parse_listing(raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].direction, Direction::Upload);
        assert_eq!(records[0].filename, "video.mp4");
    }

    #[test]
    fn test_native_bare_byte_unit() {
        let raw = "⇓    9  /tiny.txt  100% of  512 B COMPLETED";
        let records = parse_listing(raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].size_display, "512 B");
        assert_eq!(records[0].state, TransferState::Completed);
    }

    #[test]
    fn test_truncated_path_rederives_filename() {
        let raw = "⇓    42  /very/long/pre...fix/actual_name.mkv  5.4% of  455.34 MB RETRYING";
        let records = parse_listing(raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].filename, "actual_name.mkv");
        assert_eq!(records[0].state, TransferState::Retrying);
    }

    #[test]
    fn test_header_lines_skipped() {
        let raw = "TYPE TAG           SOURCEPATH  DESTINYPATH  PROGRESS  STATE\n\
                   ⇓    7  /a/b.zip  10.0% of  1.00 GB ACTIVE";
        let records = parse_listing(raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tag, "7");
    }

    #[test]
    fn test_junk_is_skipped_not_fatal() {
        let raw = "MEGAcmd is starting up\n\
                   please wait...\n\
                   [API:err: 509] rate limited\n";
        assert!(parse_listing(raw).is_empty());
        assert!(parse_listing("").is_empty());
        assert!(parse_listing("   \n  \n").is_empty());
    }

    #[test]
    fn test_parse_is_idempotent_and_ordered() {
        let raw = "\
            ⇓    1234  /Downloads/ubuntu-22.04.iso  45.2% of  3.54 GB ACTIVE\n\
            ↑    5678  /Uploads/video.mp4  78.5% of  1.23 GB ACTIVE\n\
            ⇓    9012  /Downloads/document.pdf  0.0% of  15.2 MB QUEUED\n";
        let first = parse_listing(raw);
        let second = parse_listing(raw);

        let tags: Vec<_> = first.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["1234", "5678", "9012"]);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.tag, b.tag);
            assert_eq!(a.progress_pct, b.progress_pct);
            assert_eq!(a.filename, b.filename);
        }
    }

    #[test]
    fn test_unrecognized_state_kept_verbatim() {
        let raw = "⇓    3  /x/y.bin  1.0% of  2.00 MB THROTTLED";
        let records = parse_listing(raw);
        assert_eq!(records[0].state.as_str(), "THROTTLED");
    }

    #[test]
    fn test_long_filename_truncated() {
        let name = "f".repeat(80);
        let raw = format!("⇓    5  /dir/{}  1.0% of  2.00 MB ACTIVE", name);
        let records = parse_listing(&raw);
        assert_eq!(records[0].filename.chars().count(), 60);
        assert!(records[0].filename.ends_with("..."));
    }

    #[test]
    fn test_sub_percent_precision_preserved() {
        let raw = "⇓    76  /path/to/file.mkv  5.42% of  455.34 MB ACTIVE";
        let records = parse_listing(raw);
        assert_eq!(records[0].progress_pct, 5.42);
    }
}
