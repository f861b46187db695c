//! CLI output formatting for every command.
//!
//! Progress and summaries go to stdout; diagnostics go through `tracing` to
//! stderr, so the two never interleave in a pipe.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Scanned /home/me/Pictures
//!     42 files: 3 new photos, 38 known, 1 skipped
//!     1 new set
//! Linked 5 sets, 45 photos (40 links)
//! ```
//!
//! ## Thumbs
//!
//! ```text
//! Thumbs for 45 photos (4 workers)
//! [ 1/45] IMG_0042.jpg
//!     big: derived, small: derived
//! [ 2/45] broken.jpg
//!     big: FAILED, small: derived
//! Thumbs: 45 photos: 87 derived, 2 cached, 1 failed (1 photos)
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::link::LinkReport;
use crate::scan::ScanReport;
use crate::thumbs::{ArtifactStatus, ThumbEvent, ThumbReport};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 photo`, `2 photos`.
fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Right-aligned `[ n/total]` progress counter.
fn progress(completed: usize, total: usize) -> String {
    let width = total.to_string().len();
    format!("[{completed:>width$}/{total}]")
}

fn status_label(status: Option<ArtifactStatus>) -> &'static str {
    match status {
        Some(ArtifactStatus::Derived) => "derived",
        Some(ArtifactStatus::Cached) => "cached",
        None => "FAILED",
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// Scan + link
// ============================================================================

pub fn format_scan_report(report: &ScanReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .roots
        .iter()
        .map(|root| format!("Scanned {}", root.display()))
        .collect();
    lines.push(format!(
        "{}{}: {}, {} known, {} skipped",
        indent(1),
        plural(report.files, "file"),
        plural(report.photos_created, "new photo"),
        report.photos_known,
        report.skipped
    ));
    lines.push(format!(
        "{}{}",
        indent(1),
        plural(report.sets_created, "new set")
    ));
    lines
}

pub fn print_scan_report(report: &ScanReport) {
    for line in format_scan_report(report) {
        println!("{}", line);
    }
}

pub fn format_link_report(report: &LinkReport) -> Vec<String> {
    vec![format!(
        "Linked {}, {} ({})",
        plural(report.sets, "set"),
        plural(report.photos, "photo"),
        plural(report.links, "link")
    )]
}

pub fn print_link_report(report: &LinkReport) {
    for line in format_link_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Thumbs
// ============================================================================

pub fn format_thumb_event(event: &ThumbEvent) -> Vec<String> {
    match event {
        ThumbEvent::Started { total, workers } => vec![format!(
            "Thumbs for {} ({})",
            plural(*total, "photo"),
            plural(*workers, "worker")
        )],
        ThumbEvent::PhotoDone {
            completed,
            total,
            path,
            big,
            small,
        } => vec![
            format!("{} {}", progress(*completed, *total), file_name(path)),
            format!(
                "{}big: {}, small: {}",
                indent(1),
                status_label(*big),
                status_label(*small)
            ),
        ],
    }
}

pub fn format_thumb_summary(report: &ThumbReport) -> Vec<String> {
    vec![format!("Thumbs: {}", report)]
}

pub fn print_thumb_summary(report: &ThumbReport) {
    for line in format_thumb_summary(report) {
        println!("{}", line);
    }
}
