//! CLI output formatting for builds and index maintenance.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! ==> Indexing /photos
//! Index: 1204 unchanged, 3 added, 1 modified, 2 deleted (1208 on disk)
//! ==> Converting and linking originals: 4 jobs for 4 files
//!     (1/4) media/converted/2021/IMG_0042.jpg
//!     (2/4) media/original/2021/IMG_0042.heic
//! ==> Resizing images, generating video covers: 12 jobs for 4 files
//!     (1/12) media/small/2021/IMG_0042.jpg
//!     (2/12) media/thumb/2021/broken.jpg FAILED
//!
//! Skipped 1 duplicate
//!     2021/IMG_0042 (1).jpg
//! Problems (1)
//!     2021/broken.jpg: Failed to decode ...
//! Built 1208 files: 15 of 16 jobs succeeded
//! ```
//!
//! ## Status
//!
//! ```text
//! Indexed: 1208 files (5 tombstones)
//! Pending: 3 added, 1 modified, 2 deleted
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::index::DeltaStats;
use crate::pipeline::{BuildEvent, BuildSummary, StatusReport};

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 file`, `2 files`.
fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn format_stats(stats: &DeltaStats) -> String {
    format!(
        "Index: {} unchanged, {} added, {} modified, {} deleted ({} on disk)",
        stats.unchanged, stats.added, stats.modified, stats.deleted, stats.total
    )
}

// ============================================================================
// Build
// ============================================================================

/// Format one progress event.
///
/// Indexing progress is only shown for the last file, so large libraries do
/// not flood the terminal.
pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::Indexing {
            processed, total, ..
        } if processed == total => vec![format!("Indexed {}", plural(*total, "new or changed file"))],
        BuildEvent::Indexing { .. } => Vec::new(),
        BuildEvent::PhaseStarted {
            phase,
            jobs,
            source_files,
        } => vec![format!(
            "==> {}: {} for {}",
            phase,
            plural(*jobs, "job"),
            plural(*source_files, "file")
        )],
        BuildEvent::JobFinished {
            completed,
            total,
            dest,
            error,
        } => {
            let status = if error.is_some() { " FAILED" } else { "" };
            vec![format!(
                "{}({}/{}) {}{}",
                indent(1),
                completed,
                total,
                dest,
                status
            )]
        }
    }
}

pub fn print_build_event(event: &BuildEvent) {
    for line in format_build_event(event) {
        println!("{}", line);
    }
}

/// Format the end-of-build report.
pub fn format_build_summary(summary: &BuildSummary) -> Vec<String> {
    let mut lines = vec![format_stats(&summary.stats)];

    if !summary.duplicates.is_empty() {
        lines.push(format!(
            "Skipped {}",
            plural(summary.duplicates.len(), "duplicate")
        ));
        for path in &summary.duplicates {
            lines.push(format!("{}{}", indent(1), path));
        }
    }
    if summary.live_photos > 0 {
        lines.push(format!(
            "Skipped {}",
            plural(summary.live_photos, "Live Photo video")
        ));
    }
    if !summary.problems.is_empty() {
        lines.push(format!("Problems ({})", summary.problems.len()));
        for problem in summary.problems.iter() {
            lines.push(format!("{}{}", indent(1), problem));
        }
    }

    if summary.dry_run {
        lines.push(format!(
            "Dry run: {} planned, nothing written",
            plural(summary.jobs_planned, "job")
        ));
    } else {
        lines.push(format!(
            "Built {}: {} of {} succeeded",
            plural(summary.indexed, "file"),
            summary.jobs_succeeded,
            plural(summary.jobs_planned, "job")
        ));
    }
    lines
}

pub fn print_build_summary(summary: &BuildSummary) {
    for line in format_build_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Status and maintenance
// ============================================================================

pub fn format_status(report: &StatusReport) -> Vec<String> {
    let stats = &report.stats;
    let mut lines = vec![format!(
        "Indexed: {} ({})",
        plural(report.indexed, "file"),
        plural(report.tombstones, "tombstone")
    )];
    if stats.added + stats.modified + stats.deleted == 0 {
        lines.push("Up to date".to_string());
    } else {
        lines.push(format!(
            "Pending: {} added, {} modified, {} deleted",
            stats.added, stats.modified, stats.deleted
        ));
    }
    lines
}

pub fn print_status(report: &StatusReport) {
    for line in format_status(report) {
        println!("{}", line);
    }
}

/// Lines for `refresh-dates`: one per updated file.
pub fn format_refreshed_dates(changed: &[String]) -> Vec<String> {
    let mut lines: Vec<String> = changed
        .iter()
        .map(|p| format!("{}{}", indent(1), p))
        .collect();
    lines.push(format!("Updated {}", plural(changed.len(), "date")));
    lines
}

pub fn print_refreshed_dates(changed: &[String]) {
    for line in format_refreshed_dates(changed) {
        println!("{}", line);
    }
}
