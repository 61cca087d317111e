//! CLI output formatting.
//!
//! Each report has a `format_*` function returning lines (pure, testable)
//! and a `print_*` wrapper that writes to stdout.

use crate::changeset::ChangeSet;
use crate::engine::BuildStats;

/// Format the end-of-run summary.
pub fn format_build_report(stats: &BuildStats) -> Vec<String> {
    let mut lines = vec![format!("Build complete: {stats}")];
    if stats.render_failures > 0 {
        lines.push(format!(
            "{} renderer failure(s) left output stale; see the log for paths",
            stats.render_failures
        ));
    }
    lines
}

pub fn print_build_report(stats: &BuildStats) {
    for line in format_build_report(stats) {
        println!("{line}");
    }
}

/// Format a pending changeset, one `M`/`D` line per path.
pub fn format_changeset(changes: &ChangeSet) -> Vec<String> {
    let mut lines = Vec::new();
    match &changes.revision {
        Some(rev) => lines.push(format!("Changes against {rev}:")),
        None => lines.push("Changes:".to_string()),
    }
    for entry in changes.modified() {
        lines.push(format!("  M {}", entry.path));
    }
    for entry in changes.deleted() {
        lines.push(format!("  D {}", entry.path));
    }
    lines.push(format!(
        "{} modified, {} deleted",
        changes.modified().len(),
        changes.deleted().len()
    ));
    lines
}

pub fn print_changeset(changes: &ChangeSet) {
    for line in format_changeset(changes) {
        println!("{line}");
    }
}
