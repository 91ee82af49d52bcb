//! Post-run folder audit.
//!
//! Reads the same analysis-dir conventions the stager wrote and reports, per
//! subject/session: output file count, whether the container log exists, and
//! how many error lines the logs carry. Pure inspection; no science.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::errors::{LaunchError, Result};
use crate::util::fs::sorted_matches;

#[derive(Debug, Clone)]
pub struct QcRow {
    pub sub: String,
    pub ses: String,
    pub output_files: usize,
    pub has_log: bool,
    pub error_lines: usize,
}

fn count_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}

fn count_error_lines(log_dir: &Path) -> usize {
    let mut n = 0usize;
    for entry in WalkDir::new(log_dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        if let Ok(text) = fs::read_to_string(entry.path()) {
            n += text
                .lines()
                .filter(|l| l.to_ascii_lowercase().contains("error"))
                .count();
        }
    }
    n
}

/// Audit every sub-*/ses-* workspace under the analysis dir.
pub fn audit_analysis_dir(analysis_dir: &Path) -> Result<Vec<QcRow>> {
    if !analysis_dir.is_dir() {
        return Err(LaunchError::MissingFile(analysis_dir.to_path_buf()));
    }
    let mut rows = Vec::new();
    for sub_dir in sorted_matches(analysis_dir, |n| n.starts_with("sub-"))? {
        let sub = sub_dir
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix("sub-"))
            .unwrap_or_default()
            .to_string();
        for ses_dir in sorted_matches(&sub_dir, |n| n.starts_with("ses-"))? {
            let ses = ses_dir
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix("ses-"))
                .unwrap_or_default()
                .to_string();
            let log_dir = ses_dir.join("log");
            rows.push(QcRow {
                sub: sub.clone(),
                ses,
                output_files: count_files(&ses_dir.join("output")),
                has_log: count_files(&log_dir) > 0,
                error_lines: count_error_lines(&log_dir),
            });
        }
    }
    Ok(rows)
}

/// Render the audit as a fixed-width table.
pub fn format_report(rows: &[QcRow]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<20} {:>12} {:>8} {:>12}\n",
        "subject/session", "output files", "log", "error lines"
    ));
    for r in rows {
        out.push_str(&format!(
            "{:<20} {:>12} {:>8} {:>12}\n",
            format!("sub-{}_ses-{}", r.sub, r.ses),
            r.output_files,
            if r.has_log { "yes" } else { "no" },
            r.error_lines
        ));
    }
    if rows.is_empty() {
        out.push_str("no subject workspaces found\n");
    }
    out
}
