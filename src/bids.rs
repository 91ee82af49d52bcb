//! Minimal BIDS tree helpers.
//!
//! Enough layout awareness to bootstrap a dataset skeleton and to generate a
//! subject-session list from an existing tree; anything scientific about the
//! dataset stays with external tools.

use std::fs;
use std::path::Path;

use serde_json::json;
use tracing::info;
use walkdir::WalkDir;

use crate::config::SubjectSessionRow;
use crate::errors::{LaunchError, Result};
use crate::util::fs::{ensure_dir, sorted_matches};

const MODALITIES: [&str; 3] = ["anat", "dwi", "func"];

/// Create a skeleton dataset: dataset_description.json plus one example
/// subject/session with the three modality dirs.
pub fn create_bids_skeleton(dir: &Path) -> Result<()> {
    ensure_dir(dir)?;
    let desc = json!({
        "Name": "New dataset",
        "BIDSVersion": "1.8.0",
        "DatasetType": "raw",
    });
    fs::write(
        dir.join("dataset_description.json"),
        serde_json::to_string_pretty(&desc).expect("static json") + "\n",
    )?;
    for modality in MODALITIES {
        ensure_dir(&dir.join("sub-01").join("ses-01").join(modality))?;
    }
    ensure_dir(&dir.join("derivatives"))?;
    info!(dir = %dir.display(), "BIDS skeleton created");
    Ok(())
}

fn dir_has_files(dir: &Path) -> bool {
    WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .any(|e| e.file_type().is_file())
}

fn strip_entity<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    name.strip_prefix(prefix).filter(|rest| !rest.is_empty())
}

/// Scan `sub-*/ses-*` and emit one row per pair with per-modality
/// availability flags. RUN defaults to true; the operator edits the list.
pub fn scan_subses(bidsdir: &Path) -> Result<Vec<SubjectSessionRow>> {
    if !bidsdir.is_dir() {
        return Err(LaunchError::MissingFile(bidsdir.to_path_buf()));
    }
    let mut rows = Vec::new();
    for sub_dir in sorted_matches(bidsdir, |n| n.starts_with("sub-"))? {
        let Some(sub) = sub_dir
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| strip_entity(n, "sub-"))
            .map(str::to_string)
        else {
            continue;
        };
        for ses_dir in sorted_matches(&sub_dir, |n| n.starts_with("ses-"))? {
            let Some(ses) = ses_dir
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| strip_entity(n, "ses-"))
                .map(str::to_string)
            else {
                continue;
            };
            let flags: Vec<bool> = MODALITIES
                .iter()
                .map(|m| dir_has_files(&ses_dir.join(m)))
                .collect();
            rows.push(SubjectSessionRow {
                sub: sub.clone(),
                ses,
                run: true,
                anat: flags[0],
                dwi: flags[1],
                func: flags[2],
            });
        }
    }
    Ok(rows)
}
