//! Per-subject input staging.
//!
//! For each (sub, ses) marked to run, builds the workspace tree
//! `{input,output,log,tmp[,work]}` and populates `input/` with symlinks to
//! upstream files resolved by the container strategy.
//!
//! Every subject is an isolated unit: a pre-flight or link failure marks
//! that subject failed and the loop continues, so one bad upstream cannot
//! abort the rest of the batch. The batch reports a per-subject summary.

use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;

use tracing::{debug, error, info};

use crate::config::SubjectSessionRow;
use crate::containers::{spec_for, LaunchContext};
use crate::errors::{LaunchError, Result};
use crate::util::fs::ensure_dir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    /// Destination already present with force=false; left untouched.
    Retained,
    Replaced,
}

/// Create `dst` as a symlink to `src`.
///
/// - force=false, dst exists: no-op, the existing destination is retained.
/// - missing src: signaled as `MissingSource` in both force modes; the
///   caller decides whether the link was required. Nothing is removed when
///   the source is absent.
/// - force=true: any existing destination (file or symlink) is replaced.
pub fn force_symlink(src: &Path, dst: &Path, force: bool) -> Result<LinkOutcome> {
    let existing = fs::symlink_metadata(dst).is_ok();
    if existing && !force {
        debug!(dst = %dst.display(), "destination exists, retained");
        return Ok(LinkOutcome::Retained);
    }
    if !src.exists() {
        return Err(LaunchError::MissingSource(src.to_path_buf()));
    }
    if existing {
        fs::remove_file(dst)?;
    }
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }
    symlink(src, dst)?;
    Ok(if existing {
        LinkOutcome::Replaced
    } else {
        LinkOutcome::Created
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Staged { links: usize },
    /// RUN flag false: no workspace directory is created at all.
    Skipped,
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub struct SubjectOutcome {
    pub sub: String,
    pub ses: String,
    pub status: StageStatus,
}

impl SubjectOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, StageStatus::Failed { .. })
    }
}

/// Stage one subject. Pre-flight runs before any directory or symlink is
/// created, so a failing gate leaves no partial workspace behind.
fn stage_subject(
    ctx: &LaunchContext,
    row: &SubjectSessionRow,
    force: bool,
) -> std::result::Result<usize, String> {
    let spec = spec_for(ctx.kind);
    spec.preflight(ctx, row).map_err(|e| e.to_string())?;
    let plan = spec.plan_inputs(ctx, row).map_err(|e| e.to_string())?;

    let subses = ctx.subses_dir(row);
    for sub_dir in ["input", "output", "log", "tmp"] {
        ensure_dir(&subses.join(sub_dir)).map_err(|e| e.to_string())?;
    }
    if ctx.kind.is_pipeline() {
        ensure_dir(&subses.join("work")).map_err(|e| e.to_string())?;
    }

    let input_dir = subses.join("input");
    let mut linked = 0usize;
    let mut missing_required: Vec<String> = Vec::new();
    for link in &plan {
        let dst = input_dir.join(&link.dst);
        match force_symlink(&link.src, &dst, force) {
            Ok(outcome) => {
                debug!(
                    src = %link.src.display(),
                    dst = %dst.display(),
                    ?outcome,
                    "input staged"
                );
                linked += 1;
            }
            Err(LaunchError::MissingSource(p)) if !link.required => {
                info!(src = %p.display(), "optional input missing, skipped");
            }
            Err(LaunchError::MissingSource(p)) => {
                error!(src = %p.display(), "required input missing");
                missing_required.push(p.display().to_string());
            }
            Err(e) => return Err(e.to_string()),
        }
    }
    if missing_required.is_empty() {
        Ok(linked)
    } else {
        Err(format!(
            "missing required sources: {}",
            missing_required.join(", ")
        ))
    }
}

/// Stage every row marked to run. Never raises for a single subject's
/// failure; the returned outcomes carry the per-subject verdicts.
pub fn stage_all(
    ctx: &LaunchContext,
    rows: &[SubjectSessionRow],
    force: bool,
) -> Vec<SubjectOutcome> {
    let mut outcomes = Vec::with_capacity(rows.len());
    for row in rows {
        let status = if !row.run {
            debug!(label = %row.label(), "RUN=false, skipped");
            StageStatus::Skipped
        } else {
            match stage_subject(ctx, row, force) {
                Ok(links) => {
                    info!(label = %row.label(), links, "staged");
                    StageStatus::Staged { links }
                }
                Err(reason) => {
                    error!(label = %row.label(), %reason, "staging failed");
                    StageStatus::Failed { reason }
                }
            }
        };
        outcomes.push(SubjectOutcome {
            sub: row.sub.clone(),
            ses: row.ses.clone(),
            status,
        });
    }
    outcomes
}

/// Multi-subject summary table for the end of a prepare/run invocation.
pub fn summarize(outcomes: &[SubjectOutcome]) -> String {
    let mut out = String::new();
    let staged = outcomes
        .iter()
        .filter(|o| matches!(o.status, StageStatus::Staged { .. }))
        .count();
    let skipped = outcomes
        .iter()
        .filter(|o| matches!(o.status, StageStatus::Skipped))
        .count();
    let failed = outcomes.iter().filter(|o| o.is_failure()).count();
    out.push_str(&format!(
        "staging summary: {staged} staged, {skipped} skipped, {failed} failed\n"
    ));
    for o in outcomes {
        let line = match &o.status {
            StageStatus::Staged { links } => {
                format!("  sub-{}_ses-{}: staged ({links} inputs)", o.sub, o.ses)
            }
            StageStatus::Skipped => format!("  sub-{}_ses-{}: skipped (RUN=false)", o.sub, o.ses),
            StageStatus::Failed { reason } => {
                format!("  sub-{}_ses-{}: FAILED - {reason}", o.sub, o.ses)
            }
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}
