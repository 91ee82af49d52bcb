//! The `run` workflow.
//!
//! Re-derives every setting from the config artifacts copied into the
//! analysis dir by `prepare` (never from fresh CLI input), checks each
//! subject's staged inputs, renders one launch command per ready row, and
//! hands the whole list to the dispatcher in one submission.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, warn};

use crate::color::{color_enabled_stderr, log_warn_stderr};
use crate::config::{load_launch_config, load_subses_list, LaunchConfig, SubjectSessionRow};
use crate::containers::{spec_for, LaunchContext};
use crate::dispatch::{DispatchMode, LaunchJob, SubmitResult};
use crate::errors::{LaunchError, Result};
use crate::prepare::analysis_dir_for;
use crate::util::fs::ensure_dir;

#[derive(Debug)]
pub struct RunPlan {
    pub analysis_dir: PathBuf,
    pub config: LaunchConfig,
    pub jobs: Vec<LaunchJob>,
    /// Rows that were marked to run but whose workspace is not ready.
    pub not_ready: Vec<(String, String)>,
    /// Rows skipped because RUN=false.
    pub skipped: usize,
}

fn job_label(ctx: &LaunchContext, row: &SubjectSessionRow) -> String {
    format!("t-{}-sub-{}_ses-{}", ctx.kind, row.sub, row.ses)
}

/// All required inputs must exist under `input/` before a command for the
/// row may be generated.
fn check_staged(ctx: &LaunchContext, row: &SubjectSessionRow) -> std::result::Result<(), String> {
    let spec = spec_for(ctx.kind);
    let plan = spec.plan_inputs(ctx, row).map_err(|e| e.to_string())?;
    let input_dir = ctx.subses_dir(row).join("input");
    let mut missing: Vec<String> = Vec::new();
    for link in plan.iter().filter(|l| l.required) {
        let dst = input_dir.join(&link.dst);
        if std::fs::symlink_metadata(&dst).is_err() {
            missing.push(link.dst.display().to_string());
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!("input/ is missing {}", missing.join(", ")))
    }
}

/// Build the launch plan for an analysis dir produced by `prepare`.
pub fn build_run_plan(workdir: &Path) -> Result<RunPlan> {
    let copied_config = workdir.join("lc_config.yaml");
    if !copied_config.is_file() {
        return Err(LaunchError::MissingFile(copied_config));
    }
    let config = load_launch_config(&copied_config)?;

    // The analysis dir is re-derived from the copied config; the -w argument
    // only locates the copy. A mismatch means the tree was moved by hand.
    let analysis_dir = analysis_dir_for(&config)?;
    if let (Ok(a), Ok(b)) = (workdir.canonicalize(), analysis_dir.canonicalize()) {
        if a != b {
            log_warn_stderr(
                color_enabled_stderr(),
                &format!(
                    "lc: workdir {} differs from the dir derived from lc_config.yaml ({}); using the derived path",
                    workdir.display(),
                    analysis_dir.display()
                ),
            );
        }
    }

    let rows = load_subses_list(&analysis_dir.join("subseslist.txt"))?;
    let ctx = LaunchContext::new(config.clone(), analysis_dir.clone())?;

    let mut jobs = Vec::new();
    let mut not_ready = Vec::new();
    let mut skipped = 0usize;
    let now = Local::now();
    for row in &rows {
        if !row.run {
            skipped += 1;
            continue;
        }
        let label = job_label(&ctx, row);
        match check_staged(&ctx, row) {
            Ok(()) => {
                let command = spec_for(ctx.kind).render_command(&ctx, row, now)?;
                info!(%label, "command generated");
                jobs.push(LaunchJob { label, command });
            }
            Err(reason) => {
                warn!(%label, %reason, "row not ready, no command generated");
                not_ready.push((label, reason));
            }
        }
    }
    Ok(RunPlan {
        analysis_dir,
        config,
        jobs,
        not_ready,
        skipped,
    })
}

/// Dispatch the plan. Without `run_lc` this is a dry-run print; otherwise the
/// configured backend receives the full command list in one submission.
pub fn dispatch_plan(plan: &RunPlan, run_lc: bool) -> Result<Vec<SubmitResult>> {
    let mode = DispatchMode::from_config(&plan.config, !run_lc)?;
    let script_dir = plan.analysis_dir.join("log");
    ensure_dir(&script_dir)?;
    mode.submit(&plan.jobs, &script_dir)
}

/// Human-in-the-loop gate before a real submission. Declining is a clean
/// abort, not an error. Non-interactive sessions (and --yes / LC_YES=1)
/// proceed without blocking on a terminal.
pub fn confirm_launch(njobs: usize, assume_yes: bool) -> bool {
    if assume_yes || std::env::var("LC_YES").ok().as_deref() == Some("1") {
        return true;
    }
    if !atty::is(atty::Stream::Stdin) {
        return true;
    }
    eprint!("about to launch {njobs} job(s); continue? [y/N] ");
    let _ = std::io::stderr().flush();
    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim(), "y" | "Y" | "yes" | "YES")
}
