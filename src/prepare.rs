//! Analysis folder builder.
//!
//! Derives the deterministic analysis directory for one (container, version,
//! analysis_name) and copies the input config artifacts into it, so later
//! `run` invocations reproduce the launch purely from the copied state.
//!
//! Copy policy is copy-if-absent-or-forced: an existing destination is never
//! silently overwritten; `force` replaces it. An accidental re-run without
//! `--force` therefore cannot clobber a previous analysis's recorded
//! configuration.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::color::warn_print;
use crate::config::LaunchConfig;
use crate::errors::{LaunchError, Result};
use crate::util::fs::ensure_dir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    SkippedExisting,
    Overwritten,
}

/// The deterministic output root for one named run of one container:
/// `<bids>/derivatives/<container>_<version>/analysis-<name>`.
pub fn analysis_dir_for(cfg: &LaunchConfig) -> Result<PathBuf> {
    let kind = cfg.container_kind()?;
    let opts = cfg.container_opts()?;
    Ok(cfg
        .bids_dir()
        .join("derivatives")
        .join(format!("{}_{}", kind, opts.version))
        .join(format!("analysis-{}", cfg.general.analysis_name)))
}

/// Copy `src` to `dst` honoring the overwrite policy. The source must exist;
/// proceeding without one would leave the analysis dir silently incomplete.
pub fn copy_if_absent_or_forced(src: &Path, dst: &Path, force: bool) -> Result<CopyOutcome> {
    if !src.is_file() {
        return Err(LaunchError::MissingFile(src.to_path_buf()));
    }
    if dst.exists() {
        if !force {
            warn_print(&format!(
                "{} already exists; keeping it (use --force to overwrite)",
                dst.display()
            ));
            warn!(dst = %dst.display(), "config copy skipped, destination exists");
            return Ok(CopyOutcome::SkippedExisting);
        }
        fs::copy(src, dst)?;
        info!(src = %src.display(), dst = %dst.display(), "config copy overwritten");
        return Ok(CopyOutcome::Overwritten);
    }
    fs::copy(src, dst)?;
    info!(src = %src.display(), dst = %dst.display(), "config copied");
    Ok(CopyOutcome::Copied)
}

/// The three (or four) source artifacts handed to `prepare`.
#[derive(Debug, Clone)]
pub struct PrepareArtifacts {
    pub lc_config: PathBuf,
    pub subses_list: PathBuf,
    pub container_config: PathBuf,
    pub tractparams: Option<PathBuf>,
}

/// Create the analysis dir and copy the config artifacts into it.
/// Idempotent: a second call with force=false is a warned no-op.
pub fn prepare_analysis_dir(
    cfg: &LaunchConfig,
    artifacts: &PrepareArtifacts,
    force: bool,
) -> Result<PathBuf> {
    let kind = cfg.container_kind()?;
    let dir = analysis_dir_for(cfg)?;

    // All sources are validated before the first copy so a missing file
    // cannot leave a half-populated analysis dir behind.
    let mut pairs: Vec<(&Path, PathBuf)> = vec![
        (artifacts.lc_config.as_path(), dir.join("lc_config.yaml")),
        (artifacts.subses_list.as_path(), dir.join("subseslist.txt")),
        (
            artifacts.container_config.as_path(),
            dir.join(format!("{kind}.json")),
        ),
    ];
    if kind.is_pipeline() {
        let tp = artifacts.tractparams.as_deref().ok_or_else(|| {
            LaunchError::ConfigValue(format!(
                "container {kind} requires a tractparams file (--tractparams)"
            ))
        })?;
        pairs.push((tp, dir.join("tractparams.csv")));
    }
    for (src, _) in &pairs {
        if !src.is_file() {
            return Err(LaunchError::MissingFile(src.to_path_buf()));
        }
    }

    ensure_dir(&dir)?;
    for (src, dst) in &pairs {
        copy_if_absent_or_forced(src, dst, force)?;
    }
    info!(dir = %dir.display(), "analysis dir ready");
    Ok(dir)
}
