#![allow(clippy::module_name_repetitions)]
//! Batch dispatch strategies.
//!
//! The mode matrix (host, launch_mode, dry-run) is resolved once at
//! configuration-load time into a `DispatchMode`; every variant implements
//! the same `submit(jobs, script_dir) -> Vec<SubmitResult>` contract. The
//! orchestration layer never branches on host names after this point.

pub mod local;
pub mod sge;
pub mod slurm;

use std::path::Path;

use crate::config::{HostOptions, LaunchConfig};
use crate::errors::{LaunchError, Result};

/// One rendered command plus its display/job label. The command string is
/// opaque: created by the command generator, consumed exactly once here.
#[derive(Debug, Clone)]
pub struct LaunchJob {
    pub label: String,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Dry-run: the command was printed, nothing executed.
    Printed,
    /// Local run finished with this exit code.
    Exited { code: i32 },
    /// Scheduler accepted the job.
    Submitted,
    /// Scheduler rejected the job; the batch continued regardless.
    SubmissionFailed { detail: String },
}

#[derive(Debug, Clone)]
pub struct SubmitResult {
    pub label: String,
    pub job_id: Option<String>,
    pub outcome: SubmitOutcome,
}

/// Queue/resource parameters shared by the SLURM and SGE script preambles.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub queue: Option<String>,
    pub cores: Option<u32>,
    pub memory: Option<String>,
    pub walltime: Option<String>,
    pub qos: Option<String>,
    pub account: Option<String>,
    pub modules: Vec<String>,
}

impl From<&HostOptions> for BatchOptions {
    fn from(h: &HostOptions) -> Self {
        BatchOptions {
            queue: h.queue.clone(),
            cores: h.cores,
            memory: h.memory.clone(),
            walltime: h.walltime.clone(),
            qos: h.qos.clone(),
            account: h.account.clone(),
            modules: h.modules.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum DispatchMode {
    DryRun,
    LocalSerial,
    LocalParallel { njobs: usize },
    Slurm(BatchOptions),
    Sge(BatchOptions),
}

impl DispatchMode {
    /// Resolve the dispatch strategy from the loaded config. `dry_run`
    /// (no --run-lc) wins over everything else.
    pub fn from_config(cfg: &LaunchConfig, dry_run: bool) -> Result<DispatchMode> {
        if dry_run {
            return Ok(DispatchMode::DryRun);
        }
        let host_opts = cfg.host_opts();
        match cfg.general.host.as_str() {
            "local" => match host_opts.launch_mode.as_deref().unwrap_or("serial") {
                "serial" => Ok(DispatchMode::LocalSerial),
                "parallel" => Ok(DispatchMode::LocalParallel {
                    njobs: host_opts.njobs.unwrap_or(2).max(1),
                }),
                "dry-run" => Ok(DispatchMode::DryRun),
                other => Err(LaunchError::ConfigValue(format!(
                    "host_options.local.launch_mode must be serial, parallel or dry-run (got '{other}')"
                ))),
            },
            "slurm" => Ok(DispatchMode::Slurm(BatchOptions::from(&host_opts))),
            "sge" => Ok(DispatchMode::Sge(BatchOptions::from(&host_opts))),
            other => Err(LaunchError::ConfigValue(format!(
                "unsupported host '{other}'"
            ))),
        }
    }

    /// Hand the commands to the selected backend. `script_dir` receives the
    /// rendered batch scripts for the scheduler backends.
    pub fn submit(&self, jobs: &[LaunchJob], script_dir: &Path) -> Result<Vec<SubmitResult>> {
        match self {
            DispatchMode::DryRun => Ok(local::print_dry_run(jobs)),
            DispatchMode::LocalSerial => local::run_serial(jobs),
            DispatchMode::LocalParallel { njobs } => local::run_parallel(jobs, *njobs),
            DispatchMode::Slurm(opts) => slurm::submit(opts, jobs, script_dir),
            DispatchMode::Sge(opts) => sge::submit(opts, jobs, script_dir),
        }
    }
}
