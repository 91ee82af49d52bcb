//! launchcontainers: host-side launcher for containerized neuroimaging
//! pipeline stages over BIDS datasets.
//!
//! The workflow is prepare -> run: `prepare` derives a deterministic
//! analysis dir, copies the config artifacts into it, and stages per-subject
//! input symlinks; `run` re-derives everything from those copies, renders
//! one container command per subject/session, and hands the list to a
//! dispatch backend (dry-run, local serial/parallel, SLURM, SGE).

pub mod bids;
pub mod color;
pub mod config;
pub mod configs;
pub mod containers;
pub mod dispatch;
pub mod doctor;
pub mod errors;
pub mod launch;
pub mod lock;
pub mod logging;
pub mod prepare;
pub mod qc;
pub mod staging;
pub mod util;

pub use color::{
    color_enabled_stderr, color_enabled_stdout, log_error_stderr, log_info_stderr,
    log_warn_stderr, paint, set_color_mode, warn_print, ColorMode,
};
pub use config::{
    load_launch_config, load_subses_list, write_subses_list, ContainerKind, LaunchConfig,
    SubjectSessionRow, ALL_CONTAINERS,
};
pub use containers::{spec_for, ContainerSpec, LaunchContext, PlannedLink};
pub use dispatch::{DispatchMode, LaunchJob, SubmitOutcome, SubmitResult};
pub use errors::{exit_code_for_error, LaunchError};
pub use launch::{build_run_plan, confirm_launch, dispatch_plan, RunPlan};
pub use lock::{acquire_lock, should_acquire_lock, LaunchLock};
pub use logging::{default_log_dir, init_logging, Verbosity};
pub use prepare::{analysis_dir_for, copy_if_absent_or_forced, prepare_analysis_dir,
    CopyOutcome, PrepareArtifacts};
pub use staging::{force_symlink, stage_all, summarize, LinkOutcome, StageStatus, SubjectOutcome};
