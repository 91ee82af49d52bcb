mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use launchcontainers::config::load_launch_config;
use launchcontainers::dispatch::SubmitOutcome;
use launchcontainers::{
    acquire_lock, analysis_dir_for, bids, build_run_plan, color_enabled_stderr, configs,
    confirm_launch, default_log_dir, dispatch_plan, doctor, exit_code_for_error, init_logging,
    load_subses_list, log_error_stderr, log_info_stderr, prepare_analysis_dir, qc,
    set_color_mode, should_acquire_lock, stage_all, summarize, write_subses_list, LaunchContext,
    LaunchError, LaunchLock, PrepareArtifacts, Verbosity,
};

use cli::{Cli, Cmd};

/// Best-effort peek at general.log_dir before logging is initialized; the
/// real load later reports any parse problems.
fn config_log_dir_hint(cmd: &Cmd) -> Option<PathBuf> {
    let candidate = match cmd {
        Cmd::Prepare { lc_config, .. } => lc_config.clone(),
        Cmd::Run { workdir, .. } => workdir.join("lc_config.yaml"),
        _ => return None,
    };
    let text = std::fs::read_to_string(candidate).ok()?;
    let cfg: launchcontainers::LaunchConfig = serde_yaml::from_str(&text).ok()?;
    cfg.general.log_dir
}

fn maybe_lock(analysis_dir: &Path) -> Result<Option<LaunchLock>, LaunchError> {
    if !should_acquire_lock() {
        return Ok(None);
    }
    Ok(Some(acquire_lock(analysis_dir)?))
}

fn cmd_prepare(
    lc_config: &Path,
    sub_ses_list: &Path,
    container_config: &Path,
    tractparams: Option<&Path>,
    force: bool,
) -> Result<(), LaunchError> {
    let cfg = load_launch_config(lc_config)?;
    let rows = load_subses_list(sub_ses_list)?;
    let force = force || cfg.general.force;

    let analysis_dir = analysis_dir_for(&cfg)?;
    let _lock = maybe_lock(&analysis_dir)?;

    let artifacts = PrepareArtifacts {
        lc_config: lc_config.to_path_buf(),
        subses_list: sub_ses_list.to_path_buf(),
        container_config: container_config.to_path_buf(),
        tractparams: tractparams.map(Path::to_path_buf),
    };
    let dir = prepare_analysis_dir(&cfg, &artifacts, force)?;

    let ctx = LaunchContext::new(cfg, dir.clone())?;
    let outcomes = stage_all(&ctx, &rows, force);

    // The summary is part of the operator's review loop; always printed.
    print!("{}", summarize(&outcomes));
    println!("analysis dir: {}", dir.display());
    Ok(())
}

fn cmd_run(workdir: &Path, run_lc: bool, yes: bool) -> Result<(), LaunchError> {
    let plan = build_run_plan(workdir)?;
    let _lock = maybe_lock(&plan.analysis_dir)?;

    // Always visible regardless of verbosity: this line is the dry-run
    // review gate.
    println!(
        "{} job(s) {} launched ({} skipped, {} not ready)",
        plan.jobs.len(),
        if run_lc { "will be" } else { "would be" },
        plan.skipped,
        plan.not_ready.len()
    );
    for (label, reason) in &plan.not_ready {
        println!("  not ready: {label}: {reason}");
    }

    if run_lc && plan.jobs.is_empty() {
        println!("nothing to launch");
        return Ok(());
    }
    if run_lc && !confirm_launch(plan.jobs.len(), yes) {
        println!("aborted by user");
        return Ok(());
    }

    let results = dispatch_plan(&plan, run_lc)?;
    if run_lc {
        for r in &results {
            let note = match &r.outcome {
                SubmitOutcome::Submitted => {
                    format!("submitted (job id {})", r.job_id.as_deref().unwrap_or("?"))
                }
                SubmitOutcome::Exited { code } => format!("exited with code {code}"),
                SubmitOutcome::SubmissionFailed { detail } => {
                    format!("submission FAILED: {detail}")
                }
                SubmitOutcome::Printed => "printed".to_string(),
            };
            println!("  {}: {}", r.label, note);
        }
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<(), LaunchError> {
    match &cli.command {
        Cmd::Prepare {
            lc_config,
            sub_ses_list,
            container_config,
            tractparams,
            force,
        } => cmd_prepare(
            lc_config,
            sub_ses_list,
            container_config,
            tractparams.as_deref(),
            *force,
        ),
        Cmd::Run {
            workdir,
            run_lc,
            yes,
        } => cmd_run(workdir, *run_lc, *yes),
        Cmd::Qc { workdir } => {
            let rows = qc::audit_analysis_dir(workdir)?;
            print!("{}", qc::format_report(&rows));
            Ok(())
        }
        Cmd::CreateBids { output } => bids::create_bids_skeleton(output),
        Cmd::CopyConfigs { output } => configs::copy_example_configs(output),
        Cmd::GenSubses { bidsdir, output } => {
            let rows = bids::scan_subses(bidsdir)?;
            write_subses_list(output, &rows)?;
            println!("{} subject-session row(s) written to {}", rows.len(), output.display());
            Ok(())
        }
        Cmd::ZipConfigs { workdir, output } => {
            let n = configs::zip_analysis_configs(workdir, output)?;
            println!("{} config file(s) archived to {}", n, output.display());
            Ok(())
        }
        Cmd::Doctor => {
            doctor::run_doctor();
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(mode) = cli.color {
        set_color_mode(mode);
    }

    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose, cli.debug);
    let log_dir = cli
        .log_dir
        .clone()
        .or_else(|| config_log_dir_hint(&cli.command))
        .unwrap_or_else(default_log_dir);
    if let Err(e) = init_logging(verbosity, &log_dir) {
        log_error_stderr(
            color_enabled_stderr(),
            &format!("lc: cannot initialize logging under {}: {e}", log_dir.display()),
        );
        return ExitCode::from(1);
    }
    if matches!(verbosity, Verbosity::Debug) {
        log_info_stderr(
            color_enabled_stderr(),
            &format!("lc: logs under {}", log_dir.display()),
        );
    }

    match run(&cli) {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            log_error_stderr(color_enabled_stderr(), &format!("lc: {e}"));
            ExitCode::from(exit_code_for_error(&e))
        }
    }
}
