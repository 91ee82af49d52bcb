//! SGE submission: per-job script + qsub, job id parsed from stdout.
//!
//! Same fire-and-continue policy as the SLURM backend.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::{error, info};
use which::which;

use crate::errors::{LaunchError, Result};
use crate::util::exec::{ExecRequest, ExecService};

use super::{BatchOptions, LaunchJob, SubmitOutcome, SubmitResult};

fn qsub_binary() -> String {
    env::var("LC_QSUB")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "qsub".to_string())
}

/// Render one SGE job script with a `#$` preamble.
pub fn render_script(opts: &BatchOptions, job_name: &str, log_dir: &Path, command: &str) -> String {
    let mut lines = vec![
        "#!/bin/bash".to_string(),
        "#$ -S /bin/bash".to_string(),
        "#$ -cwd".to_string(),
        "#$ -j y".to_string(),
        format!("#$ -N {job_name}"),
        format!("#$ -o {}", log_dir.display()),
    ];
    if let Some(q) = &opts.queue {
        lines.push(format!("#$ -q {q}"));
    }
    if let Some(c) = opts.cores {
        lines.push(format!("#$ -pe smp {c}"));
    }
    if let Some(m) = &opts.memory {
        lines.push(format!("#$ -l h_vmem={m}"));
    }
    if let Some(w) = &opts.walltime {
        lines.push(format!("#$ -l h_rt={w}"));
    }
    for m in &opts.modules {
        lines.push(format!("module load {m}"));
    }
    lines.push(command.to_string());
    lines.push(String::new());
    lines.join("\n")
}

/// Parse `Your job <id> ("name") has been submitted`.
pub fn parse_job_id(stdout: &str) -> Option<String> {
    let rest = stdout.trim().strip_prefix("Your job ")?;
    let id: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

pub fn submit(
    opts: &BatchOptions,
    jobs: &[LaunchJob],
    script_dir: &Path,
) -> Result<Vec<SubmitResult>> {
    let binary = qsub_binary();
    let qsub = which(&binary).map_err(|_| LaunchError::RuntimeMissing(binary.clone()))?;
    let exec = ExecService::new(Duration::from_secs(120));

    let mut results = Vec::with_capacity(jobs.len());
    for job in jobs {
        let script_path = script_dir.join(format!("{}.sge", job.label));
        fs::write(
            &script_path,
            render_script(opts, &job.label, script_dir, &job.command),
        )?;

        let out = exec.run(
            ExecRequest::new(&qsub)
                .arg(&script_path)
                .capture_output(true),
        );
        let result = match out {
            Ok(o) if o.status.success() => {
                let job_id = parse_job_id(&o.stdout);
                info!(label = %job.label, job_id = job_id.as_deref().unwrap_or(""), "qsub accepted");
                SubmitResult {
                    label: job.label.clone(),
                    job_id,
                    outcome: SubmitOutcome::Submitted,
                }
            }
            Ok(o) => {
                let detail = format!(
                    "qsub exited {}: {}",
                    o.status.code().unwrap_or(1),
                    o.stderr.trim()
                );
                error!(label = %job.label, %detail, "submission failed, continuing");
                SubmitResult {
                    label: job.label.clone(),
                    job_id: Some(String::new()),
                    outcome: SubmitOutcome::SubmissionFailed { detail },
                }
            }
            Err(e) => {
                let detail = e.to_string();
                error!(label = %job.label, %detail, "submission failed, continuing");
                SubmitResult {
                    label: job.label.clone(),
                    job_id: Some(String::new()),
                    outcome: SubmitOutcome::SubmissionFailed { detail },
                }
            }
        };
        results.push(result);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_script_preamble() {
        let opts = BatchOptions {
            queue: Some("long.q".into()),
            cores: Some(4),
            memory: Some("16G".into()),
            walltime: Some("24:00:00".into()),
            modules: vec!["singularity".into()],
            ..Default::default()
        };
        let s = render_script(&opts, "t-rtppreproc-sub-02_ses-01", Path::new("/logs"), "echo go");
        assert!(s.contains("#$ -N t-rtppreproc-sub-02_ses-01"));
        assert!(s.contains("#$ -q long.q"));
        assert!(s.contains("#$ -pe smp 4"));
        assert!(s.contains("#$ -l h_vmem=16G"));
        assert!(s.contains("#$ -l h_rt=24:00:00"));
        assert!(s.contains("module load singularity"));
    }

    #[test]
    fn test_parse_job_id() {
        assert_eq!(
            parse_job_id("Your job 987654 (\"t-x\") has been submitted\n"),
            Some("987654".into())
        );
        assert_eq!(parse_job_id("Unable to run job"), None);
    }
}
