//! SLURM submission: per-job batch script + sbatch, job id parsed from stdout.
//!
//! A non-zero exit from sbatch is logged and recorded with an empty job id;
//! the remaining submissions continue (fire-and-continue).

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::{error, info};
use which::which;

use crate::errors::{LaunchError, Result};
use crate::util::exec::{ExecRequest, ExecService};

use super::{BatchOptions, LaunchJob, SubmitOutcome, SubmitResult};

/// sbatch binary name; LC_SBATCH overrides for hosts with wrapper scripts.
fn sbatch_binary() -> String {
    env::var("LC_SBATCH")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "sbatch".to_string())
}

/// Render one batch script: shebang, #SBATCH preamble from host options,
/// module loads, then the command.
pub fn render_script(opts: &BatchOptions, job_name: &str, log_dir: &Path, command: &str) -> String {
    let mut lines = vec![
        "#!/bin/bash".to_string(),
        format!("#SBATCH --job-name={job_name}"),
        format!("#SBATCH --output={}/{job_name}_%j.out", log_dir.display()),
        "#SBATCH --export=ALL".to_string(),
    ];
    if let Some(q) = &opts.queue {
        lines.push(format!("#SBATCH --partition={q}"));
    }
    if let Some(c) = opts.cores {
        lines.push(format!("#SBATCH --cpus-per-task={c}"));
    }
    if let Some(m) = &opts.memory {
        lines.push(format!("#SBATCH --mem={m}"));
    }
    if let Some(w) = &opts.walltime {
        lines.push(format!("#SBATCH --time={w}"));
    }
    if let Some(q) = &opts.qos {
        lines.push(format!("#SBATCH --qos={q}"));
    }
    if let Some(a) = &opts.account {
        lines.push(format!("#SBATCH --account={a}"));
    }
    for m in &opts.modules {
        lines.push(format!("module load {m}"));
    }
    lines.push(command.to_string());
    lines.push(String::new());
    lines.join("\n")
}

/// Parse "Submitted batch job <id>" (optionally followed by cluster info).
pub fn parse_job_id(stdout: &str) -> Option<String> {
    let rest = stdout.trim().strip_prefix("Submitted batch job ")?;
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
    let binary = sbatch_binary();
    let sbatch =
        which(&binary).map_err(|_| LaunchError::RuntimeMissing(binary.clone()))?;
    let exec = ExecService::new(Duration::from_secs(120));

    let mut results = Vec::with_capacity(jobs.len());
    for job in jobs {
        let script_path = script_dir.join(format!("{}.sbatch", job.label));
        fs::write(
            &script_path,
            render_script(opts, &job.label, script_dir, &job.command),
        )?;

        let out = exec.run(
            ExecRequest::new(&sbatch)
                .arg(&script_path)
                .capture_output(true),
        );
        let result = match out {
            Ok(o) if o.status.success() => {
                let job_id = parse_job_id(&o.stdout);
                info!(label = %job.label, job_id = job_id.as_deref().unwrap_or(""), "sbatch accepted");
                SubmitResult {
                    label: job.label.clone(),
                    job_id,
                    outcome: SubmitOutcome::Submitted,
                }
            }
            Ok(o) => {
                let detail = format!(
                    "sbatch exited {}: {}",
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
            queue: Some("normal".into()),
            cores: Some(8),
            memory: Some("32G".into()),
            walltime: Some("12:00:00".into()),
            qos: None,
            account: Some("lab".into()),
            modules: vec!["apptainer/1.2".into()],
        };
        let s = render_script(&opts, "t-anatrois-sub-01_ses-01", Path::new("/logs"), "echo run");
        assert!(s.starts_with("#!/bin/bash\n"));
        assert!(s.contains("#SBATCH --job-name=t-anatrois-sub-01_ses-01"));
        assert!(s.contains("#SBATCH --partition=normal"));
        assert!(s.contains("#SBATCH --cpus-per-task=8"));
        assert!(s.contains("#SBATCH --mem=32G"));
        assert!(s.contains("#SBATCH --time=12:00:00"));
        assert!(s.contains("#SBATCH --account=lab"));
        assert!(!s.contains("--qos"));
        assert!(s.contains("module load apptainer/1.2"));
        assert!(s.trim_end().ends_with("echo run"));
    }

    #[test]
    fn test_parse_job_id() {
        assert_eq!(
            parse_job_id("Submitted batch job 123456\n"),
            Some("123456".into())
        );
        assert_eq!(
            parse_job_id("Submitted batch job 77 on cluster hpc"),
            Some("77".into())
        );
        assert_eq!(parse_job_id("sbatch: error: invalid partition"), None);
        assert_eq!(parse_job_id(""), None);
    }
}
