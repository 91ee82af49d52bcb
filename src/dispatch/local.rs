//! Local dispatch: dry-run printing, serial chains, bounded-parallel batches.

use std::process::{Child, Command};

use tracing::{error, info};

use crate::errors::Result;

use super::{LaunchJob, SubmitOutcome, SubmitResult};

/// Print every command to stdout. Terminal state: nothing is executed.
pub fn print_dry_run(jobs: &[LaunchJob]) -> Vec<SubmitResult> {
    for job in jobs {
        println!("{}", job.command);
    }
    jobs.iter()
        .map(|j| SubmitResult {
            label: j.label.clone(),
            job_id: None,
            outcome: SubmitOutcome::Printed,
        })
        .collect()
}

/// Run all commands as one `&&` chain in a single shell. A failure in
/// command i prevents command i+1 from starting; that short-circuit is the
/// only ordering/failure guarantee this mode provides, so the chain reports
/// one aggregate result.
pub fn run_serial(jobs: &[LaunchJob]) -> Result<Vec<SubmitResult>> {
    if jobs.is_empty() {
        return Ok(Vec::new());
    }
    let chain = jobs
        .iter()
        .map(|j| j.command.as_str())
        .collect::<Vec<_>>()
        .join(" && ");
    info!(commands = jobs.len(), "local-serial chain starting");
    let status = Command::new("sh").arg("-c").arg(&chain).status()?;
    let code = status.code().unwrap_or(1);
    if code != 0 {
        error!(code, "local-serial chain exited non-zero");
    }
    Ok(vec![SubmitResult {
        label: format!("local-serial chain ({} commands)", jobs.len()),
        job_id: None,
        outcome: SubmitOutcome::Exited { code },
    }])
}

/// Fixed-size batches of `njobs` concurrent processes. The whole batch is
/// waited on before the next one starts; there is no priority or fairness
/// beyond that gate.
pub fn run_parallel(jobs: &[LaunchJob], njobs: usize) -> Result<Vec<SubmitResult>> {
    let njobs = njobs.max(1);
    let mut results = Vec::with_capacity(jobs.len());
    for (batch_no, batch) in jobs.chunks(njobs).enumerate() {
        info!(batch = batch_no + 1, size = batch.len(), "local-parallel batch starting");
        let mut children: Vec<(usize, std::io::Result<Child>)> = batch
            .iter()
            .enumerate()
            .map(|(i, job)| (i, Command::new("sh").arg("-c").arg(&job.command).spawn()))
            .collect();
        for (i, child) in children.iter_mut() {
            let job = &batch[*i];
            let outcome = match child {
                Ok(c) => match c.wait() {
                    Ok(status) => SubmitOutcome::Exited {
                        code: status.code().unwrap_or(1),
                    },
                    Err(e) => SubmitOutcome::SubmissionFailed {
                        detail: format!("wait failed: {e}"),
                    },
                },
                Err(e) => SubmitOutcome::SubmissionFailed {
                    detail: format!("spawn failed: {e}"),
                },
            };
            if !matches!(outcome, SubmitOutcome::Exited { code: 0 }) {
                error!(label = %job.label, ?outcome, "local-parallel job did not succeed");
            }
            results.push(SubmitResult {
                label: job.label.clone(),
                job_id: None,
                outcome,
            });
        }
    }
    Ok(results)
}

/// How many sequential batches `run_parallel` will issue for n jobs.
pub fn batch_count(n: usize, njobs: usize) -> usize {
    let njobs = njobs.max(1);
    n.div_ceil(njobs)
}
