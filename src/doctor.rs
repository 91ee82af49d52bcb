//! Environment diagnostics for the launcher host.

use std::process::Command;

use which::which;

use crate::containers::runtime_binary;

fn probe_version(bin: &std::path::Path) -> Option<String> {
    let out = Command::new(bin).arg("--version").output().ok()?;
    let s = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Print host diagnostics: container runtime and scheduler availability.
pub fn run_doctor() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("lc doctor");
    eprintln!("  version: v{}", version);
    eprintln!("  built: {} ({})", env!("LC_BUILD_DATE"), env!("LC_BUILD_PROFILE"));
    eprintln!("  host: {} / {}", std::env::consts::OS, std::env::consts::ARCH);

    let runtime = runtime_binary();
    match which(&runtime) {
        Ok(p) => {
            eprintln!("  {}: {}", runtime, p.display());
            if let Some(v) = probe_version(&p) {
                eprintln!("  {} --version: {}", runtime, v);
            }
        }
        Err(e) => {
            // singularity fallback covers hosts that predate the rename
            if runtime == "apptainer" {
                match which("singularity") {
                    Ok(p) => eprintln!("  apptainer: not found; singularity: {}", p.display()),
                    Err(_) => eprintln!("  {}: not found ({e})", runtime),
                }
            } else {
                eprintln!("  {}: not found ({e})", runtime);
            }
        }
    }

    for sched in ["sbatch", "qsub"] {
        match which(sched) {
            Ok(p) => eprintln!("  {}: {}", sched, p.display()),
            Err(_) => eprintln!("  {}: not found", sched),
        }
    }

    eprintln!("doctor: completed diagnostics.");
}
