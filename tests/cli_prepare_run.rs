//! End-to-end through the `lc` binary: prepare then dry-run.

mod common;

use std::path::Path;
use std::process::Command;

use common::{anatrois_specific, seed_artifacts, touch};

fn lc(args: &[&str], log_dir: &Path) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_lc"))
        .arg("--log-dir")
        .arg(log_dir)
        .args(args)
        .env("LC_SKIP_LOCK", "1")
        .output()
        .expect("run lc")
}

#[test]
fn test_prepare_then_dry_run() {
    let td = tempfile::tempdir().expect("tmpdir");
    let base = td.path();
    let logs = base.join("lclogs");

    // Two rows; only sub-01 is marked to run.
    let (lcc, ssl, cc, _) = seed_artifacts(
        base,
        "anatrois",
        &anatrois_specific(),
        "01,01,True,True,True,True\n02,01,False,True,True,True\n",
        None,
    );
    touch(&base.join("BIDS/sub-01/ses-01/anat/sub-01_ses-01_T1w.nii.gz"));

    let out = lc(
        &[
            "prepare",
            "--lcc",
            lcc.to_str().unwrap(),
            "--ssl",
            ssl.to_str().unwrap(),
            "--cc",
            cc.to_str().unwrap(),
        ],
        &logs,
    );
    assert!(
        out.status.success(),
        "prepare failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("1 staged, 1 skipped, 0 failed"), "{stdout}");

    let analysis_dir = base.join("BIDS/derivatives/anatrois_4.6.1/analysis-t01");
    assert!(analysis_dir.join("lc_config.yaml").is_file());
    assert!(analysis_dir.join("subseslist.txt").is_file());
    assert!(analysis_dir.join("anatrois.json").is_file());
    assert!(analysis_dir
        .join("sub-01/ses-01/input/anat/T1.nii.gz")
        .exists());
    // RUN=false: subject 02 got no workspace at all.
    assert!(!analysis_dir.join("sub-02").exists());

    // Dry-run: commands printed, nothing executed, exit 0.
    let out = lc(&["run", "-w", analysis_dir.to_str().unwrap()], &logs);
    assert!(
        out.status.success(),
        "run failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("1 job(s) would be launched"), "{stdout}");
    assert!(stdout.contains("apptainer run"), "{stdout}");
    assert!(stdout.contains("sub-01"), "{stdout}");
    assert!(!stdout.contains("sub-02_"), "{stdout}");

    // Log files exist under the chosen dir.
    assert!(logs.join("lc_info.log").is_file());
    assert!(logs.join("lc_error.log").is_file());
}

#[test]
fn test_prepare_rejects_unknown_container() {
    let td = tempfile::tempdir().expect("tmpdir");
    let base = td.path();
    let logs = base.join("lclogs");
    let (lcc, ssl, cc, _) = seed_artifacts(
        base,
        "mriqc",
        "  mriqc:\n    version: \"1.0\"\n",
        "01,01,True,True,True,True\n",
        None,
    );

    let out = lc(
        &[
            "prepare",
            "--lcc",
            lcc.to_str().unwrap(),
            "--ssl",
            ssl.to_str().unwrap(),
            "--cc",
            cc.to_str().unwrap(),
        ],
        &logs,
    );
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("not a recognized container"), "{stderr}");
    // Fatal before any filesystem mutation: no derivatives tree appeared.
    assert!(!base.join("BIDS/derivatives").exists());
}

#[test]
fn test_run_requires_prepared_dir() {
    let td = tempfile::tempdir().expect("tmpdir");
    let logs = td.path().join("lclogs");
    let out = lc(&["run", "-w", td.path().to_str().unwrap()], &logs);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("lc_config.yaml"));
}

#[test]
fn test_gen_subses_roundtrip() {
    let td = tempfile::tempdir().expect("tmpdir");
    let base = td.path();
    let logs = base.join("lclogs");
    touch(&base.join("BIDS/sub-01/ses-01/anat/t1.nii.gz"));
    touch(&base.join("BIDS/sub-01/ses-01/dwi/d.nii.gz"));
    let list = base.join("subseslist.txt");

    let out = lc(
        &[
            "gen-subses",
            "-b",
            base.join("BIDS").to_str().unwrap(),
            "-o",
            list.to_str().unwrap(),
        ],
        &logs,
    );
    assert!(out.status.success());
    let rows = launchcontainers::load_subses_list(&list).expect("parse generated list");
    assert_eq!(rows.len(), 1);
    assert!(rows[0].anat && rows[0].dwi && !rows[0].func);
}
