use std::collections::BTreeMap;

use chrono::Local;

use launchcontainers::config::{ContainerOpts, GeneralConfig, SubjectSessionRow};
use launchcontainers::{spec_for, ContainerKind, LaunchConfig, LaunchContext, ALL_CONTAINERS};

fn full_opts() -> ContainerOpts {
    ContainerOpts {
        version: "9.9.9".into(),
        pre_fs: false,
        anatrois_analysis: Some("anat01".into()),
        anatrois_version: Some("0.2.0".into()),
        preproc_analysis: Some("prep01".into()),
        preproc_version: Some("2.1.0".into()),
        rpe: false,
    }
}

fn ctx_for(kind: ContainerKind) -> LaunchContext {
    let mut container_specific = BTreeMap::new();
    container_specific.insert(kind.as_str().to_string(), full_opts());
    let config = LaunchConfig {
        general: GeneralConfig {
            basedir: "/data/project".into(),
            bidsdir_name: "BIDS".into(),
            containerdir: "/data/containers".into(),
            container: kind.as_str().into(),
            analysis_name: "t01".into(),
            host: "local".into(),
            force: false,
            log_dir: None,
        },
        container_specific,
        host_options: BTreeMap::new(),
    };
    let analysis_dir = format!(
        "/data/project/BIDS/derivatives/{}_9.9.9/analysis-t01",
        kind.as_str()
    );
    LaunchContext::new(config, analysis_dir.into()).expect("ctx")
}

fn row() -> SubjectSessionRow {
    SubjectSessionRow {
        sub: "07".into(),
        ses: "02".into(),
        run: true,
        anat: true,
        dwi: true,
        func: false,
    }
}

#[test]
fn test_every_container_renders_a_command_with_identifiers() {
    let now = Local::now();
    for kind in ALL_CONTAINERS {
        let ctx = ctx_for(kind);
        let cmd = spec_for(kind)
            .render_command(&ctx, &row(), now)
            .expect("render");
        assert!(!cmd.is_empty(), "{kind}: empty command");
        assert!(cmd.contains("sub-07"), "{kind}: missing subject: {cmd}");
        assert!(cmd.contains("ses-02"), "{kind}: missing session: {cmd}");
        assert!(
            cmd.contains(&format!("{}_9.9.9.sif", kind.as_str())),
            "{kind}: missing image path: {cmd}"
        );
        assert!(cmd.contains("apptainer run"), "{kind}: not a runtime call: {cmd}");
        assert!(
            cmd.contains("/flywheel/v0/input"),
            "{kind}: missing input bind: {cmd}"
        );
    }
}

#[test]
fn test_pipeline_commands_bind_work_dir() {
    let now = Local::now();
    for kind in [ContainerKind::RtpPipeline, ContainerKind::Rtp2Pipeline] {
        let ctx = ctx_for(kind);
        let cmd = spec_for(kind)
            .render_command(&ctx, &row(), now)
            .expect("render");
        assert!(cmd.contains("/flywheel/v0/work"), "{kind}: {cmd}");
    }
}

#[test]
fn test_names_outside_the_set_are_rejected() {
    for bad in ["fmriprep", "freesurfer", "", "rtp3-pipeline"] {
        assert!(
            bad.parse::<ContainerKind>().is_err(),
            "'{bad}' should not parse"
        );
    }
}

#[test]
fn test_log_path_carries_timestamp() {
    let now = Local::now();
    let ctx = ctx_for(ContainerKind::Anatrois);
    let cmd = spec_for(ContainerKind::Anatrois)
        .render_command(&ctx, &row(), now)
        .expect("render");
    let stamp = now.format("%Y%m%dT%H%M%S").to_string();
    assert!(cmd.contains(&stamp), "expected {stamp} in {cmd}");
    assert!(cmd.contains("t-anatrois-sub-07_ses-02"), "{cmd}");
}
