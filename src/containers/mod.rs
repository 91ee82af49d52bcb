#![allow(clippy::module_name_repetitions)]
//! Container strategy registry.
//!
//! Each supported container implements `ContainerSpec`: how to resolve its
//! upstream inputs into planned symlinks, an optional pre-flight check, and
//! how to render its launch command. Adding a container means adding an
//! implementation here, not extending conditionals elsewhere.

pub mod anatomical;
pub mod pipeline;
pub mod preproc;

use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::config::{ContainerKind, ContainerOpts, LaunchConfig, SubjectSessionRow};
use crate::errors::{LaunchError, Result};
use crate::util::shell_escape;

/// Everything a strategy needs to resolve paths for one analysis.
#[derive(Debug, Clone)]
pub struct LaunchContext {
    pub config: LaunchConfig,
    pub kind: ContainerKind,
    pub opts: ContainerOpts,
    pub analysis_dir: PathBuf,
}

impl LaunchContext {
    pub fn new(config: LaunchConfig, analysis_dir: PathBuf) -> Result<Self> {
        let kind = config.container_kind()?;
        let opts = config.container_opts()?.clone();
        Ok(Self {
            config,
            kind,
            opts,
            analysis_dir,
        })
    }

    pub fn bids_dir(&self) -> PathBuf {
        self.config.bids_dir()
    }

    pub fn derivatives_dir(&self) -> PathBuf {
        self.bids_dir().join("derivatives")
    }

    /// Workspace root for one (sub, ses) under the analysis dir.
    pub fn subses_dir(&self, row: &SubjectSessionRow) -> PathBuf {
        self.analysis_dir
            .join(format!("sub-{}", row.sub))
            .join(format!("ses-{}", row.ses))
    }

    /// Output dir of an upstream derivative run for the same (sub, ses).
    pub fn upstream_output_dir(
        &self,
        dep_container: &str,
        dep_version: &str,
        dep_analysis: &str,
        row: &SubjectSessionRow,
    ) -> PathBuf {
        self.derivatives_dir()
            .join(format!("{dep_container}_{dep_version}"))
            .join(format!("analysis-{dep_analysis}"))
            .join(format!("sub-{}", row.sub))
            .join(format!("ses-{}", row.ses))
            .join("output")
    }

    /// Raw-data modality dir, e.g. `<bids>/sub-01/ses-01/dwi`.
    pub fn raw_modality_dir(&self, row: &SubjectSessionRow, modality: &str) -> PathBuf {
        self.bids_dir()
            .join(format!("sub-{}", row.sub))
            .join(format!("ses-{}", row.ses))
            .join(modality)
    }

    pub fn sif_path(&self) -> PathBuf {
        self.config
            .general
            .containerdir
            .join(format!("{}_{}.sif", self.kind, self.opts.version))
    }

    /// Path of the container config copied into the analysis dir by prepare.
    pub fn container_config_copy(&self) -> PathBuf {
        self.analysis_dir.join(format!("{}.json", self.kind))
    }

    pub fn tractparams_copy(&self) -> PathBuf {
        self.analysis_dir.join("tractparams.csv")
    }

    /// A required option for this container kind; absence is a config error.
    pub fn require_opt<'a>(&self, field: &str, v: &'a Option<String>) -> Result<&'a str> {
        v.as_deref().ok_or_else(|| {
            LaunchError::ConfigValue(format!(
                "container_specific.{}.{} is required for this container",
                self.kind, field
            ))
        })
    }
}

/// One symlink the stager will create under `input/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLink {
    pub src: PathBuf,
    /// Destination relative to the row's `input/` dir, e.g. `anat/T1.nii.gz`.
    pub dst: PathBuf,
    /// Required links missing at staging time fail the subject; optional ones
    /// are skipped with a log line.
    pub required: bool,
}

impl PlannedLink {
    pub fn required(src: PathBuf, dst: impl Into<PathBuf>) -> Self {
        Self {
            src,
            dst: dst.into(),
            required: true,
        }
    }

    pub fn optional(src: PathBuf, dst: impl Into<PathBuf>) -> Self {
        Self {
            src,
            dst: dst.into(),
            required: false,
        }
    }
}

pub trait ContainerSpec: Sync {
    fn kind(&self) -> ContainerKind;

    /// Per-subject check run before any workspace dir or symlink is created.
    fn preflight(&self, _ctx: &LaunchContext, _row: &SubjectSessionRow) -> Result<()> {
        Ok(())
    }

    /// Resolve the symlinks this container needs for one (sub, ses).
    /// Resolution is pure path computation over a fixed upstream layout;
    /// repeated calls must return the same plan in the same order.
    fn plan_inputs(&self, ctx: &LaunchContext, row: &SubjectSessionRow)
        -> Result<Vec<PlannedLink>>;

    /// Render the launch command string for one (sub, ses).
    fn render_command(
        &self,
        ctx: &LaunchContext,
        row: &SubjectSessionRow,
        now: DateTime<Local>,
    ) -> Result<String>;
}

static ANATROIS: anatomical::AnatomicalSpec = anatomical::AnatomicalSpec {
    kind: ContainerKind::Anatrois,
};
static FREESURFERATOR: anatomical::AnatomicalSpec = anatomical::AnatomicalSpec {
    kind: ContainerKind::Freesurferator,
};
static RTPPREPROC: preproc::PreprocSpec = preproc::PreprocSpec {
    kind: ContainerKind::RtpPreproc,
};
static RTP2PREPROC: preproc::PreprocSpec = preproc::PreprocSpec {
    kind: ContainerKind::Rtp2Preproc,
};
static RTPPIPELINE: pipeline::PipelineSpec = pipeline::PipelineSpec {
    kind: ContainerKind::RtpPipeline,
};
static RTP2PIPELINE: pipeline::PipelineSpec = pipeline::PipelineSpec {
    kind: ContainerKind::Rtp2Pipeline,
};

/// Total over the closed set; the string-to-kind parse is the single gate
/// that keeps unsupported names out.
pub fn spec_for(kind: ContainerKind) -> &'static dyn ContainerSpec {
    match kind {
        ContainerKind::Anatrois => &ANATROIS,
        ContainerKind::Freesurferator => &FREESURFERATOR,
        ContainerKind::RtpPreproc => &RTPPREPROC,
        ContainerKind::Rtp2Preproc => &RTP2PREPROC,
        ContainerKind::RtpPipeline => &RTPPIPELINE,
        ContainerKind::Rtp2Pipeline => &RTP2PIPELINE,
    }
}

/// Container runtime binary name. Apptainer is the default; LC_RUNTIME=singularity
/// switches for hosts that still ship the old name.
pub fn runtime_binary() -> String {
    env::var("LC_RUNTIME")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "apptainer".to_string())
}

/// Shared apptainer-run template. Strategies pass their extra bind mounts;
/// the rendered string redirects all output into a timestamped per-run log.
pub(crate) fn render_apptainer_run(
    ctx: &LaunchContext,
    row: &SubjectSessionRow,
    now: DateTime<Local>,
    extra_binds: &[(PathBuf, &str)],
) -> String {
    let subses = ctx.subses_dir(row);
    let stamp = now.format("%Y%m%dT%H%M%S");
    let log_path = subses.join("log").join(format!(
        "t-{}-sub-{}_ses-{}_{}.log",
        ctx.kind, row.sub, row.ses, stamp
    ));

    let mut parts: Vec<String> = vec![
        runtime_binary(),
        "run".into(),
        "-e".into(),
        "--containall".into(),
    ];
    let mut push_bind = |host: &Path, container: &str| {
        parts.push("-B".into());
        parts.push(format!("{}:{}", shell_escape(&host.display().to_string()), container));
    };
    push_bind(&subses.join("input"), "/flywheel/v0/input:ro");
    push_bind(&subses.join("output"), "/flywheel/v0/output");
    push_bind(&subses.join("tmp"), "/tmp");
    push_bind(&ctx.container_config_copy(), "/flywheel/v0/config.json:ro");
    for (host, container) in extra_binds {
        push_bind(host, container);
    }
    parts.push(shell_escape(&ctx.sif_path().display().to_string()));

    format!(
        "{} >> {} 2>&1",
        parts.join(" "),
        shell_escape(&log_path.display().to_string())
    )
}
