//! Launch config (YAML) and subject-session list loading.
//!
//! Both loaders are side-effect free: they read, validate, and return typed
//! values or fail with a `ConfigParse`/`ConfigValue` error before anything
//! touches the filesystem.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{LaunchError, Result};
use crate::util::is_valid_bids_label;

/// The closed set of supported containers. Anything else in
/// `general.container` is a fatal configuration error.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum ContainerKind {
    Anatrois,
    Freesurferator,
    RtpPreproc,
    Rtp2Preproc,
    RtpPipeline,
    Rtp2Pipeline,
}

pub const ALL_CONTAINERS: [ContainerKind; 6] = [
    ContainerKind::Anatrois,
    ContainerKind::Freesurferator,
    ContainerKind::RtpPreproc,
    ContainerKind::Rtp2Preproc,
    ContainerKind::RtpPipeline,
    ContainerKind::Rtp2Pipeline,
];

impl ContainerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::Anatrois => "anatrois",
            ContainerKind::Freesurferator => "freesurferator",
            ContainerKind::RtpPreproc => "rtppreproc",
            ContainerKind::Rtp2Preproc => "rtp2-preproc",
            ContainerKind::RtpPipeline => "rtp-pipeline",
            ContainerKind::Rtp2Pipeline => "rtp2-pipeline",
        }
    }

    /// Anatomical segmentation stages produce fs.zip consumed downstream.
    pub fn is_anatomical(&self) -> bool {
        matches!(self, ContainerKind::Anatrois | ContainerKind::Freesurferator)
    }

    pub fn is_preproc(&self) -> bool {
        matches!(self, ContainerKind::RtpPreproc | ContainerKind::Rtp2Preproc)
    }

    /// Tractography pipelines carry the tractparams ROI pre-flight.
    pub fn is_pipeline(&self) -> bool {
        matches!(self, ContainerKind::RtpPipeline | ContainerKind::Rtp2Pipeline)
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerKind {
    type Err = LaunchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "anatrois" => Ok(ContainerKind::Anatrois),
            "freesurferator" => Ok(ContainerKind::Freesurferator),
            "rtppreproc" => Ok(ContainerKind::RtpPreproc),
            "rtp2-preproc" => Ok(ContainerKind::Rtp2Preproc),
            "rtp-pipeline" => Ok(ContainerKind::RtpPipeline),
            "rtp2-pipeline" => Ok(ContainerKind::Rtp2Pipeline),
            other => Err(LaunchError::UnknownContainer(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchConfig {
    pub general: GeneralConfig,
    #[serde(default)]
    pub container_specific: BTreeMap<String, ContainerOpts>,
    #[serde(default)]
    pub host_options: BTreeMap<String, HostOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Project root; the BIDS dataset lives at `<basedir>/<bidsdir_name>`.
    pub basedir: PathBuf,
    pub bidsdir_name: String,
    /// Directory holding the .sif images, one per container_version.
    pub containerdir: PathBuf,
    pub container: String,
    pub analysis_name: String,
    /// Which dispatcher family to use: local | slurm | sge.
    pub host: String,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

/// Per-container options. One struct covers the whole family; each container
/// strategy validates the fields it actually requires.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerOpts {
    pub version: String,
    /// Anatomical family: link an existing fs.zip instead of segmenting anew.
    #[serde(default)]
    pub pre_fs: bool,
    /// Analysis name of a prior anatomical run (pre_fs source, or the
    /// upstream dependency of preproc/pipeline stages).
    #[serde(default)]
    pub anatrois_analysis: Option<String>,
    /// Version of the upstream anatomical container that produced fs.zip.
    #[serde(default)]
    pub anatrois_version: Option<String>,
    /// Preproc/pipeline: analysis name of the upstream DWI preprocessing run.
    #[serde(default)]
    pub preproc_analysis: Option<String>,
    #[serde(default)]
    pub preproc_version: Option<String>,
    /// Preproc family: stage a reverse phase-encoding acquisition as well.
    #[serde(default)]
    pub rpe: bool,
}

/// Resource/queue parameters for one host entry. The same fields feed the
/// SLURM and SGE script preambles; local entries only use launch_mode/njobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostOptions {
    #[serde(default)]
    pub launch_mode: Option<String>,
    #[serde(default)]
    pub njobs: Option<usize>,
    #[serde(default)]
    pub queue: Option<String>,
    #[serde(default)]
    pub cores: Option<u32>,
    #[serde(default)]
    pub memory: Option<String>,
    #[serde(default)]
    pub walltime: Option<String>,
    #[serde(default)]
    pub qos: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    /// `module load` lines emitted before the command in batch scripts.
    #[serde(default)]
    pub modules: Vec<String>,
}

impl LaunchConfig {
    /// The validated container kind from `general.container`.
    pub fn container_kind(&self) -> Result<ContainerKind> {
        self.general.container.parse()
    }

    /// Options block for the configured container. Missing block is a
    /// configuration error: every container needs at least a version.
    pub fn container_opts(&self) -> Result<&ContainerOpts> {
        self.container_specific
            .get(&self.general.container)
            .ok_or_else(|| {
                LaunchError::ConfigValue(format!(
                    "container_specific has no entry for '{}'",
                    self.general.container
                ))
            })
    }

    pub fn host_opts(&self) -> HostOptions {
        self.host_options
            .get(&self.general.host)
            .cloned()
            .unwrap_or_default()
    }

    /// `<basedir>/<bidsdir_name>` - the BIDS dataset root.
    pub fn bids_dir(&self) -> PathBuf {
        self.general.basedir.join(&self.general.bidsdir_name)
    }
}

pub fn load_launch_config(path: &Path) -> Result<LaunchConfig> {
    if !path.is_file() {
        return Err(LaunchError::MissingFile(path.to_path_buf()));
    }
    let text = fs::read_to_string(path)?;
    let cfg: LaunchConfig =
        serde_yaml::from_str(&text).map_err(|e| LaunchError::parse(path, e))?;
    validate_launch_config(&cfg)?;
    Ok(cfg)
}

fn validate_launch_config(cfg: &LaunchConfig) -> Result<()> {
    // Container must be in the closed set; checked before any directory work.
    let kind = cfg.container_kind()?;
    let opts = cfg.container_opts()?;
    if opts.version.trim().is_empty() {
        return Err(LaunchError::ConfigValue(format!(
            "container_specific.{}.version must not be empty",
            kind
        )));
    }
    match cfg.general.host.as_str() {
        "local" | "slurm" | "sge" => {}
        other => {
            return Err(LaunchError::ConfigValue(format!(
                "general.host must be one of local, slurm, sge (got '{other}')"
            )))
        }
    }
    if cfg.general.analysis_name.trim().is_empty() {
        return Err(LaunchError::ConfigValue(
            "general.analysis_name must not be empty".into(),
        ));
    }
    Ok(())
}

/// One row of the subject-session list. Flags are real booleans; the strings
/// "True"/"False" (any case) and "1"/"0" are accepted at the parsing boundary
/// and anything else is a parse error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectSessionRow {
    pub sub: String,
    pub ses: String,
    pub run: bool,
    pub anat: bool,
    pub dwi: bool,
    pub func: bool,
}

impl SubjectSessionRow {
    pub fn label(&self) -> String {
        format!("sub-{}_ses-{}", self.sub, self.ses)
    }
}

fn parse_flag(raw: &str, column: &str, line_no: usize, path: &Path) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(LaunchError::parse(
            path,
            format!("line {line_no}: column {column} has unrecognized flag value '{other}'"),
        )),
    }
}

const SUBSES_HEADER: [&str; 6] = ["sub", "ses", "RUN", "anat", "dwi", "func"];

/// Load the subject-session list. Accepts comma or tab delimiters (chosen per
/// line by whichever is present), requires the canonical header, and rejects
/// duplicate (sub, ses) pairs.
pub fn load_subses_list(path: &Path) -> Result<Vec<SubjectSessionRow>> {
    if !path.is_file() {
        return Err(LaunchError::MissingFile(path.to_path_buf()));
    }
    let text = fs::read_to_string(path)?;
    parse_subses_list(&text, path)
}

fn split_row(line: &str) -> Vec<String> {
    let delim = if line.contains('\t') { '\t' } else { ',' };
    line.split(delim).map(|s| s.trim().to_string()).collect()
}

pub(crate) fn parse_subses_list(text: &str, path: &Path) -> Result<Vec<SubjectSessionRow>> {
    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

    let (_, header) = lines
        .next()
        .ok_or_else(|| LaunchError::parse(path, "empty subject-session list"))?;
    let fields = split_row(header);
    let canonical: Vec<String> = SUBSES_HEADER.iter().map(|s| s.to_lowercase()).collect();
    let got: Vec<String> = fields.iter().map(|s| s.to_lowercase()).collect();
    if got != canonical {
        return Err(LaunchError::parse(
            path,
            format!(
                "header must be '{}' (got '{}')",
                SUBSES_HEADER.join(","),
                header.trim()
            ),
        ));
    }

    let mut rows: Vec<SubjectSessionRow> = Vec::new();
    let mut seen: std::collections::BTreeSet<(String, String)> = Default::default();
    for (idx, line) in lines {
        let line_no = idx + 1;
        let cols = split_row(line);
        if cols.len() != SUBSES_HEADER.len() {
            return Err(LaunchError::parse(
                path,
                format!(
                    "line {line_no}: expected {} columns, got {}",
                    SUBSES_HEADER.len(),
                    cols.len()
                ),
            ));
        }
        let sub = cols[0].clone();
        let ses = cols[1].clone();
        for (what, v) in [("sub", &sub), ("ses", &ses)] {
            if !is_valid_bids_label(v) {
                return Err(LaunchError::parse(
                    path,
                    format!("line {line_no}: {what} '{v}' is not a valid BIDS label"),
                ));
            }
        }
        if !seen.insert((sub.clone(), ses.clone())) {
            return Err(LaunchError::ConfigValue(format!(
                "duplicate (sub, ses) pair in subject-session list: ({sub}, {ses})"
            )));
        }
        rows.push(SubjectSessionRow {
            run: parse_flag(&cols[2], "RUN", line_no, path)?,
            anat: parse_flag(&cols[3], "anat", line_no, path)?,
            dwi: parse_flag(&cols[4], "dwi", line_no, path)?,
            func: parse_flag(&cols[5], "func", line_no, path)?,
            sub,
            ses,
        });
    }
    Ok(rows)
}

/// Serialize rows back into the canonical comma-delimited form (used by
/// gen-subses and by the prepare copy step's round-trip tests).
pub fn write_subses_list(path: &Path, rows: &[SubjectSessionRow]) -> Result<()> {
    let mut out = String::new();
    out.push_str(&SUBSES_HEADER.join(","));
    out.push('\n');
    for r in rows {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            r.sub, r.ses, r.run, r.anat, r.dwi, r.func
        ));
    }
    fs::write(path, out)?;
    Ok(())
}
