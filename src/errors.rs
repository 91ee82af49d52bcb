//! Error taxonomy and exit-code mapping.
//!
//! - Configuration errors are fatal and must surface before any filesystem
//!   mutation; they map to exit code 1.
//! - A missing external binary (apptainer, sbatch, qsub) maps to 127.
//! - Per-link staging failures are signaled, not fatal: the per-subject
//!   loop in `staging` records them and the batch continues.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to parse {}: {detail}", .path.display())]
    ConfigParse { path: PathBuf, detail: String },

    #[error("invalid configuration: {0}")]
    ConfigValue(String),

    #[error("container '{0}' is not a recognized container")]
    UnknownContainer(String),

    #[error("required file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("symlink source does not exist: {}", .0.display())]
    MissingSource(PathBuf),

    #[error("{} is missing ROI labels: {}", .zip.display(), .labels.join(", "))]
    MissingRois { zip: PathBuf, labels: Vec<String> },

    #[error("{0} is required but was not found in PATH")]
    RuntimeMissing(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, LaunchError>;

/// Map a LaunchError to a process exit code:
/// - 127 for a missing external binary (parity with shell "command not found"),
/// - 1 for everything else.
pub fn exit_code_for_error(e: &LaunchError) -> u8 {
    match e {
        LaunchError::RuntimeMissing(_) => 127,
        LaunchError::Io(ioe) if ioe.kind() == io::ErrorKind::NotFound => 127,
        _ => 1,
    }
}

impl LaunchError {
    /// Helper for YAML/CSV parse failures that keeps the offending path attached.
    pub fn parse(path: impl Into<PathBuf>, detail: impl ToString) -> Self {
        LaunchError::ConfigParse {
            path: path.into(),
            detail: detail.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(
            exit_code_for_error(&LaunchError::RuntimeMissing("sbatch".into())),
            127
        );
        assert_eq!(
            exit_code_for_error(&LaunchError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "gone"
            ))),
            127
        );
        assert_eq!(
            exit_code_for_error(&LaunchError::ConfigValue("bad".into())),
            1
        );
        assert_eq!(
            exit_code_for_error(&LaunchError::MissingFile(PathBuf::from("/x"))),
            1
        );
    }

    #[test]
    fn test_missing_rois_lists_labels() {
        let e = LaunchError::MissingRois {
            zip: PathBuf::from("/tmp/fs.zip"),
            labels: vec!["V1".into(), "MT_AND_V2".into()],
        };
        let s = e.to_string();
        assert!(s.contains("V1"));
        assert!(s.contains("MT_AND_V2"));
    }
}
