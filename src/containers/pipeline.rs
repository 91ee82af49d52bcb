//! Tractography family: rtp-pipeline and rtp2-pipeline.
//!
//! Inputs span three upstreams: the anatomical fs.zip, the preprocessed
//! DWI triple, and the tractparams specification copied into the analysis
//! dir. Before anything is staged for a subject, the ROI pre-flight opens
//! fs.zip and verifies every label tractparams references is present as a
//! `.nii.gz` member; a missing label fails the subject before a multi-hour
//! container run can discover it.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::debug;

use crate::config::{ContainerKind, SubjectSessionRow};
use crate::errors::{LaunchError, Result};

use super::{render_apptainer_run, ContainerSpec, LaunchContext, PlannedLink};

pub struct PipelineSpec {
    pub kind: ContainerKind,
}

impl PipelineSpec {
    fn anat_dep(&self) -> &'static str {
        match self.kind {
            ContainerKind::Rtp2Pipeline => "freesurferator",
            _ => "anatrois",
        }
    }

    fn preproc_dep(&self) -> &'static str {
        match self.kind {
            ContainerKind::Rtp2Pipeline => "rtp2-preproc",
            _ => "rtppreproc",
        }
    }

    fn fs_zip_source(&self, ctx: &LaunchContext, row: &SubjectSessionRow) -> Result<PathBuf> {
        let analysis = ctx.require_opt("anatrois_analysis", &ctx.opts.anatrois_analysis)?;
        let version = ctx.require_opt("anatrois_version", &ctx.opts.anatrois_version)?;
        Ok(ctx
            .upstream_output_dir(self.anat_dep(), version, analysis, row)
            .join("fs.zip"))
    }
}

impl ContainerSpec for PipelineSpec {
    fn kind(&self) -> ContainerKind {
        self.kind
    }

    /// ROI completeness gate: runs once per subject before any symlink.
    fn preflight(&self, ctx: &LaunchContext, row: &SubjectSessionRow) -> Result<()> {
        let tractparams = ctx.tractparams_copy();
        let labels = required_rois(&tractparams)?;
        if labels.is_empty() {
            return Ok(());
        }
        let fs_zip = self.fs_zip_source(ctx, row)?;
        verify_rois_in_zip(&fs_zip, &labels)
    }

    fn plan_inputs(
        &self,
        ctx: &LaunchContext,
        row: &SubjectSessionRow,
    ) -> Result<Vec<PlannedLink>> {
        let preproc_analysis =
            ctx.require_opt("preproc_analysis", &ctx.opts.preproc_analysis)?;
        let preproc_version = ctx.require_opt("preproc_version", &ctx.opts.preproc_version)?;
        let preproc_out =
            ctx.upstream_output_dir(self.preproc_dep(), preproc_version, preproc_analysis, row);

        Ok(vec![
            PlannedLink::required(self.fs_zip_source(ctx, row)?, "anatomical/fs.zip"),
            PlannedLink::required(preproc_out.join("dwi.nii.gz"), "dwi/dwi.nii.gz"),
            PlannedLink::required(preproc_out.join("dwi.bval"), "bval/dwi.bval"),
            PlannedLink::required(preproc_out.join("dwi.bvec"), "bvec/dwi.bvec"),
            PlannedLink::required(ctx.tractparams_copy(), "tractparams/tractparams.csv"),
        ])
    }

    fn render_command(
        &self,
        ctx: &LaunchContext,
        row: &SubjectSessionRow,
        now: DateTime<Local>,
    ) -> Result<String> {
        let work = ctx.subses_dir(row).join("work");
        Ok(render_apptainer_run(
            ctx,
            row,
            now,
            &[(work, "/flywheel/v0/work")],
        ))
    }
}

/// Parse the ROI labels a tractparams file requires. Columns whose header
/// starts with "roi" contribute; cell values may join two labels with
/// `_AND_`. Empty cells and the literal NO placeholder are skipped.
pub fn required_rois(tractparams: &Path) -> Result<Vec<String>> {
    if !tractparams.is_file() {
        return Err(LaunchError::MissingFile(tractparams.to_path_buf()));
    }
    let text = std::fs::read_to_string(tractparams)?;
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| LaunchError::parse(tractparams, "empty tractparams file"))?;
    let roi_cols: Vec<usize> = header
        .split(',')
        .enumerate()
        .filter(|(_, name)| name.trim().to_ascii_lowercase().starts_with("roi"))
        .map(|(i, _)| i)
        .collect();
    if roi_cols.is_empty() {
        return Err(LaunchError::parse(
            tractparams,
            "tractparams header names no roi columns",
        ));
    }

    let mut labels: BTreeSet<String> = BTreeSet::new();
    for line in lines {
        let cells: Vec<&str> = line.split(',').collect();
        for &col in &roi_cols {
            let Some(cell) = cells.get(col) else { continue };
            let cell = cell.trim();
            if cell.is_empty() || cell.eq_ignore_ascii_case("no") {
                continue;
            }
            for label in cell.split("_AND_") {
                let label = label.trim();
                if !label.is_empty() {
                    labels.insert(label.to_string());
                }
            }
        }
    }
    Ok(labels.into_iter().collect())
}

/// Check that every label exists as a `.nii.gz` member of the archive.
/// Member paths vary across FreeSurfer layouts, so matching is on the
/// basename with the extension stripped.
pub fn verify_rois_in_zip(fs_zip: &Path, labels: &[String]) -> Result<()> {
    let file = File::open(fs_zip).map_err(|_| LaunchError::MissingFile(fs_zip.to_path_buf()))?;
    let archive = zip::ZipArchive::new(file)
        .map_err(|e| LaunchError::parse(fs_zip, format!("not a readable zip archive: {e}")))?;

    let present: BTreeSet<String> = archive
        .file_names()
        .filter_map(|name| {
            let base = name.rsplit('/').next()?;
            base.strip_suffix(".nii.gz").map(|s| s.to_string())
        })
        .collect();
    debug!(zip = %fs_zip.display(), members = present.len(), "roi preflight scan");

    let missing: Vec<String> = labels
        .iter()
        .filter(|l| !present.contains(*l))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(LaunchError::MissingRois {
            zip: fs_zip.to_path_buf(),
            labels: missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn write_fs_zip(path: &Path, members: &[&str]) {
        let f = File::create(path).expect("create zip");
        let mut zw = zip::ZipWriter::new(f);
        for m in members {
            zw.start_file(*m, FileOptions::default()).expect("member");
            zw.write_all(b"nifti").expect("payload");
        }
        zw.finish().expect("finish zip");
    }

    #[test]
    fn test_required_rois_splits_and_conjunctions() {
        let td = tempfile::tempdir().expect("tmpdir");
        let p = td.path().join("tractparams.csv");
        std::fs::write(
            &p,
            "label,fgnum,roi1,roi2,roi3,roi4\nAF_L,1,V1_L,MT_L_AND_V2_L,,NO\n",
        )
        .expect("write");
        let rois = required_rois(&p).expect("parse");
        assert_eq!(rois, vec!["MT_L", "V1_L", "V2_L"]);
    }

    #[test]
    fn test_required_rois_missing_file() {
        let err = required_rois(Path::new("/nonexistent/tractparams.csv")).unwrap_err();
        assert!(matches!(err, LaunchError::MissingFile(_)));
    }

    #[test]
    fn test_verify_rois_accepts_nested_members() {
        let td = tempfile::tempdir().expect("tmpdir");
        let zp = td.path().join("fs.zip");
        write_fs_zip(&zp, &["fs/ROIs/V1_L.nii.gz", "fs/ROIs/MT_L.nii.gz"]);
        verify_rois_in_zip(&zp, &["V1_L".into(), "MT_L".into()]).expect("all present");
    }

    #[test]
    fn test_verify_rois_reports_exact_missing_labels() {
        let td = tempfile::tempdir().expect("tmpdir");
        let zp = td.path().join("fs.zip");
        write_fs_zip(&zp, &["fs/ROIs/V1_L.nii.gz"]);
        let err = verify_rois_in_zip(&zp, &["V1_L".into(), "V2_L".into(), "MT_L".into()])
            .unwrap_err();
        match err {
            LaunchError::MissingRois { labels, .. } => {
                assert_eq!(labels, vec!["V2_L".to_string(), "MT_L".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_verify_rois_missing_zip_is_missing_file() {
        let err =
            verify_rois_in_zip(Path::new("/nonexistent/fs.zip"), &["V1".into()]).unwrap_err();
        assert!(matches!(err, LaunchError::MissingFile(_)));
    }
}
