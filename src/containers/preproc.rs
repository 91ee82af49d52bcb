//! DWI preprocessing family: rtppreproc and rtp2-preproc.
//!
//! Inputs come from two places: the upstream anatomical analysis (T1 and
//! brainmask) and the raw BIDS dwi dir (forward acquisition, plus the
//! reverse phase-encoding set when `rpe` is configured). The rtp2 variant
//! consumes freesurferator output; the legacy variant consumes anatrois.

use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::config::{ContainerKind, SubjectSessionRow};
use crate::errors::Result;
use crate::util::fs::sorted_matches;

use super::{render_apptainer_run, ContainerSpec, LaunchContext, PlannedLink};

pub struct PreprocSpec {
    pub kind: ContainerKind,
}

impl PreprocSpec {
    fn anat_dep(&self) -> &'static str {
        match self.kind {
            ContainerKind::Rtp2Preproc => "freesurferator",
            _ => "anatrois",
        }
    }

    /// Forward/reverse DWI triple (nii, bval, bvec) from the raw dwi dir.
    /// Forward prefers `dir-AP`, reverse requires `dir-PA`; the fallback for
    /// forward is the sorted-first `_dwi.nii.gz` when no direction entity is
    /// present in the dataset.
    fn dwi_triple(
        &self,
        ctx: &LaunchContext,
        row: &SubjectSessionRow,
        reverse: bool,
    ) -> Result<(PathBuf, PathBuf, PathBuf)> {
        let dwi_dir = ctx.raw_modality_dir(row, "dwi");
        let dir_tag = if reverse { "dir-PA" } else { "dir-AP" };
        let mut hits = sorted_matches(&dwi_dir, |n| {
            n.ends_with("_dwi.nii.gz") && n.contains(dir_tag)
        })?;
        if hits.is_empty() && !reverse {
            hits = sorted_matches(&dwi_dir, |n| n.ends_with("_dwi.nii.gz"))?;
        }
        let nii = hits.into_iter().next().unwrap_or_else(|| {
            dwi_dir.join(format!(
                "sub-{}_ses-{}_{}_dwi.nii.gz",
                row.sub, row.ses, dir_tag
            ))
        });
        let stem = nii
            .to_string_lossy()
            .trim_end_matches(".nii.gz")
            .to_string();
        Ok((
            nii.clone(),
            PathBuf::from(format!("{stem}.bval")),
            PathBuf::from(format!("{stem}.bvec")),
        ))
    }
}

impl ContainerSpec for PreprocSpec {
    fn kind(&self) -> ContainerKind {
        self.kind
    }

    fn plan_inputs(
        &self,
        ctx: &LaunchContext,
        row: &SubjectSessionRow,
    ) -> Result<Vec<PlannedLink>> {
        let analysis = ctx.require_opt("anatrois_analysis", &ctx.opts.anatrois_analysis)?;
        let version = ctx.require_opt("anatrois_version", &ctx.opts.anatrois_version)?;
        let anat_out = ctx.upstream_output_dir(self.anat_dep(), version, analysis, row);

        let mut links = vec![
            PlannedLink::required(anat_out.join("T1.nii.gz"), "ANAT/T1.nii.gz"),
            PlannedLink::required(anat_out.join("brainmask.nii.gz"), "FSMASK/brainmask.nii.gz"),
        ];

        let (nii, bval, bvec) = self.dwi_triple(ctx, row, false)?;
        links.push(PlannedLink::required(nii, "DIFF/dwiF.nii.gz"));
        links.push(PlannedLink::required(bval, "BVAL/dwiF.bval"));
        links.push(PlannedLink::required(bvec, "BVEC/dwiF.bvec"));

        if ctx.opts.rpe {
            let (rnii, rbval, rbvec) = self.dwi_triple(ctx, row, true)?;
            links.push(PlannedLink::required(rnii, "RDIF/dwiR.nii.gz"));
            links.push(PlannedLink::required(rbval, "RBVL/dwiR.bval"));
            links.push(PlannedLink::required(rbvec, "RBVC/dwiR.bvec"));
        }
        Ok(links)
    }

    fn render_command(
        &self,
        ctx: &LaunchContext,
        row: &SubjectSessionRow,
        now: DateTime<Local>,
    ) -> Result<String> {
        Ok(render_apptainer_run(ctx, row, now, &[]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContainerOpts, GeneralConfig, LaunchConfig};
    use std::collections::BTreeMap;

    fn ctx(rpe: bool, basedir: PathBuf) -> LaunchContext {
        let mut container_specific = BTreeMap::new();
        container_specific.insert(
            "rtp2-preproc".to_string(),
            ContainerOpts {
                version: "2.1.0".into(),
                anatrois_analysis: Some("anat01".into()),
                anatrois_version: Some("0.2.0".into()),
                rpe,
                ..Default::default()
            },
        );
        let config = LaunchConfig {
            general: GeneralConfig {
                basedir: basedir.clone(),
                bidsdir_name: "BIDS".into(),
                containerdir: basedir.join("containers"),
                container: "rtp2-preproc".into(),
                analysis_name: "prep01".into(),
                host: "local".into(),
                force: false,
                log_dir: None,
            },
            container_specific,
            host_options: BTreeMap::new(),
        };
        let analysis_dir = basedir.join("BIDS/derivatives/rtp2-preproc_2.1.0/analysis-prep01");
        LaunchContext::new(config, analysis_dir).expect("ctx")
    }

    fn row() -> SubjectSessionRow {
        SubjectSessionRow {
            sub: "01".into(),
            ses: "01".into(),
            run: true,
            anat: true,
            dwi: true,
            func: false,
        }
    }

    #[test]
    fn test_plan_links_anat_from_freesurferator() {
        let td = tempfile::tempdir().expect("tmpdir");
        let c = ctx(false, td.path().to_path_buf());
        let plan = PreprocSpec {
            kind: ContainerKind::Rtp2Preproc,
        }
        .plan_inputs(&c, &row())
        .expect("plan");
        assert_eq!(plan.len(), 5);
        assert!(plan[0]
            .src
            .to_string_lossy()
            .contains("freesurferator_0.2.0/analysis-anat01"));
        assert_eq!(plan[1].dst, PathBuf::from("FSMASK/brainmask.nii.gz"));
    }

    #[test]
    fn test_rpe_adds_reverse_triple() {
        let td = tempfile::tempdir().expect("tmpdir");
        let c = ctx(true, td.path().to_path_buf());
        let plan = PreprocSpec {
            kind: ContainerKind::Rtp2Preproc,
        }
        .plan_inputs(&c, &row())
        .expect("plan");
        assert_eq!(plan.len(), 8);
        assert_eq!(plan[5].dst, PathBuf::from("RDIF/dwiR.nii.gz"));
        assert!(plan[5].src.to_string_lossy().contains("dir-PA"));
    }

    #[test]
    fn test_forward_prefers_dir_ap_over_fallback() {
        let td = tempfile::tempdir().expect("tmpdir");
        let c = ctx(false, td.path().to_path_buf());
        let dwi = c.raw_modality_dir(&row(), "dwi");
        std::fs::create_dir_all(&dwi).expect("mkdir");
        std::fs::write(dwi.join("sub-01_ses-01_acq-b1000_dwi.nii.gz"), b"x").expect("w");
        std::fs::write(dwi.join("sub-01_ses-01_dir-AP_dwi.nii.gz"), b"x").expect("w");
        let (nii, bval, _) = PreprocSpec {
            kind: ContainerKind::Rtp2Preproc,
        }
        .dwi_triple(&c, &row(), false)
        .expect("triple");
        assert!(nii.to_string_lossy().contains("dir-AP"));
        assert!(bval.to_string_lossy().ends_with("dir-AP_dwi.bval"));
    }
}
