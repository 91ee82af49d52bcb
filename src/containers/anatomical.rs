//! Anatomical segmentation family: anatrois and freesurferator.
//!
//! Inputs: the subject's T1w from the raw BIDS tree, plus (when `pre_fs` is
//! set) an fs.zip from a prior anatomical analysis so the container skips
//! recon and only extracts ROIs.

use chrono::{DateTime, Local};

use crate::config::{ContainerKind, SubjectSessionRow};
use crate::errors::Result;
use crate::util::fs::sorted_matches;

use super::{render_apptainer_run, ContainerSpec, LaunchContext, PlannedLink};

pub struct AnatomicalSpec {
    pub kind: ContainerKind,
}

impl AnatomicalSpec {
    /// Locate the forward T1w in the raw anat dir. When nothing matches, the
    /// canonical BIDS name is planned anyway so staging signals the missing
    /// source instead of silently producing an empty workspace.
    fn t1_source(&self, ctx: &LaunchContext, row: &SubjectSessionRow) -> Result<std::path::PathBuf> {
        let anat_dir = ctx.raw_modality_dir(row, "anat");
        let hits = sorted_matches(&anat_dir, |n| n.ends_with("_T1w.nii.gz"))?;
        Ok(hits.into_iter().next().unwrap_or_else(|| {
            anat_dir.join(format!("sub-{}_ses-{}_T1w.nii.gz", row.sub, row.ses))
        }))
    }
}

impl ContainerSpec for AnatomicalSpec {
    fn kind(&self) -> ContainerKind {
        self.kind
    }

    fn plan_inputs(
        &self,
        ctx: &LaunchContext,
        row: &SubjectSessionRow,
    ) -> Result<Vec<PlannedLink>> {
        let mut links = Vec::new();

        if ctx.opts.pre_fs {
            let analysis = ctx.require_opt("anatrois_analysis", &ctx.opts.anatrois_analysis)?;
            let version = ctx
                .opts
                .anatrois_version
                .as_deref()
                .unwrap_or(&ctx.opts.version);
            let src = ctx
                .upstream_output_dir(self.kind.as_str(), version, analysis, row)
                .join("fs.zip");
            links.push(PlannedLink::required(src, "pre_fs/existingFS.zip"));
            // T1 still staged when present; the container prefers the zip.
            links.push(PlannedLink::optional(
                self.t1_source(ctx, row)?,
                "anat/T1.nii.gz",
            ));
        } else {
            links.push(PlannedLink::required(
                self.t1_source(ctx, row)?,
                "anat/T1.nii.gz",
            ));
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
