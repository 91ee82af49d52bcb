//! Shared fixtures: a miniature BIDS project with upstream derivatives.

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn write_fs_zip(path: &Path, members: &[&str]) {
    fs::create_dir_all(path.parent().unwrap()).expect("zip parent");
    let f = File::create(path).expect("create zip");
    let mut zw = zip::ZipWriter::new(f);
    for m in members {
        zw.start_file(*m, zip::write::FileOptions::default())
            .expect("member");
        zw.write_all(b"nifti").expect("payload");
    }
    zw.finish().expect("finish zip");
}

pub fn touch(p: &Path) {
    fs::create_dir_all(p.parent().unwrap()).expect("parents");
    fs::write(p, b"x").expect("write");
}

/// Launch config YAML for a given container on the local/serial backend.
pub fn launch_config_yaml(basedir: &Path, container: &str, specific: &str) -> String {
    format!(
        r#"general:
  basedir: {base}
  bidsdir_name: BIDS
  containerdir: {base}/containers
  container: {container}
  analysis_name: t01
  host: local
container_specific:
{specific}
host_options:
  local:
    launch_mode: serial
"#,
        base = basedir.display(),
        container = container,
        specific = specific,
    )
}

pub fn anatrois_specific() -> String {
    "  anatrois:\n    version: 4.6.1\n".to_string()
}

pub fn rtp2_pipeline_specific() -> String {
    concat!(
        "  rtp2-pipeline:\n",
        "    version: 1.0.0\n",
        "    anatrois_analysis: anat01\n",
        "    anatrois_version: 0.2.0\n",
        "    preproc_analysis: prep01\n",
        "    preproc_version: 2.1.0\n",
    )
    .to_string()
}

/// Raw + upstream layout for one subject of the rtp2-pipeline scenario.
pub fn seed_pipeline_upstreams(basedir: &Path, sub: &str, ses: &str, rois: &[&str]) {
    let bids = basedir.join("BIDS");
    let members: Vec<String> = rois
        .iter()
        .map(|r| format!("fs/ROIs/{r}.nii.gz"))
        .collect();
    let member_refs: Vec<&str> = members.iter().map(String::as_str).collect();
    write_fs_zip(
        &bids.join(format!(
            "derivatives/freesurferator_0.2.0/analysis-anat01/sub-{sub}/ses-{ses}/output/fs.zip"
        )),
        &member_refs,
    );
    let preproc = bids.join(format!(
        "derivatives/rtp2-preproc_2.1.0/analysis-prep01/sub-{sub}/ses-{ses}/output"
    ));
    for name in ["dwi.nii.gz", "dwi.bval", "dwi.bvec"] {
        touch(&preproc.join(name));
    }
}

/// Write the prepare-time source artifacts next to the project and return
/// their paths (lc_config, subseslist, container json, tractparams).
pub fn seed_artifacts(
    basedir: &Path,
    container: &str,
    specific: &str,
    subses_rows: &str,
    tractparams: Option<&str>,
) -> (PathBuf, PathBuf, PathBuf, Option<PathBuf>) {
    let lcc = basedir.join("lc_config.yaml");
    fs::write(&lcc, launch_config_yaml(basedir, container, specific)).expect("lc config");
    let ssl = basedir.join("subseslist.txt");
    fs::write(&ssl, format!("sub,ses,RUN,anat,dwi,func\n{subses_rows}")).expect("subses");
    let cc = basedir.join(format!("{container}.json"));
    fs::write(&cc, "{\"inputs\": {}}\n").expect("container config");
    let tp = tractparams.map(|body| {
        let p = basedir.join("tractparams.csv");
        fs::write(&p, body).expect("tractparams");
        p
    });
    (lcc, ssl, cc, tp)
}
