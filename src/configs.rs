//! Example config templates and config archiving.
//!
//! `copy-configs` seeds a directory with editable starting points;
//! `zip-configs` archives the artifacts recorded in an analysis dir so a
//! launch can be reproduced or attached to a report.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use tracing::info;
use zip::write::FileOptions;

use crate::errors::{LaunchError, Result};
use crate::util::fs::ensure_dir;

pub const EXAMPLE_LC_CONFIG: &str = r#"general:
  basedir: /export/home/user/project
  bidsdir_name: BIDS
  containerdir: /export/home/user/containers
  container: anatrois
  analysis_name: "01"
  host: local
  force: false

container_specific:
  anatrois:
    version: 4.6.1-7.3.2
    pre_fs: false
  rtp2-preproc:
    version: 0.1.1
    anatrois_analysis: "01"
    anatrois_version: 4.6.1-7.3.2
    rpe: true
  rtp2-pipeline:
    version: 0.1.2
    anatrois_analysis: "01"
    anatrois_version: 4.6.1-7.3.2
    preproc_analysis: "01"
    preproc_version: 0.1.1

host_options:
  local:
    launch_mode: serial
    njobs: 2
  slurm:
    queue: regular
    cores: 8
    memory: 32G
    walltime: "23:00:00"
    modules: [apptainer]
  sge:
    queue: long.q
    cores: 8
    memory: 32G
    walltime: "23:00:00"
"#;

pub const EXAMPLE_SUBSESLIST: &str = "sub,ses,RUN,anat,dwi,func\n01,01,True,True,True,True\n02,01,False,True,True,True\n";

pub const EXAMPLE_CONTAINER_CONFIG: &str = r#"{
  "inputs": {
    "anat": {"base": "file"}
  },
  "config": {}
}
"#;

pub const EXAMPLE_TRACTPARAMS: &str =
    "label,fgnum,roi1,roi2,roi3,roi4\nAF_L,1,Frontal_L,Temporal_L,,NO\n";

/// Write the editable example configs into `dir` (never overwrites).
pub fn copy_example_configs(dir: &Path) -> Result<()> {
    ensure_dir(dir)?;
    let files = [
        ("lc_config.yaml", EXAMPLE_LC_CONFIG),
        ("subseslist.txt", EXAMPLE_SUBSESLIST),
        ("container_config.json", EXAMPLE_CONTAINER_CONFIG),
        ("tractparams.csv", EXAMPLE_TRACTPARAMS),
    ];
    for (name, body) in files {
        let dst = dir.join(name);
        if dst.exists() {
            return Err(LaunchError::ConfigValue(format!(
                "{} already exists; refusing to overwrite example configs",
                dst.display()
            )));
        }
        fs::write(&dst, body)?;
    }
    info!(dir = %dir.display(), "example configs written");
    Ok(())
}

/// Zip the config artifacts of an analysis dir. The launch config and the
/// subject-session list are required; container config and tractparams go in
/// when present.
pub fn zip_analysis_configs(analysis_dir: &Path, out: &Path) -> Result<usize> {
    let required = ["lc_config.yaml", "subseslist.txt"];
    for name in required {
        if !analysis_dir.join(name).is_file() {
            return Err(LaunchError::MissingFile(analysis_dir.join(name)));
        }
    }

    let file = File::create(out)?;
    let mut zw = zip::ZipWriter::new(file);
    let mut count = 0usize;
    let mut candidates: Vec<String> = required.iter().map(|s| s.to_string()).collect();
    candidates.push("tractparams.csv".to_string());
    for entry in fs::read_dir(analysis_dir)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if name.ends_with(".json") {
                candidates.push(name.to_string());
            }
        }
    }
    candidates.sort();
    candidates.dedup();

    for name in candidates {
        let src = analysis_dir.join(&name);
        if !src.is_file() {
            continue;
        }
        zw.start_file(name.as_str(), FileOptions::default())
            .map_err(|e| LaunchError::parse(out, e))?;
        let mut buf = Vec::new();
        File::open(&src)?.read_to_end(&mut buf)?;
        zw.write_all(&buf)?;
        count += 1;
    }
    zw.finish().map_err(|e| LaunchError::parse(out, e))?;
    info!(out = %out.display(), files = count, "config archive written");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_examples_then_refuse_overwrite() {
        let td = tempfile::tempdir().expect("tmpdir");
        copy_example_configs(td.path()).expect("copy");
        assert!(td.path().join("lc_config.yaml").is_file());
        let err = copy_example_configs(td.path()).unwrap_err();
        assert!(err.to_string().contains("refusing to overwrite"));
    }

    #[test]
    fn test_example_lc_config_parses() {
        let cfg: crate::config::LaunchConfig =
            serde_yaml::from_str(EXAMPLE_LC_CONFIG).expect("example yaml parses");
        assert!(cfg.container_kind().is_ok());
    }

    #[test]
    fn test_example_subseslist_parses() {
        let rows = crate::config::parse_subses_list(
            EXAMPLE_SUBSESLIST,
            Path::new("subseslist.txt"),
        )
        .expect("example list parses");
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_zip_analysis_configs() {
        let td = tempfile::tempdir().expect("tmpdir");
        fs::write(td.path().join("lc_config.yaml"), "general: {}\n").unwrap();
        fs::write(td.path().join("subseslist.txt"), "sub,ses\n").unwrap();
        fs::write(td.path().join("anatrois.json"), "{}\n").unwrap();
        let out = td.path().join("configs.zip");
        let n = zip_analysis_configs(td.path(), &out).expect("zip");
        assert_eq!(n, 3);

        let f = File::open(&out).unwrap();
        let za = zip::ZipArchive::new(f).unwrap();
        let names: Vec<&str> = za.file_names().collect();
        assert!(names.contains(&"lc_config.yaml"));
        assert!(names.contains(&"anatrois.json"));
    }

    #[test]
    fn test_zip_requires_launch_config() {
        let td = tempfile::tempdir().expect("tmpdir");
        let err =
            zip_analysis_configs(td.path(), &td.path().join("x.zip")).unwrap_err();
        assert!(matches!(err, LaunchError::MissingFile(_)));
    }
}
