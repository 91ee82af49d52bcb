//! Filesystem helpers shared by the folder builder and the input stager.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Create a directory (and parents) if it does not exist yet.
pub fn ensure_dir(p: &Path) -> io::Result<()> {
    if !p.is_dir() {
        fs::create_dir_all(p)?;
    }
    Ok(())
}

/// List the entries of a directory whose file name matches `pred`,
/// sorted by file name. Sorting removes any dependence on readdir order,
/// so repeated resolution always picks the same candidate.
pub fn sorted_matches(dir: &Path, pred: impl Fn(&str) -> bool) -> io::Result<Vec<PathBuf>> {
    let mut out: Vec<PathBuf> = Vec::new();
    if !dir.is_dir() {
        return Ok(out);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if pred(&name) {
            out.push(entry.path());
        }
    }
    out.sort();
    Ok(out)
}
