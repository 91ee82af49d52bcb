//! Analysis-dir-scoped advisory locking.
//!
//! Concurrent `prepare`/`run` invocations over the same analysis dir would
//! interleave config copies and symlink staging; a non-blocking exclusive
//! lock turns that into a clean refusal. LC_SKIP_LOCK=1 opts out (used by
//! tests that exercise concurrent invocations deliberately).

use std::env;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

/// Lock guard that removes the lock file on drop.
#[derive(Debug)]
pub struct LaunchLock {
    file: File,
    path: PathBuf,
}

impl Drop for LaunchLock {
    fn drop(&mut self) {
        // Best-effort unlock; ignore errors
        let _ = self.file.unlock();

        let path = self.path.clone();
        for _ in 0..10 {
            if !path.exists() {
                break;
            }
            if fs::remove_file(&path).is_ok() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(100));
        }
    }
}

/// Honor LC_SKIP_LOCK=1 to skip acquiring any lock.
pub fn should_acquire_lock() -> bool {
    env::var("LC_SKIP_LOCK").ok().as_deref() != Some("1")
}

/// Candidate lock file locations for one analysis dir:
/// 1) `<analysis_dir>/.lc.lock` (preferred, visible next to the artifacts)
/// 2) `<XDG_RUNTIME_DIR|tmp>/lc.<hash(analysis_dir)>.lock`
/// 3) `/tmp/lc.<hash(analysis_dir)>.lock`
pub fn candidate_lock_paths(analysis_dir: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    paths.push(analysis_dir.join(".lc.lock"));

    let rt_base = env::var("XDG_RUNTIME_DIR")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(env::temp_dir);
    let hash = hash_key_hex(&normalized_key(analysis_dir));
    paths.push(rt_base.join(format!("lc.{}.lock", hash)));
    paths.push(PathBuf::from("/tmp").join(format!("lc.{}.lock", hash)));
    paths
}

/// Acquire a non-blocking exclusive lock for the analysis dir, trying each
/// candidate in order.
pub fn acquire_lock(analysis_dir: &Path) -> io::Result<LaunchLock> {
    let paths = candidate_lock_paths(analysis_dir);
    let mut last_err: Option<io::Error> = None;

    for p in &paths {
        if let Some(parent) = p.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(p)
        {
            Ok(f) => match f.try_lock_exclusive() {
                Ok(_) => {
                    return Ok(LaunchLock {
                        file: f,
                        path: p.clone(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Err(io::Error::other(
                        "another lc invocation is already working on this analysis dir (lock held); try again later",
                    ));
                }
                Err(e) => {
                    last_err = Some(e);
                    continue;
                }
            },
            Err(e) => {
                last_err = Some(e);
                continue;
            }
        }
    }

    let mut msg = String::from("failed to create a lock file in any candidate location: ");
    msg.push_str(
        &paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    );
    if let Some(e) = last_err {
        msg.push_str(&format!(" (last error: {e})"));
    }
    Err(io::Error::other(msg))
}

fn normalized_key(p: &Path) -> String {
    let abs = fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());
    abs.to_string_lossy().to_string()
}

/// Stable 64-bit FNV-1a hash; returns 16-hex lowercase id.
pub fn hash_key_hex(s: &str) -> String {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 1099511628211;
    let mut h: u64 = FNV_OFFSET;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    format!("{:016x}", h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_paths_start_in_dir() {
        let td = tempfile::tempdir().expect("tmpdir");
        let paths = candidate_lock_paths(td.path());
        assert_eq!(paths[0], td.path().join(".lc.lock"));
        assert!(paths.len() >= 3);
    }

    #[test]
    fn test_lock_is_exclusive_and_released_on_drop() {
        let td = tempfile::tempdir().expect("tmpdir");
        let lock = acquire_lock(td.path()).expect("first lock");
        let err = acquire_lock(td.path()).unwrap_err();
        assert!(err.to_string().contains("lock held"));
        drop(lock);
        let relock = acquire_lock(td.path()).expect("relock after drop");
        drop(relock);
    }

    #[test]
    fn test_should_acquire_lock_env() {
        env::remove_var("LC_SKIP_LOCK");
        assert!(should_acquire_lock());
        env::set_var("LC_SKIP_LOCK", "1");
        assert!(!should_acquire_lock());
        env::remove_var("LC_SKIP_LOCK");
    }

    #[test]
    fn test_hash_key_stable() {
        assert_eq!(hash_key_hex("abc"), hash_key_hex("abc"));
        assert_ne!(hash_key_hex("abc"), hash_key_hex("abd"));
        assert_eq!(hash_key_hex("x").len(), 16);
    }
}
