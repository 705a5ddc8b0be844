//! Per-package lock files shared between concurrent mclazy processes.
//!
//! A lock file contains the decimal PID of its owner. Ownership is checked
//! by asking a [`LivenessProbe`] whether that PID still runs, not by a kernel
//! lock, so a file that outlives its process marks an unclean exit and is
//! reported instead of being reclaimed.

use crate::error::{MclazyError, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, warn};

pub const LOCK_SUFFIX: &str = "mclazy.lock";

/// Answers whether a process id belongs to a running process.
pub trait LivenessProbe {
    fn is_alive(&self, pid: u32) -> bool;
}

/// Liveness through `/proc/<pid>`
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcfsProbe;

impl LivenessProbe for ProcfsProbe {
    fn is_alive(&self, pid: u32) -> bool {
        Path::new("/proc").join(pid.to_string()).is_dir()
    }
}

pub struct ProcessLock<P: LivenessProbe = ProcfsProbe> {
    probe: P,
}

impl Default for ProcessLock<ProcfsProbe> {
    fn default() -> Self {
        Self::with_probe(ProcfsProbe)
    }
}

impl<P: LivenessProbe> ProcessLock<P> {
    pub fn with_probe(probe: P) -> Self {
        Self { probe }
    }

    /// Lock file location for a package inside the cache directory
    pub fn lock_path(cache: &Path, pkgname: &str) -> PathBuf {
        cache.join(format!("{pkgname}-{LOCK_SUFFIX}"))
    }

    /// Create the lock file, or report who already owns it.
    ///
    /// Returns `LockHeld` when the recorded owner is running and `StaleLock`
    /// when it is not; a stale file is left in place for the operator.
    pub fn acquire<Q: AsRef<Path>>(&self, path: Q) -> Result<LockGuard> {
        let path = path.as_ref();

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(self.existing_owner(path));
            }
            Err(e) => return Err(e.into()),
        };

        let guard = LockGuard {
            path: path.to_path_buf(),
        };
        write!(file, "{}", process::id())?;
        debug!("Acquired lock {}", path.display());
        Ok(guard)
    }

    fn existing_owner(&self, path: &Path) -> MclazyError {
        let pid = fs::read_to_string(path)
            .ok()
            .and_then(|content| content.trim().parse::<u32>().ok());

        match pid {
            Some(pid) if self.probe.is_alive(pid) => MclazyError::LockHeld { pid },
            pid => MclazyError::StaleLock {
                path: path.to_path_buf(),
                pid,
            },
        }
    }
}

/// Removes the lock file when dropped, on every exit path.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Released lock {}", self.path.display()),
            Err(e) => warn!("Failed to remove lock {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use tempfile::tempdir;

    struct FixedProbe(bool);

    impl LivenessProbe for FixedProbe {
        fn is_alive(&self, _pid: u32) -> bool {
            self.0
        }
    }

    #[test]
    fn acquire_writes_pid_and_drop_removes() {
        let dir = tempdir().unwrap();
        let path = ProcessLock::<ProcfsProbe>::lock_path(dir.path(), "gtk4");
        assert!(path.ends_with("gtk4-mclazy.lock"));

        let lock = ProcessLock::with_probe(FixedProbe(true));
        let guard = lock.acquire(&path).unwrap();
        assert_eq!(
            fs::read_to_string(guard.path()).unwrap(),
            process::id().to_string()
        );

        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn live_owner_is_reported_as_held() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("glib2-mclazy.lock");
        fs::write(&path, "4242").unwrap();

        let err = ProcessLock::with_probe(FixedProbe(true))
            .acquire(&path)
            .unwrap_err();
        assert!(matches!(err, MclazyError::LockHeld { pid: 4242 }));
        assert!(path.exists());
    }

    #[test]
    fn dead_owner_is_stale_and_left_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("glib2-mclazy.lock");
        fs::write(&path, "4242\n").unwrap();

        let err = ProcessLock::with_probe(FixedProbe(false))
            .acquire(&path)
            .unwrap_err();
        assert!(matches!(err, MclazyError::StaleLock { pid: Some(4242), .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "4242\n");
    }

    #[test]
    fn garbage_pid_is_stale() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("glib2-mclazy.lock");
        fs::write(&path, "not a pid").unwrap();

        let err = ProcessLock::with_probe(FixedProbe(true))
            .acquire(&path)
            .unwrap_err();
        assert!(matches!(err, MclazyError::StaleLock { pid: None, .. }));
    }

    #[test]
    fn released_when_section_panics() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mutter-mclazy.lock");
        let lock = ProcessLock::with_probe(FixedProbe(true));

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard = lock.acquire(&path).unwrap();
            assert!(path.exists());
            panic!("build exploded");
        }));

        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn released_on_early_return() {
        fn critical_section(lock: &ProcessLock<FixedProbe>, path: &Path) -> Result<()> {
            let _guard = lock.acquire(path)?;
            Err(MclazyError::external("Commit", "nothing to commit"))
        }

        let dir = tempdir().unwrap();
        let path = dir.path().join("mutter-mclazy.lock");
        let lock = ProcessLock::with_probe(FixedProbe(true));

        assert!(critical_section(&lock, &path).is_err());
        assert!(!path.exists());
        assert!(lock.acquire(&path).is_ok());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn procfs_sees_current_process() {
        assert!(ProcfsProbe.is_alive(process::id()));
    }
}
