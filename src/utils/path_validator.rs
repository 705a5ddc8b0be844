use crate::error::{MclazyError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Keeps the package cache away from system directories and checkouts inside it.
pub struct PathValidator;

impl PathValidator {
    /// Create the cache directory if needed and return its canonical path.
    pub fn prepare_cache_dir(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        if !path.exists() {
            fs::create_dir_all(path).map_err(|e| {
                MclazyError::Configuration(format!(
                    "Failed to create cache '{}': {e}",
                    path.display()
                ))
            })?;
        }

        let canonical = path.canonicalize().map_err(|e| {
            MclazyError::Configuration(format!("Invalid cache path '{}': {e}", path.display()))
        })?;

        if !canonical.is_dir() {
            return Err(MclazyError::Configuration(format!(
                "Cache '{}' is not a directory",
                canonical.display()
            )));
        }

        const FORBIDDEN: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot"];

        for forbidden in FORBIDDEN {
            let forbidden_path = Path::new(forbidden);

            if canonical.starts_with(forbidden_path) {
                return Err(MclazyError::Configuration(format!(
                    "Using system directory '{}' as cache is not allowed",
                    forbidden
                )));
            }

            if let Ok(canonical_forbidden) = forbidden_path.canonicalize() {
                if canonical.starts_with(&canonical_forbidden) {
                    return Err(MclazyError::Configuration(format!(
                        "Using system directory '{}' as cache is not allowed",
                        forbidden
                    )));
                }
            }
        }

        Ok(canonical)
    }

    /// Ensures a package name maps to a directory directly inside the cache.
    pub fn package_dir(cache: &Path, pkgname: &str) -> Result<PathBuf> {
        let invalid = pkgname.is_empty()
            || pkgname.starts_with('.')
            || pkgname.contains(['/', '\\', '\0']);
        if invalid {
            return Err(MclazyError::Configuration(format!(
                "Package name '{pkgname}' is not a valid directory name"
            )));
        }
        Ok(cache.join(pkgname))
    }
}
