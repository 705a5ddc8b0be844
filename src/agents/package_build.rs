use crate::agents::BuildService;
use crate::agents::command::run_checked;
use crate::error::{MclazyError, Result};
use crate::utils::PathValidator;
use std::path::{Path, PathBuf};
use tracing::debug;

/// PackageBuildAgent runs fedpkg for source uploads, test builds and koji builds
pub struct PackageBuildAgent {
    cache: PathBuf,
}

impl PackageBuildAgent {
    pub fn new<P: AsRef<Path>>(cache: P) -> Self {
        Self {
            cache: cache.as_ref().to_path_buf(),
        }
    }

    fn fedpkg(&self, pkgname: &str, step: &str, args: &[&str]) -> Result<()> {
        let dir = PathValidator::package_dir(&self.cache, pkgname)?;
        run_checked(&dir, step, "fedpkg", args).map(|_| ())
    }

    /// Binary rpms left behind by `fedpkg mockbuild`
    pub fn mock_results(package_dir: &Path, pkgname: &str) -> Result<Vec<PathBuf>> {
        let pattern = package_dir
            .join(format!("results_{pkgname}"))
            .join("*")
            .join("*")
            .join("*.rpm");
        let pattern = pattern.to_string_lossy();

        let entries = glob::glob(&pattern).map_err(|e| {
            MclazyError::external("Mock build", format!("bad results pattern: {e}"))
        })?;
        Ok(entries.filter_map(|entry| entry.ok()).collect())
    }
}

impl BuildService for PackageBuildAgent {
    fn upload_sources(&self, pkgname: &str, tarball: &str) -> Result<()> {
        self.fedpkg(
            pkgname,
            &format!("Upload new sources for {pkgname}"),
            &["new-sources", tarball],
        )
    }

    fn prep(&self, pkgname: &str) -> Result<()> {
        self.fedpkg(
            pkgname,
            &format!("package {pkgname} prep (do the patches not apply?)"),
            &["prep"],
        )
    }

    fn local_build(&self, pkgname: &str) -> Result<bool> {
        self.fedpkg(
            pkgname,
            &format!("package {pkgname} mock test build"),
            &["mockbuild"],
        )?;

        let dir = PathValidator::package_dir(&self.cache, pkgname)?;
        let results = Self::mock_results(&dir, pkgname)?;
        debug!("Mock build produced {} rpm(s)", results.len());
        Ok(!results.is_empty())
    }

    fn submit(&self, pkgname: &str, target: Option<&str>) -> Result<()> {
        let mut args = vec!["build", "--nowait"];
        if let Some(target) = target {
            args.push("--target");
            args.push(target);
        }
        self.fedpkg(pkgname, "Build", &args)
    }
}
