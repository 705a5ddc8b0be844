use crate::agents::SourceControl;
use crate::agents::command::{run_checked, run_command};
use crate::error::{MclazyError, Result};
use crate::utils::PathValidator;
use std::path::{Path, PathBuf};
use tracing::info;

/// VersionControlAgent drives `fedpkg co` and git inside the package cache.
pub struct VersionControlAgent {
    cache: PathBuf,
}

impl VersionControlAgent {
    pub fn new<P: AsRef<Path>>(cache: P) -> Self {
        Self {
            cache: cache.as_ref().to_path_buf(),
        }
    }

    fn package_dir(&self, pkgname: &str) -> Result<PathBuf> {
        PathValidator::package_dir(&self.cache, pkgname)
    }

    fn git(&self, pkgname: &str, step: &str, args: &[&str]) -> Result<()> {
        run_checked(&self.package_dir(pkgname)?, step, "git", args).map(|_| ())
    }
}

impl SourceControl for VersionControlAgent {
    fn checkout(&self, pkgname: &str) -> Result<()> {
        let dir = self.package_dir(pkgname)?;
        if dir.is_dir() {
            self.git(pkgname, &format!("Update repo {pkgname}"), &["fetch"])
        } else {
            run_checked(
                &self.cache,
                &format!("Checkout {pkgname}"),
                "fedpkg",
                &["co", pkgname],
            )
            .map(|_| ())
        }
    }

    fn fetch_and_reset(&self, pkgname: &str, branch: &str) -> Result<()> {
        let step = format!("Switch to '{branch}' branch");
        let upstream = format!("origin/{branch}");
        self.git(pkgname, &step, &["clean", "-dffx"])?;
        self.git(pkgname, &step, &["reset", "--hard", "HEAD"])?;
        self.git(pkgname, &step, &["checkout", branch])?;
        self.git(pkgname, &step, &["reset", "--hard", &upstream])
    }

    fn switch_branch(&self, pkgname: &str, branch: &str) -> Result<()> {
        self.git(pkgname, &format!("Checkout '{branch}'"), &["checkout", branch])
    }

    fn commit(&self, pkgname: &str, message: &str) -> Result<()> {
        let message = format!("--message={message}");
        self.git(pkgname, "Commit", &["commit", "-a", &message])
    }

    fn push(&self, pkgname: &str) -> Result<()> {
        self.git(pkgname, "Push", &["push"])
    }

    fn cherry_pick(&self, pkgname: &str, source_branch: &str) -> Result<()> {
        let dir = self.package_dir(pkgname)?;

        let merge = run_command(&dir, "git", &["merge", "--ff-only", source_branch])?;
        if merge.status.success() {
            return Ok(());
        }

        info!("No fast-forward merge possible");
        let pick = run_command(&dir, "git", &["cherry-pick", source_branch])?;
        if pick.status.success() {
            return Ok(());
        }

        run_command(&dir, "git", &["cherry-pick", "--abort"])?;
        Err(MclazyError::external(
            "Cherry-pick",
            format!("{source_branch} does not apply cleanly"),
        ))
    }
}
