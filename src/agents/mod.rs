pub mod command;
pub mod installed;
pub mod package_build;
pub mod spec_editor;
pub mod version_control;

pub mod update;

pub use installed::InstalledPackages;
pub use package_build::PackageBuildAgent;
pub use spec_editor::SpecEditor;
pub use version_control::VersionControlAgent;

use crate::error::Result;
use crate::upstream::VersionCandidate;

/// Per-package dist-git checkout operations.
pub trait SourceControl {
    /// Clone the package, or fetch if it is already in the cache.
    fn checkout(&self, pkgname: &str) -> Result<()>;

    /// Drop local changes and move to `origin/<branch>`.
    fn fetch_and_reset(&self, pkgname: &str, branch: &str) -> Result<()>;

    fn switch_branch(&self, pkgname: &str, branch: &str) -> Result<()>;

    fn commit(&self, pkgname: &str, message: &str) -> Result<()>;

    fn push(&self, pkgname: &str) -> Result<()>;

    /// Bring the tip of `source_branch` onto the current branch,
    /// fast-forwarding when possible. A conflicting pick is aborted.
    fn cherry_pick(&self, pkgname: &str, source_branch: &str) -> Result<()>;
}

/// Reads and edits the package's spec file.
pub trait SpecMutator {
    fn current_version(&self, pkgname: &str) -> Result<String>;

    /// `old_dotted` is the current version with tildes turned back into dots.
    fn rewrite(&self, pkgname: &str, old_dotted: &str, new: &VersionCandidate) -> Result<()>;

    fn bump_changelog(&self, pkgname: &str, comment: &str) -> Result<()>;
}

/// Packaging and build steps.
pub trait BuildService {
    fn upload_sources(&self, pkgname: &str, tarball: &str) -> Result<()>;

    fn prep(&self, pkgname: &str) -> Result<()>;

    /// Returns whether the local build produced any binary packages.
    fn local_build(&self, pkgname: &str) -> Result<bool>;

    fn submit(&self, pkgname: &str, target: Option<&str>) -> Result<()>;
}
