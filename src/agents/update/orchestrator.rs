use super::decider::{UpdateDecider, UpdateDecision, UpdatePolicy};
use super::report::{ModuleStatus, RunSummary};
use crate::agents::{BuildService, InstalledPackages, SourceControl, SpecMutator};
use crate::catalog::{BranchName, Module, ResolvedCeiling};
use crate::error::{MclazyError, Result};
use crate::repository::{ReleaseSource, UpstreamReleases};
use crate::upstream::VersionCandidate;
use crate::upstream::version::to_dotted;
use crate::utils::{LivenessProbe, PathValidator, ProcessLock, ProcfsProbe};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Attempts at fetching `cache.json` before a module is given up on.
pub const METADATA_FETCH_ATTEMPTS: usize = 3;

/// Per-run settings shared by every module.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub branch: BranchName,
    /// Dist tag of the target branch, needed only when submitting builds
    pub release_tag: Option<String>,
    pub cache: PathBuf,
    pub simulate: bool,
    pub relax_version_checks: bool,
    pub no_build: bool,
    pub no_mockbuild: bool,
    /// Development branch that receives a copy of each pushed update
    pub sync_branch: Option<String>,
    /// Side-channel build target
    pub buildroot: Option<String>,
}

/// A module together with the ceiling resolved for the target branch.
#[derive(Debug, Clone)]
pub struct PlannedModule<'a> {
    pub module: &'a Module,
    pub ceiling: ResolvedCeiling,
}

/// External systems the orchestrator drives.
pub struct Collaborators<'a> {
    pub releases: &'a dyn ReleaseSource,
    pub source_control: &'a dyn SourceControl,
    pub spec: &'a dyn SpecMutator,
    pub build: &'a dyn BuildService,
}

pub struct UpdateOrchestrator<'a, P: LivenessProbe = ProcfsProbe> {
    collaborators: Collaborators<'a>,
    options: RunOptions,
    lock: ProcessLock<P>,
    installed: Option<InstalledPackages>,
}

impl<'a, P: LivenessProbe> UpdateOrchestrator<'a, P> {
    pub fn new(collaborators: Collaborators<'a>, options: RunOptions, lock: ProcessLock<P>) -> Self {
        Self {
            collaborators,
            options,
            lock,
            installed: None,
        }
    }

    /// Cross-check decisions against the versions installed on this machine.
    pub fn with_installed(mut self, installed: InstalledPackages) -> Self {
        self.installed = Some(installed);
        self
    }

    /// Process every module in order. A failing module never stops the batch.
    pub fn run(&self, modules: &[PlannedModule<'_>]) -> RunSummary {
        let mut summary = RunSummary::new();

        for (index, planned) in modules.iter().enumerate() {
            let name = &planned.module.name;
            info!("[{}/{}] {}", index + 1, modules.len(), name);

            let status = self.process(planned, &mut summary);
            match &status {
                ModuleStatus::Failed(reason) => warn!("{name}: {reason}"),
                other => debug!("{name}: {other}"),
            }
            summary.record(name, status);
        }

        summary.finish();
        summary
    }

    /// Decide for a module that is already checked out, without touching it.
    pub fn check(&self, planned: &PlannedModule<'_>) -> Result<(String, UpdateDecision)> {
        let module = planned.module;
        let current = self.collaborators.spec.current_version(&module.pkgname)?;
        let releases = self.fetch_releases(&module.name)?;
        let decision = UpdateDecider::decide(
            &current,
            &releases.versions,
            &planned.ceiling,
            &self.policy_for(&module.pkgname),
        )?;
        Ok((current, decision))
    }

    fn process(&self, planned: &PlannedModule<'_>, summary: &mut RunSummary) -> ModuleStatus {
        if planned.ceiling.is_ignored() {
            return ModuleStatus::Skipped(format!("ignored on {}", self.options.branch));
        }

        let pkgname = &planned.module.pkgname;
        let lock_path = ProcessLock::<P>::lock_path(&self.options.cache, pkgname);
        let guard = match self.lock.acquire(&lock_path) {
            Ok(guard) => guard,
            Err(e @ MclazyError::LockHeld { .. }) => {
                info!("{e}");
                return ModuleStatus::Skipped(e.to_string());
            }
            Err(e) => return ModuleStatus::Failed(e.to_string()),
        };
        debug!("Holding {}", guard.path().display());

        match self.update(planned, summary) {
            Ok(status) => status,
            Err(e) => ModuleStatus::Failed(e.to_string()),
        }
    }

    fn update(&self, planned: &PlannedModule<'_>, summary: &mut RunSummary) -> Result<ModuleStatus> {
        let module = planned.module;
        let pkg = module.pkgname.as_str();
        let branch = self.options.branch.as_str();
        let Collaborators {
            source_control,
            spec,
            build,
            ..
        } = &self.collaborators;

        source_control.checkout(pkg)?;
        source_control.fetch_and_reset(pkg, branch)?;

        let current = spec.current_version(pkg)?;
        debug!("Current version is {current}");

        let releases = self.fetch_releases(&module.name)?;
        let decision = UpdateDecider::decide(
            &current,
            &releases.versions,
            &planned.ceiling,
            &self.policy_for(pkg),
        )?;

        let candidate = match decision {
            UpdateDecision::NoUpdate(reason) => {
                debug!("No updates available: {reason}");
                return Ok(ModuleStatus::NoUpdate(reason.to_string()));
            }
            UpdateDecision::Update(candidate) => candidate,
        };
        info!(
            "Need to update {} from {} to {}",
            pkg, current, candidate.normalized
        );

        let tarball = self.stage_tarball(module, &releases, &candidate)?;
        if !self.options.simulate {
            build.upload_sources(pkg, &tarball)?;
        }

        let comment = format!("Update to {}", candidate.original);
        spec.rewrite(pkg, &to_dotted(&current), &candidate)?;
        spec.bump_changelog(pkg, &comment)?;
        build.prep(pkg)?;

        if !self.options.no_mockbuild && !build.local_build(pkg)? {
            return Err(MclazyError::external(
                format!("package {pkg} mock test build"),
                "no results",
            ));
        }

        source_control.commit(pkg, &comment)?;

        let updated = |simulated| ModuleStatus::Updated {
            from: current.clone(),
            to: candidate.original.clone(),
            simulated,
        };

        if self.options.simulate {
            debug!("Not pushing as simulating");
            return Ok(updated(true));
        }

        source_control.push(pkg)?;

        if let Some(sync_branch) = &self.options.sync_branch {
            if let Err(e) = self.sync_to(pkg, sync_branch) {
                summary.record_error(&module.name, format!("Sync to {sync_branch}: {e}"));
            }
            source_control.switch_branch(pkg, branch)?;
        }

        if !self.options.no_build {
            let tag = self.options.release_tag.as_deref().ok_or_else(|| {
                MclazyError::Configuration(format!("Failed to get release tag for {branch}"))
            })?;
            info!("Building {}-{}-1.{}", pkg, candidate.normalized, tag);
            build.submit(pkg, self.options.buildroot.as_deref())?;
        }

        info!("Done");
        Ok(updated(false))
    }

    fn policy_for(&self, pkgname: &str) -> UpdatePolicy {
        UpdatePolicy {
            relax_version_checks: self.options.relax_version_checks,
            installed_version: self
                .installed
                .as_ref()
                .and_then(|installed| installed.get(pkgname))
                .map(str::to_string),
        }
    }

    fn fetch_releases(&self, module: &str) -> Result<UpstreamReleases> {
        let mut attempt = 1;
        loop {
            match self.collaborators.releases.fetch_releases(module) {
                Err(MclazyError::MetadataFetch(message)) if attempt < METADATA_FETCH_ATTEMPTS => {
                    warn!("Failed to get metadata for {module} on try {attempt}: {message}");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Make sure the release tarball is in the package checkout and return its file name.
    fn stage_tarball(
        &self,
        module: &Module,
        releases: &UpstreamReleases,
        candidate: &VersionCandidate,
    ) -> Result<String> {
        let artifact = releases.tarball(&candidate.original).ok_or_else(|| {
            MclazyError::external(
                "Locate tarball",
                format!("Cannot find tarball for {}", module.name),
            )
        })?;
        let filename = artifact.rsplit('/').next().unwrap_or(artifact);

        let package_dir = PathValidator::package_dir(&self.options.cache, &module.pkgname)?;
        let dest = PathValidator::package_dir(&package_dir, filename)?;
        if dest.exists() {
            debug!("Source {filename} already exists");
        } else {
            self.collaborators
                .releases
                .download(&module.name, artifact, &dest)?;
        }
        Ok(filename.to_string())
    }

    /// Carry the pushed commit over to the development branch and build it there.
    fn sync_to(&self, pkg: &str, sync_branch: &str) -> Result<()> {
        let source_control = self.collaborators.source_control;
        source_control.fetch_and_reset(pkg, sync_branch)?;
        source_control.cherry_pick(pkg, self.options.branch.as_str())?;
        source_control.push(pkg)?;
        if !self.options.no_build {
            self.collaborators.build.submit(pkg, None)?;
        }
        Ok(())
    }
}
