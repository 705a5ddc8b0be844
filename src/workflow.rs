use crate::agents::update::{
    Collaborators, ModuleStatus, NoUpdateReason, PlannedModule, RunOptions, RunSummary,
    UpdateDecision, UpdateOrchestrator,
};
use crate::agents::{InstalledPackages, PackageBuildAgent, SpecEditor, VersionControlAgent};
use crate::catalog::{Branch, BranchName, BranchRegistry, CeilingOrigin, ModuleCatalog};
use crate::cli::{GlobalArgs, RunArgs};
use crate::config::Settings;
use crate::error::{MclazyError, Result};
use crate::repository::RepositoryFactory;
use crate::utils::{PathValidator, ProcessLock};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

/// Configuration shared by every subcommand.
struct Workspace {
    settings: Settings,
    branches: BranchRegistry,
    catalog: ModuleCatalog,
}

impl Workspace {
    fn load(global: &GlobalArgs) -> Result<Self> {
        let settings = Settings::load(global.config.as_deref())?.with_overrides(
            global.cache.clone(),
            global.modules.clone(),
            global.branches.clone(),
        );
        let branches = BranchRegistry::load(&settings.paths.branches)?;
        let catalog = ModuleCatalog::load(&settings.paths.modules, &branches)?;
        Ok(Self {
            settings,
            branches,
            catalog,
        })
    }

    /// Resolve the target branch, refusing end-of-life ones.
    fn target_branch(&self, name: &str) -> Result<(&Branch, BranchName)> {
        let branch = self.branches.resolve(name)?;
        if self.branches.is_eol(name)? {
            return Err(MclazyError::EndOfLife(branch.name.clone()));
        }
        Ok((branch, self.branches.branch_name(name)?))
    }

    /// Enabled modules with their ceilings; any unresolved ceiling aborts.
    fn plan(&self, only: Option<&str>, branch: &BranchName) -> Result<Vec<PlannedModule<'_>>> {
        self.catalog
            .select(only)?
            .into_iter()
            .map(|module| {
                Ok(PlannedModule {
                    module,
                    ceiling: self.catalog.ceiling_for(module, branch)?,
                })
            })
            .collect()
    }

    /// Development branch that pushed updates are copied to, if any.
    fn sync_branch(&self, target: &Branch) -> Option<String> {
        if target.rolling {
            return None;
        }
        let rolling = self.branches.iter().find(|b| b.rolling);
        if rolling.is_none() {
            warn!("No rolling branch defined, not syncing updates");
        }
        rolling.map(|b| b.name.clone())
    }
}

fn describe_branch(branch: &Branch) -> String {
    match (branch.gnome_version, branch.default_ceiling()) {
        (Some(gnome), Some(limit)) => format!("tracks GNOME {gnome} (versions below {limit})"),
        _ => "has no version limit".to_string(),
    }
}

/// Execute the run workflow
pub fn execute_run(global: &GlobalArgs, args: &RunArgs) -> Result<()> {
    let simulate = args.mode.simulate;
    let mode = if simulate { "simulating" } else { "pushing changes" };
    println!(
        "{}",
        format!("Starting GNOME package updates ({mode})...")
            .cyan()
            .bold()
    );

    // Step 1: Load configuration
    println!("\n{}", "1. Loading configuration...".yellow());
    let workspace = Workspace::load(global)?;
    println!(
        "   Found {} modules",
        workspace.catalog.modules().len()
    );

    // Step 2: Resolve branch
    println!("\n{}", "2. Resolving target branch...".yellow());
    let (branch, branch_name) = workspace.target_branch(&global.fedora_branch)?;
    println!(
        "{}",
        format!("✓ {} {}", branch.name, describe_branch(branch)).green()
    );

    // Step 3: Plan modules
    println!("\n{}", "3. Resolving version limits...".yellow());
    let planned = workspace.plan(args.buildone.as_deref(), &branch_name)?;
    println!("{}", format!("✓ {} module(s) to process", planned.len()).green());

    let cache = PathValidator::prepare_cache_dir(&workspace.settings.paths.cache)?;

    let installed = if args.check_installed {
        println!("\n{}", "Loading rpmdb...".yellow());
        let installed = InstalledPackages::load()?;
        Some(installed)
    } else {
        None
    };

    // Step 4: Process modules
    println!("\n{}", "4. Processing modules...".yellow());
    let mirror = RepositoryFactory::create_mirror(&workspace.settings)?;
    let source_control = VersionControlAgent::new(&cache);
    let spec = SpecEditor::new(&cache);
    let build = PackageBuildAgent::new(&cache);

    let options = RunOptions {
        branch: branch_name,
        release_tag: branch.release_tag.clone(),
        cache: cache.clone(),
        simulate,
        relax_version_checks: args.relax_version_checks,
        no_build: args.no_build,
        no_mockbuild: args.no_mockbuild,
        sync_branch: if args.no_rawhide_sync {
            None
        } else {
            workspace.sync_branch(branch)
        },
        buildroot: args.buildroot.clone(),
    };

    let collaborators = Collaborators {
        releases: mirror.as_ref(),
        source_control: &source_control,
        spec: &spec,
        build: &build,
    };
    let mut orchestrator = UpdateOrchestrator::new(collaborators, options, ProcessLock::default());
    if let Some(installed) = installed {
        orchestrator = orchestrator.with_installed(installed);
    }

    let summary = orchestrator.run(&planned);

    // Step 5: Display summary
    print_run_summary(&summary);

    if summary.is_success() {
        println!(
            "\n{}",
            "✨ Update run completed successfully!".green().bold()
        );
        Ok(())
    } else {
        Err(MclazyError::RunFailed(summary.errors.len()))
    }
}

fn print_run_summary(summary: &RunSummary) {
    let updates: Vec<_> = summary.updates().collect();
    if updates.is_empty() {
        println!(
            "\n{}",
            "Completed processing without updating any modules".yellow()
        );
    } else {
        println!("\n{}", "📦 Summary of updated modules:".cyan().bold());
        for outcome in updates {
            if let ModuleStatus::Updated {
                from,
                to,
                simulated,
            } = &outcome.status
            {
                let note = if *simulated { " (simulated)" } else { "" };
                println!(
                    "  • {} {} → {}{}",
                    outcome.module.white().bold(),
                    from.red(),
                    to.green().bold(),
                    note.dimmed()
                );
            }
        }
    }

    let skipped = summary
        .outcomes
        .iter()
        .filter(|o| matches!(o.status, ModuleStatus::Skipped(_)))
        .count();
    if skipped > 0 {
        println!("{}", format!("   {skipped} module(s) skipped").dimmed());
    }
    let failed = summary.failures().count();
    if failed > 0 {
        println!("{}", format!("   {failed} module(s) failed").dimmed());
    }

    if !summary.errors.is_empty() {
        println!("\n{}", "Failed:".red().bold());
        for (module, message) in &summary.errors {
            println!("  • {} {}", module.white().bold(), message.red());
        }
    }

    if let Some(elapsed) = summary.elapsed_secs() {
        println!("{}", format!("   Finished in {elapsed}s").dimmed());
    }
}

/// Execute the check workflow (dry-run)
pub fn execute_check(
    global: &GlobalArgs,
    buildone: Option<&str>,
    relax_version_checks: bool,
    check_installed: bool,
) -> Result<()> {
    println!("{}", "Checking for available updates...".cyan().bold());

    // Step 1: Load configuration
    println!("\n{}", "1. Loading configuration...".yellow());
    let workspace = Workspace::load(global)?;
    let (branch, branch_name) = workspace.target_branch(&global.fedora_branch)?;
    println!(
        "{}",
        format!("✓ {} {}", branch.name, describe_branch(branch)).green()
    );

    let planned = workspace.plan(buildone, &branch_name)?;
    let cache = PathValidator::prepare_cache_dir(&workspace.settings.paths.cache)?;

    // Step 2: Compare against upstream
    println!("\n{}", "2. Checking upstream releases...".yellow());
    let mirror = RepositoryFactory::create_mirror(&workspace.settings)?;
    let source_control = VersionControlAgent::new(&cache);
    let spec = SpecEditor::new(&cache);
    let build = PackageBuildAgent::new(&cache);
    let options = RunOptions {
        branch: branch_name,
        release_tag: branch.release_tag.clone(),
        cache: cache.clone(),
        simulate: true,
        relax_version_checks,
        no_build: true,
        no_mockbuild: true,
        sync_branch: None,
        buildroot: None,
    };
    let collaborators = Collaborators {
        releases: mirror.as_ref(),
        source_control: &source_control,
        spec: &spec,
        build: &build,
    };
    let mut orchestrator = UpdateOrchestrator::new(collaborators, options, ProcessLock::default());
    if check_installed {
        orchestrator = orchestrator.with_installed(InstalledPackages::load()?);
    }

    let pb = ProgressBar::new(planned.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  [{bar:40}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );

    let mut updates = Vec::new();
    let mut problems = Vec::new();
    for item in &planned {
        let name = &item.module.name;
        pb.set_message(format!("Checking {name}"));
        if !item.ceiling.is_ignored() {
            match orchestrator.check(item) {
                Ok((current, UpdateDecision::Update(candidate))) => {
                    updates.push((name.clone(), current, candidate.original));
                }
                Ok((_, UpdateDecision::NoUpdate(NoUpdateReason::AlreadyCurrent))) => {}
                Ok((current, UpdateDecision::NoUpdate(reason))) => {
                    problems.push((name.clone(), format!("{current}: {reason}")));
                }
                Err(e) => problems.push((name.clone(), e.to_string())),
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    println!("{}", "✓ Check completed".green());

    // Step 3: Display available updates
    if updates.is_empty() {
        println!("\n{}", "✨ All modules are up to date!".green().bold());
    } else {
        println!("\n{}", "📦 Available Updates:".cyan().bold());
        for (name, current, new) in &updates {
            println!(
                "  • {} {} → {}",
                name.white().bold(),
                current.red(),
                new.green().bold()
            );
        }
        println!("\n{}", "To apply these updates, run:".dimmed());
        println!(
            "  {}",
            format!("mclazy --fedora-branch {} run --no-simulate", branch.name).cyan()
        );
    }

    if !problems.is_empty() {
        println!("\n{}", "Not checked:".yellow().bold());
        for (name, message) in &problems {
            println!("  • {} {}", name.white().bold(), message.dimmed());
        }
    }

    Ok(())
}

/// Execute the list workflow - display modules and version limits
pub fn execute_list(global: &GlobalArgs) -> Result<()> {
    println!("{}", "Listing modules...".cyan().bold());

    let workspace = Workspace::load(global)?;
    let branch = workspace.branches.resolve(&global.fedora_branch)?;
    let branch_name = workspace.branches.branch_name(&global.fedora_branch)?;
    let eol = if branch.eol { " (end of life)" } else { "" };
    println!(
        "\n{}{}",
        format!("{} {}", branch.name, describe_branch(branch)).yellow(),
        eol.red()
    );
    if !branch.aliases.is_empty() {
        println!(
            "{}",
            format!("   also known as {}", branch.aliases.join(", ")).dimmed()
        );
    }

    for module in workspace.catalog.modules() {
        let package = if module.pkgname != module.name {
            format!(" ({})", module.pkgname)
        } else {
            String::new()
        };

        let limit = match workspace.catalog.ceiling_for(module, &branch_name) {
            Ok(resolved) if resolved.origin == CeilingOrigin::Override => {
                format!("{} [override]", resolved.ceiling).cyan()
            }
            Ok(resolved) => resolved.ceiling.to_string().normal(),
            Err(e) => e.to_string().red(),
        };

        if module.disabled {
            println!(
                "  • {}{} {}",
                module.name.dimmed(),
                package.dimmed(),
                "disabled".dimmed()
            );
        } else {
            println!("  • {}{} {}", module.name.white().bold(), package, limit);
        }
    }

    println!(
        "\n{}",
        format!("Total: {} modules", workspace.catalog.modules().len()).cyan()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    const BRANCHES: &str = r#"<?xml version="1.0"?>
<branches>
  <branch name="rawhide">
    <tag>fc44</tag>
  </branch>
  <branch name="f42">
    <tag>fc42</tag>
    <gnome>48</gnome>
  </branch>
  <branch name="f40">
    <tag>fc40</tag>
    <gnome>46</gnome>
    <alias>gnome46</alias>
    <eol/>
  </branch>
  <branch name="epel10">
    <tag>el10</tag>
  </branch>
</branches>
"#;

    const MODULES: &str = r#"<?xml version="1.0"?>
<projects>
  <project name="gnome-shell"/>
  <project name="mutter">
    <version_limit branch="epel10">47</version_limit>
  </project>
</projects>
"#;

    fn workspace(dir: &Path) -> Workspace {
        let config = dir.join("mclazy.toml");
        fs::write(&config, "").unwrap();
        fs::write(dir.join("branches.xml"), BRANCHES).unwrap();
        fs::write(dir.join("modules.xml"), MODULES).unwrap();

        let global = GlobalArgs {
            config: Some(config),
            cache: Some(dir.join("cache")),
            modules: Some(dir.join("modules.xml")),
            branches: Some(dir.join("branches.xml")),
            fedora_branch: "rawhide".to_string(),
            verbose: false,
        };
        match Workspace::load(&global) {
            Ok(workspace) => workspace,
            Err(e) => panic!("workspace failed to load: {e}"),
        }
    }

    fn setup() -> (TempDir, Workspace) {
        let dir = tempdir().unwrap();
        let workspace = workspace(dir.path());
        (dir, workspace)
    }

    #[test]
    fn end_of_life_branch_is_refused() {
        let (_dir, workspace) = setup();
        let Err(err) = workspace.target_branch("f40") else {
            panic!("f40 is end of life");
        };
        assert!(matches!(err, MclazyError::EndOfLife(ref name) if name == "f40"));
    }

    #[test]
    fn alias_of_end_of_life_branch_is_refused() {
        let (_dir, workspace) = setup();
        let Err(err) = workspace.target_branch("gnome46") else {
            panic!("gnome46 points at an end of life branch");
        };
        assert!(matches!(err, MclazyError::EndOfLife(ref name) if name == "f40"));
    }

    #[test]
    fn live_branch_resolves() {
        let (_dir, workspace) = setup();
        let (branch, name) = workspace.target_branch("f42").unwrap();
        assert_eq!(branch.name, "f42");
        assert_eq!(name.as_str(), "f42");
        assert_eq!(workspace.sync_branch(branch).as_deref(), Some("rawhide"));
    }

    #[test]
    fn unresolved_ceiling_aborts_planning() {
        let (_dir, workspace) = setup();
        let (_, branch) = workspace.target_branch("epel10").unwrap();
        let Err(err) = workspace.plan(None, &branch) else {
            panic!("gnome-shell has no limit on epel10");
        };
        assert!(matches!(
            err,
            MclazyError::UnresolvedCeiling { ref module, ref branch }
                if module == "gnome-shell" && branch == "epel10"
        ));
    }

    #[test]
    fn override_resolves_where_branch_has_no_default() {
        let (_dir, workspace) = setup();
        let (_, branch) = workspace.target_branch("epel10").unwrap();
        let Ok(planned) = workspace.plan(Some("mutter"), &branch) else {
            panic!("mutter sets its own limit on epel10");
        };
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].ceiling.origin, CeilingOrigin::Override);
    }

    #[test]
    fn rolling_branch_plans_every_module() {
        let (_dir, workspace) = setup();
        let (branch, name) = workspace.target_branch("rawhide").unwrap();
        let Ok(planned) = workspace.plan(None, &name) else {
            panic!("rawhide is unbounded");
        };
        assert_eq!(planned.len(), 2);
        assert!(workspace.sync_branch(branch).is_none());
    }
}
