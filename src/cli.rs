use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "mclazy",
    about = "Automatically update and build Fedora packages for a GNOME release",
    version,
    author
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Settings file (defaults to ./mclazy.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// The cache of checked out packages
    #[arg(long, global = true, value_name = "DIR")]
    pub cache: Option<PathBuf>,

    /// The modules to search
    #[arg(long, global = true, value_name = "FILE")]
    pub modules: Option<PathBuf>,

    /// Branch definitions
    #[arg(long, global = true, value_name = "FILE")]
    pub branches: Option<PathBuf>,

    /// The fedora release to target
    #[arg(long, global = true, default_value = "rawhide")]
    pub fedora_branch: String,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Update, commit and build every module that has a new upstream release
    Run(RunArgs),

    /// Show what would be updated without touching any checkout
    Check {
        /// Only check one specific module
        #[arg(long, value_name = "MODULE")]
        buildone: Option<String>,

        /// Relax checks on the version numbering
        #[arg(long)]
        relax_version_checks: bool,

        /// Check installed version against built version
        #[arg(long)]
        check_installed: bool,
    },

    /// List modules and their version limits for the branch
    List,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub mode: SimulateMode,

    /// Check installed version against built version
    #[arg(long)]
    pub check_installed: bool,

    /// Relax checks on the version numbering
    #[arg(long)]
    pub relax_version_checks: bool,

    /// Do not actually build, e.g. for rawhide
    #[arg(long)]
    pub no_build: bool,

    /// Do not do a local mock build
    #[arg(long)]
    pub no_mockbuild: bool,

    /// Do not push the same changes to git rawhide branch
    #[arg(long)]
    pub no_rawhide_sync: bool,

    /// Only build one specific package
    #[arg(long, value_name = "MODULE")]
    pub buildone: Option<String>,

    /// Use a custom buildroot, e.g. f18-gnome
    #[arg(long, value_name = "TARGET")]
    pub buildroot: Option<String>,
}

/// Exactly one of `--simulate` and `--no-simulate` must be given.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct SimulateMode {
    /// Do not push any changes
    #[arg(long)]
    pub simulate: bool,

    /// Push changes
    #[arg(long)]
    pub no_simulate: bool,
}
