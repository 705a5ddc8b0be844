mod agents;
mod catalog;
mod cli;
mod config;
mod error;
mod repository;
mod upstream;
mod utils;
mod workflow;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.global.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let result = match &cli.command {
        Commands::Run(args) => workflow::execute_run(&cli.global, args),
        Commands::Check {
            buildone,
            relax_version_checks,
            check_installed,
        } => workflow::execute_check(
            &cli.global,
            buildone.as_deref(),
            *relax_version_checks,
            *check_installed,
        ),
        Commands::List => workflow::execute_list(&cli.global),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if e.is_configuration() {
            eprintln!(
                "{}",
                "Check mclazy.toml, modules.xml and branches.xml".dimmed()
            );
        }
        process::exit(1);
    }
}
