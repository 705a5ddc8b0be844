use crate::error::{MclazyError, Result};
use std::path::Path;
use std::process::{Command, Output};
use tracing::{debug, warn};

/// Run `program` in `cwd`, capturing its output.
pub fn run_command(cwd: &Path, program: &str, args: &[&str]) -> Result<Output> {
    debug!("Running {} {}", program, args.join(" "));
    Command::new(program)
        .current_dir(cwd)
        .args(args)
        .output()
        .map_err(|e| {
            MclazyError::external(
                format!("{program} {}", args.join(" ")),
                format!("failed to execute: {e}"),
            )
        })
}

/// Turn a non-zero exit status into an `External` error for `step`.
pub fn ensure_success(output: &Output, step: &str) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stdout.trim().is_empty() {
        warn!("{}", stdout.trim_end());
    }
    if !stderr.trim().is_empty() {
        warn!("{}", stderr.trim_end());
    }

    Err(MclazyError::external(
        step,
        match output.status.code() {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        },
    ))
}

/// [`run_command`] followed by [`ensure_success`].
pub fn run_checked(cwd: &Path, step: &str, program: &str, args: &[&str]) -> Result<Output> {
    let output = run_command(cwd, program, args)?;
    ensure_success(&output, step)?;
    Ok(output)
}
