use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MclazyError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to parse {file}: {message}")]
    CatalogParse { file: String, message: String },

    #[error("Unknown branch '{0}'")]
    UnknownBranch(String),

    #[error("Branch '{0}' is end-of-life")]
    EndOfLife(String),

    #[error("No version limit for module '{module}' on branch '{branch}'")]
    UnresolvedCeiling { module: String, branch: String },

    #[error("Ignoring as another process (PID {pid}) has this")]
    LockHeld { pid: u32 },

    #[error("Process with PID {} locked {} but did not release (a previous instance died uncleanly)",
        pid.map(|p| p.to_string()).unwrap_or_else(|| "?".to_string()), path.display())]
    StaleLock { path: PathBuf, pid: Option<u32> },

    #[error("Failed to get upstream metadata: {0}")]
    MetadataFetch(String),

    #[error("No upstream releases known for '{0}'")]
    UnknownUpstreamModule(String),

    #[error("No remote versions below the version limit {ceiling}, check modules.xml is looking at the correct branch")]
    NoEligibleCandidate { ceiling: String },

    #[error("Cannot update from {from} to {to} without --relax-version-checks")]
    PolicyBlocked { from: String, to: String },

    #[error("Installed version {installed} is newer than the branch version {candidate}, check modules.xml is looking at the correct branch")]
    InstalledAhead { installed: String, candidate: String },

    #[error("{step} failed: {message}")]
    External { step: String, message: String },

    #[error("Run finished with {0} error(s)")]
    RunFailed(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl MclazyError {
    pub fn external(step: impl Into<String>, message: impl Into<String>) -> Self {
        MclazyError::External {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Errors that abort the whole run before any module is processed.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            MclazyError::Configuration(_)
                | MclazyError::CatalogParse { .. }
                | MclazyError::UnknownBranch(_)
                | MclazyError::EndOfLife(_)
                | MclazyError::UnresolvedCeiling { .. }
                | MclazyError::Toml(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MclazyError>;
