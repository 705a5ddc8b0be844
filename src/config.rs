use crate::error::{MclazyError, Result};
use crate::upstream::mirror::{DEFAULT_MIRROR, validate_mirror_url};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings file picked up from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "mclazy.toml";

/// Optional `mclazy.toml`; command line flags take precedence.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub upstream: UpstreamSettings,
    pub paths: PathSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UpstreamSettings {
    pub mirror: String,
    pub timeout_secs: u64,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            mirror: DEFAULT_MIRROR.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathSettings {
    /// Checked out packages and lock files
    pub cache: PathBuf,
    pub modules: PathBuf,
    pub branches: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            cache: PathBuf::from("cache"),
            modules: PathBuf::from("modules.xml"),
            branches: PathBuf::from("branches.xml"),
        }
    }
}

impl Settings {
    /// Load `path`, or `mclazy.toml` if present, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    MclazyError::Configuration(format!(
                        "Failed to read settings '{}': {e}",
                        path.display()
                    ))
                })?;
                Self::from_toml(&content)?
            }
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_toml(&fs::read_to_string(DEFAULT_CONFIG_FILE)?)?
            }
            None => Self::default(),
        };

        validate_mirror_url(&settings.upstream.mirror)?;
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_overrides(
        mut self,
        cache: Option<PathBuf>,
        modules: Option<PathBuf>,
        branches: Option<PathBuf>,
    ) -> Self {
        if let Some(cache) = cache {
            self.paths.cache = cache;
        }
        if let Some(modules) = modules {
            self.paths.modules = modules;
        }
        if let Some(branches) = branches {
            self.paths.branches = branches;
        }
        self
    }
}
