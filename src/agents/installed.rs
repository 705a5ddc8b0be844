use crate::agents::command::run_checked;
use crate::error::Result;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Snapshot of the rpm database: package name to installed version.
#[derive(Debug, Default, Clone)]
pub struct InstalledPackages {
    versions: HashMap<String, String>,
}

impl InstalledPackages {
    /// Query every installed package with `rpm -qa`.
    pub fn load() -> Result<Self> {
        let output = run_checked(
            Path::new("."),
            "Query installed packages",
            "rpm",
            &["-qa", "--queryformat", "%{NAME} %{VERSION}\\n"],
        )?;
        let installed = Self::from_query_output(&String::from_utf8_lossy(&output.stdout));
        debug!("Loaded {} installed packages", installed.versions.len());
        Ok(installed)
    }

    /// Parse `NAME VERSION` lines; malformed lines are skipped.
    pub fn from_query_output(text: &str) -> Self {
        let versions = text
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let name = fields.next()?;
                let version = fields.next()?;
                Some((name.to_string(), version.to_string()))
            })
            .collect();
        Self { versions }
    }

    pub fn get(&self, pkgname: &str) -> Option<&str> {
        self.versions.get(pkgname).map(String::as_str)
    }
}
