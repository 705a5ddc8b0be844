use super::branches::{BranchName, BranchRegistry};
use crate::error::{MclazyError, Result};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;

/// Exclusive upper bound on the upstream version a branch may receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ceiling {
    Bounded(String),
    Unbounded,
    /// The module is not built for this branch at all
    Ignored,
}

impl Ceiling {
    fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "" => None,
            "ignore" => Some(Ceiling::Ignored),
            "*" | "none" => Some(Ceiling::Unbounded),
            version => Some(Ceiling::Bounded(version.to_string())),
        }
    }
}

impl fmt::Display for Ceiling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ceiling::Bounded(version) => write!(f, "< {version}"),
            Ceiling::Unbounded => f.write_str("unbounded"),
            Ceiling::Ignored => f.write_str("ignored"),
        }
    }
}

/// Where a resolved ceiling came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeilingOrigin {
    /// Computed from the branch's tracked GNOME release
    BranchDefault,
    /// Set in modules.xml and different from the branch default
    Override,
    /// Development branch without a tracked release
    Rolling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCeiling {
    pub ceiling: Ceiling,
    pub origin: CeilingOrigin,
}

impl ResolvedCeiling {
    pub fn new(ceiling: Ceiling, origin: CeilingOrigin) -> Self {
        Self { ceiling, origin }
    }

    pub fn is_ignored(&self) -> bool {
        self.ceiling == Ceiling::Ignored
    }
}

/// One upstream project from `modules.xml`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    pub pkgname: String,
    pub disabled: bool,
    pub overrides: BTreeMap<BranchName, Ceiling>,
}

pub struct ModuleCatalog {
    modules: Vec<Module>,
    defaults: BTreeMap<String, String>,
    rolling: BTreeSet<String>,
}

impl ModuleCatalog {
    pub fn load<P: AsRef<Path>>(path: P, branches: &BranchRegistry) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| MclazyError::CatalogParse {
            file: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_xml(&content, &path.display().to_string(), branches)
    }

    pub fn from_xml(content: &str, file: &str, branches: &BranchRegistry) -> Result<Self> {
        let parsed: ProjectsXml = from_str(content).map_err(|e| MclazyError::CatalogParse {
            file: file.to_string(),
            message: e.to_string(),
        })?;

        let mut modules = Vec::with_capacity(parsed.projects.len());
        for project in parsed.projects {
            let mut overrides = BTreeMap::new();
            for limit in project.limits {
                let branch = branches.branch_name(&limit.branch).map_err(|_| {
                    MclazyError::CatalogParse {
                        file: file.to_string(),
                        message: format!(
                            "project '{}' sets a version limit for unknown branch '{}'",
                            project.name, limit.branch
                        ),
                    }
                })?;
                let ceiling = Ceiling::parse(&limit.value).ok_or_else(|| {
                    MclazyError::CatalogParse {
                        file: file.to_string(),
                        message: format!(
                            "project '{}' has an empty version limit for '{}'",
                            project.name, limit.branch
                        ),
                    }
                })?;
                overrides.insert(branch, ceiling);
            }

            modules.push(Module {
                pkgname: project
                    .pkgname
                    .filter(|p| !p.trim().is_empty())
                    .unwrap_or_else(|| project.name.clone()),
                name: project.name,
                disabled: project
                    .disabled
                    .is_some_and(|d| d.trim().eq_ignore_ascii_case("true")),
                overrides,
            });
        }

        Ok(Self {
            modules,
            defaults: branches.default_version_ceilings(),
            rolling: branches
                .iter()
                .filter(|b| b.rolling)
                .map(|b| b.name.clone())
                .collect(),
        })
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn get(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Enabled modules, or just `only` when a single module was requested.
    pub fn select(&self, only: Option<&str>) -> Result<Vec<&Module>> {
        match only {
            Some(name) => match self.get(name) {
                Some(module) if !module.disabled => Ok(vec![module]),
                _ => Err(MclazyError::Configuration(format!(
                    "module '{name}' is not an enabled project in modules.xml"
                ))),
            },
            None => Ok(self.modules.iter().filter(|m| !m.disabled).collect()),
        }
    }

    /// Resolve the version limit of `module` on `branch`.
    pub fn ceiling_for(&self, module: &Module, branch: &BranchName) -> Result<ResolvedCeiling> {
        let default = self.defaults.get(branch.as_str());

        if let Some(ceiling) = module.overrides.get(branch) {
            let origin = match (ceiling, default) {
                (Ceiling::Bounded(v), Some(d)) if v == d => CeilingOrigin::BranchDefault,
                _ => CeilingOrigin::Override,
            };
            return Ok(ResolvedCeiling::new(ceiling.clone(), origin));
        }

        if let Some(default) = default {
            return Ok(ResolvedCeiling::new(
                Ceiling::Bounded(default.clone()),
                CeilingOrigin::BranchDefault,
            ));
        }

        if self.rolling.contains(branch.as_str()) {
            return Ok(ResolvedCeiling::new(
                Ceiling::Unbounded,
                CeilingOrigin::Rolling,
            ));
        }

        Err(MclazyError::UnresolvedCeiling {
            module: module.name.clone(),
            branch: branch.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ProjectsXml {
    #[serde(rename = "project", default)]
    projects: Vec<ProjectXml>,
}

#[derive(Debug, Deserialize)]
struct ProjectXml {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@pkgname", default)]
    pkgname: Option<String>,
    #[serde(rename = "@disabled", default)]
    disabled: Option<String>,
    #[serde(rename = "version_limit", default)]
    limits: Vec<VersionLimitXml>,
}

#[derive(Debug, Deserialize)]
struct VersionLimitXml {
    #[serde(rename = "@branch")]
    branch: String,
    #[serde(rename = "$text", default)]
    value: String,
}
