use crate::error::{MclazyError, Result};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Development branch that never has a version limit unless one is configured.
pub const ROLLING_BRANCH: &str = "rawhide";

/// A distribution branch from `branches.xml`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    /// Package release suffix, e.g. `fc42`
    pub release_tag: Option<String>,
    /// GNOME release tracked by the branch
    pub gnome_version: Option<u32>,
    pub eol: bool,
    pub rolling: bool,
    pub aliases: Vec<String>,
}

impl Branch {
    /// Exclusive upper bound: tracking GNOME 48 means "anything below 49".
    pub fn default_ceiling(&self) -> Option<String> {
        self.gnome_version.map(|v| (v + 1).to_string())
    }
}

/// Canonical branch identifier, only obtainable through a [`BranchRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BranchName(String);

impl BranchName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// All known branches, addressable by canonical name or alias.
#[derive(Debug, Clone, Default)]
pub struct BranchRegistry {
    branches: BTreeMap<String, Branch>,
    aliases: HashMap<String, String>,
}

impl BranchRegistry {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| MclazyError::CatalogParse {
            file: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_xml(&content, &path.display().to_string())
    }

    pub fn from_xml(content: &str, file: &str) -> Result<Self> {
        let parsed: BranchesXml = from_str(content).map_err(|e| MclazyError::CatalogParse {
            file: file.to_string(),
            message: e.to_string(),
        })?;

        let mut registry = BranchRegistry::default();
        for raw in &parsed.branches {
            if registry.branches.contains_key(&raw.name) {
                return Err(MclazyError::CatalogParse {
                    file: file.to_string(),
                    message: format!("branch '{}' is defined twice", raw.name),
                });
            }
            registry.branches.insert(
                raw.name.clone(),
                Branch {
                    name: raw.name.clone(),
                    release_tag: None,
                    gnome_version: None,
                    eol: false,
                    rolling: raw.name == ROLLING_BRANCH,
                    aliases: Vec::new(),
                },
            );
        }

        for raw in parsed.branches {
            for field in raw.fields {
                match field {
                    BranchField::Alias(alias) => registry.register_alias(&raw.name, alias),
                    other => {
                        if let Some(branch) = registry.branches.get_mut(&raw.name) {
                            other.apply(branch);
                        }
                    }
                }
            }
        }

        Ok(registry)
    }

    fn register_alias(&mut self, canonical: &str, alias: String) {
        let alias = alias.trim().to_string();
        if self.branches.contains_key(&alias) || self.aliases.contains_key(&alias) {
            warn!("Duplicated <alias> '{}' in branches.xml, skipping", alias);
            return;
        }
        if let Some(branch) = self.branches.get_mut(canonical) {
            branch.aliases.push(alias.clone());
        }
        self.aliases.insert(alias, canonical.to_string());
    }

    fn canonical<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.branches.contains_key(name) {
            Some(name)
        } else {
            self.aliases.get(name).map(String::as_str)
        }
    }

    /// Look up a branch by canonical name or alias
    pub fn resolve(&self, name: &str) -> Result<&Branch> {
        self.canonical(name)
            .and_then(|canonical| self.branches.get(canonical))
            .ok_or_else(|| MclazyError::UnknownBranch(name.to_string()))
    }

    pub fn branch_name(&self, name: &str) -> Result<BranchName> {
        self.resolve(name).map(|b| BranchName(b.name.clone()))
    }

    pub fn is_eol(&self, name: &str) -> Result<bool> {
        self.resolve(name).map(|b| b.eol)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Branch> {
        self.branches.values()
    }

    /// Default version limit per branch, for every branch that tracks a release.
    pub fn default_version_ceilings(&self) -> BTreeMap<String, String> {
        self.branches
            .values()
            .filter_map(|b| b.default_ceiling().map(|c| (b.name.clone(), c)))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct BranchesXml {
    #[serde(rename = "branch", default)]
    branches: Vec<BranchXml>,
}

#[derive(Debug, Deserialize)]
struct BranchXml {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "$value", default)]
    fields: Vec<BranchField>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum BranchField {
    Tag(String),
    Gnome(u32),
    Alias(String),
    Eol,
    Rolling,
}

impl BranchField {
    fn apply(self, branch: &mut Branch) {
        match self {
            BranchField::Tag(tag) => branch.release_tag = Some(tag.trim().to_string()),
            BranchField::Gnome(version) => branch.gnome_version = Some(version),
            BranchField::Eol => branch.eol = true,
            BranchField::Rolling => branch.rolling = true,
            BranchField::Alias(_) => {}
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const BRANCHES_XML: &str = r#"<?xml version="1.0"?>
<branches>
  <branch name="rawhide">
    <tag>fc44</tag>
    <alias>f44</alias>
  </branch>
  <branch name="f43">
    <tag>fc43</tag>
    <gnome>49</gnome>
  </branch>
  <branch name="f42">
    <tag>fc42</tag>
    <gnome>48</gnome>
    <alias>f44</alias>
    <alias>stable</alias>
  </branch>
  <branch name="f40">
    <tag>fc40</tag>
    <gnome>46</gnome>
    <eol/>
  </branch>
</branches>
"#;

    fn registry() -> BranchRegistry {
        BranchRegistry::from_xml(BRANCHES_XML, "branches.xml").unwrap()
    }

    #[test]
    fn parses_branches() {
        let registry = registry();
        let f42 = registry.resolve("f42").unwrap();
        assert_eq!(f42.release_tag.as_deref(), Some("fc42"));
        assert_eq!(f42.gnome_version, Some(48));
        assert!(!f42.eol);
        assert!(registry.is_eol("f40").unwrap());
        assert!(registry.resolve("rawhide").unwrap().rolling);
    }

    #[test]
    fn default_ceiling_is_next_release() {
        let ceilings = registry().default_version_ceilings();
        assert_eq!(ceilings.get("f42").map(String::as_str), Some("49"));
        assert_eq!(ceilings.get("f43").map(String::as_str), Some("50"));
        assert!(!ceilings.contains_key("rawhide"));
    }

    #[test]
    fn resolves_aliases_and_keeps_first_duplicate() {
        let registry = registry();
        assert_eq!(registry.resolve("f44").unwrap().name, "rawhide");
        assert_eq!(registry.resolve("stable").unwrap().name, "f42");
        assert_eq!(registry.resolve("f42").unwrap().aliases, vec!["stable"]);
        assert_eq!(registry.branch_name("f44").unwrap().as_str(), "rawhide");
    }

    #[test]
    fn unknown_branch_is_an_error() {
        let err = registry().resolve("f12").unwrap_err();
        assert!(matches!(err, MclazyError::UnknownBranch(ref name) if name == "f12"));
        assert!(err.is_configuration());
    }

    #[test]
    fn rejects_duplicate_branch_names() {
        let xml = r#"<branches><branch name="f42"/><branch name="f42"/></branches>"#;
        let err = BranchRegistry::from_xml(xml, "branches.xml").unwrap_err();
        assert!(matches!(err, MclazyError::CatalogParse { .. }));
    }
}
