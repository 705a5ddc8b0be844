use crate::agents::SpecMutator;
use crate::agents::command::run_checked;
use crate::error::{MclazyError, Result};
use crate::upstream::VersionCandidate;
use crate::upstream::version::release_series;
use crate::utils::PathValidator;
use regex::{NoExpand, Regex};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static VERSION_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Version:[ \t]*(\S+)[ \t\r]*$").expect("valid Version: regex")
});

/// Edits `<pkg>/<pkg>.spec` in the package cache.
pub struct SpecEditor {
    cache: PathBuf,
}

impl SpecEditor {
    pub fn new<P: AsRef<Path>>(cache: P) -> Self {
        Self {
            cache: cache.as_ref().to_path_buf(),
        }
    }

    fn package_dir(&self, pkgname: &str) -> Result<PathBuf> {
        PathValidator::package_dir(&self.cache, pkgname)
    }

    fn spec_path(&self, pkgname: &str) -> Result<PathBuf> {
        Ok(self.package_dir(pkgname)?.join(format!("{pkgname}.spec")))
    }

    fn read_spec(&self, pkgname: &str) -> Result<(PathBuf, String)> {
        let path = self.spec_path(pkgname)?;
        if !path.is_file() {
            return Err(MclazyError::external("Read spec", "No spec file"));
        }
        let content = fs::read_to_string(&path)?;
        Ok((path, content))
    }

    /// Value of the `Version:` tag, if it is a literal.
    pub fn literal_version(content: &str) -> Option<&str> {
        VERSION_TAG
            .captures(content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .filter(|v| !v.contains('%'))
    }

    /// Apply a version bump to spec file text.
    ///
    /// Updates `Version:`, resets a literal `Release:` to `0%{?dist}` so that
    /// rpmdev-bumpspec lands on 1, and moves the `Source0:` URL to the new
    /// release series directory.
    pub fn rewrite_text(content: &str, old_dotted: &str, new: &VersionCandidate) -> String {
        let old_series = format!("/{}/", release_series(old_dotted));
        let new_series = format!("/{}/", release_series(&new.original));
        let series = Regex::new(&regex::escape(&old_series)).ok();

        let mut rewritten: Vec<String> = content
            .lines()
            .map(|line| {
                if line.starts_with("Version:") {
                    replace_value(line, &new.normalized)
                } else if line.starts_with("Release:") && !line.contains("autorelease") {
                    replace_value(line, "0%{?dist}")
                } else if line.starts_with("Source:") || line.starts_with("Source0:") {
                    match &series {
                        Some(re) => re.replace_all(line, NoExpand(&new_series)).into_owned(),
                        None => line.to_string(),
                    }
                } else {
                    line.to_string()
                }
            })
            .collect();

        if content.ends_with('\n') {
            rewritten.push(String::new());
        }
        rewritten.join("\n")
    }
}

/// Replace the last whitespace separated field, keeping the alignment before it.
fn replace_value(line: &str, value: &str) -> String {
    let line = line.trim_end();
    match line.rsplit_once([' ', '\t']) {
        Some((head, _)) => {
            let separator = &line[head.len()..head.len() + 1];
            format!("{head}{separator}{value}")
        }
        None => line.to_string(),
    }
}

impl SpecMutator for SpecEditor {
    fn current_version(&self, pkgname: &str) -> Result<String> {
        let (path, content) = self.read_spec(pkgname)?;
        if let Some(version) = Self::literal_version(&content) {
            return Ok(version.to_string());
        }

        // macros in Version: need rpm to expand them
        let spec = path.to_string_lossy();
        let output = run_checked(
            &self.package_dir(pkgname)?,
            "Can't parse spec file",
            "rpmspec",
            &["-q", "--srpm", "--queryformat", "%{version}", &spec],
        )?;
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if version.is_empty() {
            return Err(MclazyError::external("Read spec", "Can't parse spec file"));
        }
        Ok(version)
    }

    fn rewrite(&self, pkgname: &str, old_dotted: &str, new: &VersionCandidate) -> Result<()> {
        let (path, content) = self.read_spec(pkgname)?;
        let rewritten = Self::rewrite_text(&content, old_dotted, new);

        let tmp = path.with_extension("spec.tmp");
        fs::write(&tmp, rewritten)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn bump_changelog(&self, pkgname: &str, comment: &str) -> Result<()> {
        let comment = format!("--comment={comment}");
        let spec = format!("{pkgname}.spec");
        run_checked(
            &self.package_dir(pkgname)?,
            "Bump spec",
            "rpmdev-bumpspec",
            &["--legacy-datestamp", &comment, &spec],
        )
        .map(|_| ())
    }
}
