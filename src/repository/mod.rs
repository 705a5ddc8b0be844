use crate::error::Result;
use std::collections::HashMap;
use std::path::Path;

pub mod factory;
pub use factory::RepositoryFactory;

/// Tarball formats in order of preference
const TARBALL_FORMATS: [&str; 2] = ["tar.xz", "tar.gz"];

/// Everything the upstream mirror knows about one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpstreamReleases {
    /// Published versions, in the order the mirror lists them
    pub versions: Vec<String>,
    /// version -> format -> path relative to the module directory
    pub artifacts: HashMap<String, HashMap<String, String>>,
}

impl UpstreamReleases {
    /// Relative path of the release tarball, preferring xz over gzip.
    pub fn tarball(&self, version: &str) -> Option<&str> {
        let files = self.artifacts.get(version)?;
        TARBALL_FORMATS
            .iter()
            .find_map(|format| files.get(*format))
            .map(String::as_str)
    }
}

/// Source of upstream release metadata and tarballs.
pub trait ReleaseSource {
    /// Fails with `MetadataFetch` for transient problems and with
    /// `UnknownUpstreamModule` when the mirror has no such module.
    fn fetch_releases(&self, module: &str) -> Result<UpstreamReleases>;

    fn download(&self, module: &str, artifact: &str, dest: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tarball_prefers_xz() {
        let mut releases = UpstreamReleases::default();
        releases.artifacts.insert(
            "47.0".into(),
            HashMap::from([
                ("tar.gz".to_string(), "47/foo-47.0.tar.gz".to_string()),
                ("tar.xz".to_string(), "47/foo-47.0.tar.xz".to_string()),
            ]),
        );
        releases.artifacts.insert(
            "46.0".into(),
            HashMap::from([("tar.gz".to_string(), "46/foo-46.0.tar.gz".to_string())]),
        );

        assert_eq!(releases.tarball("47.0"), Some("47/foo-47.0.tar.xz"));
        assert_eq!(releases.tarball("46.0"), Some("46/foo-46.0.tar.gz"));
        assert_eq!(releases.tarball("45.0"), None);
    }
}
