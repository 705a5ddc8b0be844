use crate::error::{MclazyError, Result};
use crate::repository::{ReleaseSource, UpstreamReleases};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_MIRROR: &str = "https://download.gnome.org/sources";
const MAX_CACHE_BYTES: usize = 32 * 1024 * 1024;

/// Client for the GNOME sources mirror and its per-module `cache.json`
pub struct GnomeMirror {
    client: Client,
    base_url: String,
}

impl GnomeMirror {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        validate_mirror_url(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mclazy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MclazyError::Io(std::io::Error::other(e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn module_url(&self, module: &str, file: &str) -> String {
        format!("{}/{}/{}", self.base_url, module, file)
    }

    /// Parse the mirror's `cache.json`.
    ///
    /// The document is a four element array:
    /// `[format, {module: {version: {ext: path}}}, {module: [versions]}, latest]`.
    pub fn parse_cache(module: &str, text: &str) -> Result<UpstreamReleases> {
        let document: Value = serde_json::from_str(text)
            .map_err(|e| MclazyError::MetadataFetch(format!("malformed cache.json: {e}")))?;

        let versions = document
            .get(2)
            .and_then(|v| v.get(module))
            .ok_or_else(|| MclazyError::UnknownUpstreamModule(module.to_string()))?;
        let versions: Vec<String> = serde_json::from_value(versions.clone())?;

        let artifacts = document
            .get(1)
            .and_then(|v| v.get(module))
            .and_then(Value::as_object)
            .map(|per_version| {
                per_version
                    .iter()
                    .map(|(version, files)| {
                        let files: HashMap<String, String> = files
                            .as_object()
                            .into_iter()
                            .flatten()
                            .filter_map(|(ext, path)| {
                                path.as_str().map(|p| (ext.clone(), p.to_string()))
                            })
                            .collect();
                        (version.clone(), files)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(UpstreamReleases {
            versions,
            artifacts,
        })
    }
}

impl ReleaseSource for GnomeMirror {
    fn fetch_releases(&self, module: &str) -> Result<UpstreamReleases> {
        let url = self.module_url(module, "cache.json");
        debug!("Fetching: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| MclazyError::MetadataFetch(format!("{url}: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(MclazyError::UnknownUpstreamModule(module.to_string()));
            }
            status if !status.is_success() => {
                return Err(MclazyError::MetadataFetch(format!("HTTP {status}: {url}")));
            }
            _ => {}
        }

        let text = response
            .text()
            .map_err(|e| MclazyError::MetadataFetch(format!("{url}: {e}")))?;

        if text.len() > MAX_CACHE_BYTES {
            return Err(MclazyError::MetadataFetch(format!(
                "{url} exceeded the {MAX_CACHE_BYTES} byte limit"
            )));
        }

        Self::parse_cache(module, &text)
    }

    fn download(&self, module: &str, artifact: &str, dest: &Path) -> Result<()> {
        let url = self.module_url(module, artifact);
        debug!("Download {}", url);

        let mut response = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| MclazyError::external("Download tarball", e.to_string()))?;

        // `dest` only ever holds a complete transfer
        let partial = partial_path(dest);
        let written = File::create(&partial)
            .map_err(MclazyError::from)
            .and_then(|mut file| {
                response
                    .copy_to(&mut file)
                    .map_err(|e| MclazyError::external("Download tarball", e.to_string()))
            });
        if let Err(e) = written {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }

        fs::rename(&partial, dest)?;
        Ok(())
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

pub fn validate_mirror_url(url: &str) -> Result<()> {
    let parsed = Url::parse(url)
        .map_err(|_| MclazyError::Configuration(format!("Invalid mirror URL: {url}")))?;

    match parsed.scheme() {
        "https" | "http" => {}
        scheme => {
            return Err(MclazyError::Configuration(format!(
                "Unsupported mirror scheme: {scheme}"
            )));
        }
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(MclazyError::Configuration(format!(
            "Mirror URL has no host: {url}"
        )));
    }

    Ok(())
}
