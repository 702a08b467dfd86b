//! Latest release discovery
//!
//! Queries the upstream release API and derives every versioned file name and
//! URL from a single resolved version, so the runtime and templates bundles
//! always match.

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{RepackConfig, render_template};
use crate::error::{RepackError, Result, url_suggestion};

/// Subset of the release API payload the resolver consumes
#[derive(Debug, Deserialize)]
struct LatestRelease {
    name: Option<String>,
}

/// Everything derived from one resolved release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    /// Release name as published upstream, e.g. `4.2.1-stable`
    pub release_name: String,
    /// Version prefix of the release name, e.g. `4.2.1`
    pub version: String,
    pub binary_file_name: String,
    pub templates_file_name: String,
    pub binary_url: String,
    pub templates_url: String,
    /// Directory the runtime bundle extracts into
    pub runtime_dir_name: String,
    /// Executable name inside the runtime directory
    pub executable_name: String,
}

impl ReleaseInfo {
    /// Derive file names and URLs for `version` from the configured templates
    pub fn from_version(release_name: &str, version: &str, config: &RepackConfig) -> Result<Self> {
        let base_url = render_template(&config.download_base_template, version);
        let binary_file_name = render_template(&config.binary_file_template, version);
        let templates_file_name = render_template(&config.templates_file_template, version);

        let binary_url = checked_url(format!("{}{}", base_url, binary_file_name))?;
        let templates_url = checked_url(format!("{}{}", base_url, templates_file_name))?;

        let runtime_dir_name = binary_file_name
            .strip_suffix(".zip")
            .unwrap_or(&binary_file_name)
            .to_string();

        Ok(Self {
            release_name: release_name.to_string(),
            version: version.to_string(),
            executable_name: render_template(&config.executable_name_template, version),
            binary_file_name,
            templates_file_name,
            binary_url,
            templates_url,
            runtime_dir_name,
        })
    }
}

fn checked_url(candidate: String) -> Result<String> {
    match url::Url::parse(&candidate) {
        Ok(_) => Ok(candidate),
        Err(e) => Err(RepackError::InvalidUrl {
            suggestion: url_suggestion(&e).to_string(),
            url: candidate,
            source: e,
        }),
    }
}

/// Extract the version from a release name formatted as `<version>-<channel>`
pub fn parse_release_version(release_name: &str) -> Result<&str> {
    match release_name.split_once('-') {
        Some((version, _)) if !version.trim().is_empty() => Ok(version.trim()),
        Some(_) => Err(RepackError::ReleaseParse {
            message: format!("release name '{}' has an empty version prefix", release_name),
        }),
        None => Err(RepackError::ReleaseParse {
            message: format!("release name '{}' is not in the form <version>-<channel>", release_name),
        }),
    }
}

/// Resolves the newest published release of the configured project
pub struct ReleaseResolver<'a> {
    client: &'a Client,
    config: &'a RepackConfig,
}

impl<'a> ReleaseResolver<'a> {
    pub fn new(client: &'a Client, config: &'a RepackConfig) -> Self {
        Self { client, config }
    }

    /// Query the release API and derive the release info
    pub async fn fetch_latest(&self) -> Result<ReleaseInfo> {
        let url = self.config.latest_release_url();
        debug!("Fetching latest release metadata from {}", url);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| RepackError::Network { url: url.clone(), source: e })?;

        if !response.status().is_success() {
            return Err(RepackError::HttpStatus {
                url,
                status: response.status().as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| RepackError::Network { url: url.clone(), source: e })?;

        let release: LatestRelease = serde_json::from_str(&body).map_err(|e| RepackError::ReleaseParse {
            message: format!("response from {} is not valid release JSON: {}", url, e),
        })?;

        let release_name = release.name.ok_or_else(|| RepackError::ReleaseParse {
            message: format!("response from {} has no release name", url),
        })?;

        let version = parse_release_version(&release_name)?;
        info!("Latest release is {} (version {})", release_name, version);

        ReleaseInfo::from_version(&release_name, version, self.config)
    }
}
