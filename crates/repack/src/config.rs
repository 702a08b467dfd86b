//! Configuration for the repackaging pipeline
//!
//! One [`RepackConfig`] is built at startup and passed by reference to every
//! component. Defaults reproduce the Godot mono headless Linux build and the
//! `deb/` staging tree; a JSON file, `REPACK_*` environment variables and
//! command line flags can override them, in that order.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{FileOperation, RepackError, Result};

/// Placeholder substituted with the resolved release version
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// How the reorganizer reacts when an expected path is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathCheckMode {
    /// Abort before any destructive step
    Strict,
    /// Log a warning and carry on
    Lenient,
}

/// Configuration for a repackaging run
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RepackConfig {
    /// Owner of the upstream repository
    pub owner: String,
    /// Upstream repository name
    pub repo: String,
    /// Base of the release metadata API
    pub api_base: String,
    /// Download directory URL, `{version}` is substituted
    pub download_base_template: String,
    /// Runtime bundle file name, `{version}` is substituted
    pub binary_file_template: String,
    /// Export templates file name, `{version}` is substituted
    pub templates_file_template: String,
    /// Executable name inside the runtime bundle, `{version}` is substituted
    pub executable_name_template: String,
    /// Shared library directory inside the runtime bundle
    pub libraries_dir_name: String,
    /// Top-level directory of the export templates bundle
    pub templates_dir_name: String,
    /// Name the executable is installed under
    pub executable_target_name: String,
    /// Directory archives are downloaded to and extracted in
    pub work_dir: PathBuf,
    /// Deployment root, relative paths resolve against `work_dir`
    pub deploy_root: PathBuf,
    /// Binary directory relative to the deployment root
    pub bin_dir: PathBuf,
    /// Templates directory relative to the deployment root
    pub templates_target: PathBuf,
    pub path_checks: PathCheckMode,
    pub user_agent: String,
    pub connect_timeout_secs: u64,
}

impl Default for RepackConfig {
    fn default() -> Self {
        Self {
            owner: "godotengine".to_string(),
            repo: "godot".to_string(),
            api_base: "https://api.github.com".to_string(),
            download_base_template: "https://downloads.tuxfamily.org/godotengine/{version}/mono/".to_string(),
            binary_file_template: "Godot_v{version}-stable_mono_linux_headless_64.zip".to_string(),
            templates_file_template: "Godot_v{version}-stable_mono_export_templates.tpz".to_string(),
            executable_name_template: "Godot_v{version}-stable_mono_linux_headless.64".to_string(),
            libraries_dir_name: "GodotSharp".to_string(),
            templates_dir_name: "templates".to_string(),
            executable_target_name: "godot".to_string(),
            work_dir: PathBuf::from("."),
            deploy_root: PathBuf::from("deb"),
            bin_dir: PathBuf::from("usr/bin"),
            templates_target: PathBuf::from("etc/godot/templates"),
            path_checks: PathCheckMode::Strict,
            user_agent: format!("repack/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout_secs: 30,
        }
    }
}

impl RepackConfig {
    /// Load a configuration file; fields it omits keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| RepackError::FileSystem {
            path: path.to_path_buf(),
            operation: FileOperation::Read,
            source: e,
        })?;

        serde_json::from_str(&raw).map_err(|e| RepackError::Configuration {
            message: format!("{} is not a valid configuration file: {}", path.display(), e),
            field: None,
        })
    }

    /// Apply `REPACK_*` overrides from the environment and a `.env` file
    pub fn with_env_overrides(mut self) -> Self {
        if dotenv::dotenv().is_ok() {
            debug!("Loaded .env file");
        }

        if let Ok(owner) = std::env::var("REPACK_OWNER") {
            self.owner = owner;
        }
        if let Ok(repo) = std::env::var("REPACK_REPO") {
            self.repo = repo;
        }
        if let Ok(api_base) = std::env::var("REPACK_API_BASE") {
            self.api_base = api_base;
        }
        if let Ok(work_dir) = std::env::var("REPACK_WORK_DIR") {
            self.work_dir = PathBuf::from(work_dir);
        }
        if let Ok(deploy_root) = std::env::var("REPACK_DEPLOY_ROOT") {
            self.deploy_root = PathBuf::from(deploy_root);
        }
        self
    }

    pub fn with_project<S: Into<String>>(mut self, owner: S, repo: S) -> Self {
        self.owner = owner.into();
        self.repo = repo.into();
        self
    }

    pub fn with_api_base<S: Into<String>>(mut self, api_base: S) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_download_base_template<S: Into<String>>(mut self, template: S) -> Self {
        self.download_base_template = template.into();
        self
    }

    pub fn with_work_dir<P: Into<PathBuf>>(mut self, work_dir: P) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn with_deploy_root<P: Into<PathBuf>>(mut self, deploy_root: P) -> Self {
        self.deploy_root = deploy_root.into();
        self
    }

    pub fn with_path_checks(mut self, mode: PathCheckMode) -> Self {
        self.path_checks = mode;
        self
    }

    /// Reject configurations that would produce unversioned or empty names
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("owner", &self.owner), ("repo", &self.repo), ("api_base", &self.api_base)] {
            if value.trim().is_empty() {
                return Err(RepackError::Configuration {
                    message: format!("{} must not be empty", field),
                    field: Some(field.to_string()),
                });
            }
        }

        for (field, template) in [
            ("binary_file_template", &self.binary_file_template),
            ("templates_file_template", &self.templates_file_template),
            ("executable_name_template", &self.executable_name_template),
        ] {
            if !template.contains(VERSION_PLACEHOLDER) {
                return Err(RepackError::Configuration {
                    message: format!("{} must contain the {} placeholder", field, VERSION_PLACEHOLDER),
                    field: Some(field.to_string()),
                });
            }
        }

        if !self.binary_file_template.ends_with(".zip") {
            return Err(RepackError::Configuration {
                message: "binary_file_template must name a .zip archive".to_string(),
                field: Some("binary_file_template".to_string()),
            });
        }

        Ok(())
    }

    /// URL of the latest-release metadata endpoint
    pub fn latest_release_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base.trim_end_matches('/'),
            self.owner,
            self.repo
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Deployment root resolved against the work directory
    pub fn deploy_root_path(&self) -> PathBuf {
        self.work_dir.join(&self.deploy_root)
    }

    pub fn target_bin_dir(&self) -> PathBuf {
        self.deploy_root_path().join(&self.bin_dir)
    }

    pub fn target_templates_dir(&self) -> PathBuf {
        self.deploy_root_path().join(&self.templates_target)
    }
}

/// Substitute the version into a template
pub fn render_template(template: &str, version: &str) -> String {
    template.replace(VERSION_PLACEHOLDER, version)
}
