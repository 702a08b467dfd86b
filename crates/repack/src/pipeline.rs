//! Sequential fetch, download, extract and reorganize pipeline
//!
//! Each stage is awaited to completion before the next starts and its error
//! is returned as is, so a failure leaves everything the earlier stages wrote
//! on disk and never reaches the deployment tree.

use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use crate::archive::{ArchiveExtractor, ExtractedTree};
use crate::config::RepackConfig;
use crate::downloader::{HttpDownloader, ProgressCallback};
use crate::error::{FileOperation, RepackError, Result};
use crate::layout::{LayoutPaths, LayoutPlan, LayoutReorganizer, LayoutReport};
use crate::release::{ReleaseInfo, ReleaseResolver};

/// Summary of a successful run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub release: ReleaseInfo,
    pub runtime_bytes: u64,
    pub templates_bytes: u64,
    pub runtime_tree: ExtractedTree,
    pub templates_tree: ExtractedTree,
    pub layout: LayoutReport,
}

/// The repackaging pipeline, built once from a validated configuration
pub struct Pipeline {
    config: RepackConfig,
    downloader: HttpDownloader,
    extractor: ArchiveExtractor,
    reorganizer: LayoutReorganizer,
}

impl Pipeline {
    pub fn new(config: RepackConfig) -> Result<Self> {
        config.validate()?;
        let downloader = HttpDownloader::from_config(&config)?;
        let reorganizer = LayoutReorganizer::new(config.path_checks);

        Ok(Self {
            config,
            downloader,
            extractor: ArchiveExtractor::new(),
            reorganizer,
        })
    }

    pub fn config(&self) -> &RepackConfig {
        &self.config
    }

    pub fn layout_plan(&self) -> &LayoutPlan {
        self.reorganizer.plan()
    }

    /// Resolve the latest release without downloading anything
    pub async fn resolve(&self) -> Result<ReleaseInfo> {
        ReleaseResolver::new(self.downloader.client(), &self.config)
            .fetch_latest()
            .await
    }

    /// Resolve the latest release and repackage it
    pub async fn run(&self, progress_callback: Option<ProgressCallback>) -> Result<PipelineReport> {
        let release = self.resolve().await?;
        self.run_release(release, progress_callback).await
    }

    /// Repackage an already resolved release
    pub async fn run_release(
        &self,
        release: ReleaseInfo,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<PipelineReport> {
        let work_dir = &self.config.work_dir;
        let runtime_archive = work_dir.join(&release.binary_file_name);
        let templates_archive = work_dir.join(&release.templates_file_name);

        info!("Downloading runtime bundle {}", release.binary_file_name);
        let runtime_bytes = self
            .downloader
            .download_to_file(&release.binary_url, &runtime_archive, progress_callback.clone())
            .await?;

        info!("Downloading export templates {}", release.templates_file_name);
        let templates_bytes = self
            .downloader
            .download_to_file(&release.templates_url, &templates_archive, progress_callback)
            .await?;

        let runtime_tree = self.extractor.extract(&runtime_archive, work_dir).await?;
        remove_archive(&runtime_archive).await?;

        let templates_tree = self.extractor.extract(&templates_archive, work_dir).await?;
        remove_archive(&templates_archive).await?;

        let paths = LayoutPaths::new(
            &runtime_tree.path_of(&release.runtime_dir_name),
            &templates_tree.path_of(&self.config.templates_dir_name),
            &self.config.deploy_root_path(),
            &self.config,
            &release,
        );
        let layout = self.reorganizer.reorganize(&paths).await?;

        info!("Repackaged {} into {}", release.release_name, self.config.deploy_root_path().display());
        Ok(PipelineReport {
            release,
            runtime_bytes,
            templates_bytes,
            runtime_tree,
            templates_tree,
            layout,
        })
    }
}

async fn remove_archive(path: &Path) -> Result<()> {
    debug!("Removing archive {}", path.display());
    fs::remove_file(path).await.map_err(|e| RepackError::FileSystem {
        path: path.to_path_buf(),
        operation: FileOperation::Delete,
        source: e,
    })
}
