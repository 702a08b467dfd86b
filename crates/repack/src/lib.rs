//! Repack Library
//!
//! This library repackages the latest headless mono build of the Godot engine
//! into a Debian-style deployment tree. It resolves the latest published
//! release, downloads the runtime bundle and the export templates, extracts
//! both and moves their contents into place.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use repack::{
//!     ConsoleProgressReporter, IntoProgressCallback, Pipeline, RepackConfig,
//! };
//!
//! # async fn example() -> repack::Result<()> {
//! // Defaults target godotengine/godot and a `deb/` tree in the working directory
//! let config = RepackConfig::default()
//!     .with_work_dir("/tmp/godot-package")
//!     .with_env_overrides();
//!
//! let pipeline = Pipeline::new(config)?;
//! let report = pipeline
//!     .run(Some(ConsoleProgressReporter::new().into_callback()))
//!     .await?;
//!
//! println!("Packaged {}", report.release.release_name);
//! # Ok(())
//! # }
//! ```
//!
//! # Deployment layout
//!
//! - `deb/usr/bin/godot`: the headless executable, mode 0755
//! - `deb/usr/bin/GodotSharp/`: the managed libraries next to it
//! - `deb/etc/godot/templates/`: the export templates, replacing any previous set
//!
//! The `deb/usr/bin` and `deb/etc/godot` directories must already exist.

pub mod archive;
pub mod config;
pub mod downloader;
pub mod error;
pub mod format;
pub mod layout;
pub mod pipeline;
pub mod release;

#[cfg(test)]
mod test_support;

// Re-export commonly used types for convenience
pub use archive::{ArchiveExtractor, ExtractedTree};
pub use config::{PathCheckMode, RepackConfig};
pub use downloader::{
    CompositeProgressReporter, ConsoleProgressReporter, HttpDownloader, IntoProgressCallback,
    NullProgressReporter, ProgressCallback, ProgressEvent, ProgressReporter, TracingProgressReporter,
};
pub use error::{RepackError, Result};
pub use layout::{LayoutPaths, LayoutPlan, LayoutReorganizer, LayoutReport, LayoutStep};
pub use pipeline::{Pipeline, PipelineReport};
pub use release::{ReleaseInfo, ReleaseResolver};
