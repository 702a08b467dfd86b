//! HTTP client with integrated streaming download functionality
//!
//! Every archive the pipeline fetches goes through the single
//! [`HttpDownloader::download_to_file`] routine; callers vary only the URL,
//! the destination and the progress callback.

use futures::StreamExt;
use reqwest::Client;
use std::path::Path;
use std::time::Instant;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::RepackConfig;
use crate::downloader::progress::{ProgressCallback, ProgressEvent};
use crate::error::{FileOperation, RepackError, Result};

/// HTTP client used for release metadata and archive downloads
///
/// Only a connect timeout is configured; transfers of large archives are never
/// cut short, and failed transfers are not retried or resumed.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    /// Create a new HTTP client from the repack configuration
    pub fn from_config(config: &RepackConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| RepackError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
                field: Some("user_agent".to_string()),
            })?;

        Ok(Self { client })
    }

    /// The underlying client, shared with the release resolver
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Stream `url` into `dest_path`, reporting progress for every chunk
    ///
    /// Returns the number of bytes written once the file is flushed, synced
    /// and closed. On failure the partially written file is left in place.
    pub async fn download_to_file(
        &self,
        url: &str,
        dest_path: &Path,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<u64> {
        debug!("Stream downloading: {} to {}", url, dest_path.display());

        let response = self.client.get(url).send().await
            .map_err(|e| RepackError::Network {
                url: url.to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(RepackError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let total_size = response.content_length();
        debug!("Content length: {:?}", total_size);

        if let Some(parent) = dest_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await
                .map_err(|e| RepackError::FileSystem {
                    path: parent.to_path_buf(),
                    operation: FileOperation::CreateDir,
                    source: e,
                })?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(dest_path)
            .await
            .map_err(|e| RepackError::FileSystem {
                path: dest_path.to_path_buf(),
                operation: FileOperation::Create,
                source: e,
            })?;

        if let Some(ref callback) = progress_callback {
            callback(ProgressEvent::DownloadStarted {
                url: url.to_string(),
                total_size,
            });
        }

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let start_time = Instant::now();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| RepackError::Network {
                url: url.to_string(),
                source: e,
            })?;

            file.write_all(&chunk).await
                .map_err(|e| RepackError::FileSystem {
                    path: dest_path.to_path_buf(),
                    operation: FileOperation::Write,
                    source: e,
                })?;

            downloaded += chunk.len() as u64;

            if let Some(ref callback) = progress_callback {
                callback(ProgressEvent::DownloadProgress {
                    url: url.to_string(),
                    downloaded,
                    total: total_size,
                    elapsed: start_time.elapsed(),
                });
            }
        }

        file.flush().await
            .map_err(|e| RepackError::FileSystem {
                path: dest_path.to_path_buf(),
                operation: FileOperation::Write,
                source: e,
            })?;

        file.sync_all().await
            .map_err(|e| RepackError::FileSystem {
                path: dest_path.to_path_buf(),
                operation: FileOperation::Write,
                source: e,
            })?;

        drop(file);

        if let Some(ref callback) = progress_callback {
            callback(ProgressEvent::DownloadComplete {
                url: url.to_string(),
                final_size: downloaded,
                elapsed: start_time.elapsed(),
            });
        }

        debug!("Stream download completed: {} bytes", downloaded);
        Ok(downloaded)
    }
}
