//! Error types for the repackaging pipeline with context for diagnostics

use std::error::Error;
use std::path::PathBuf;
use thiserror::Error;

/// Every failure the pipeline can surface, carrying the URL, path or layout
/// step it happened on
#[derive(Error, Debug)]
pub enum RepackError {
    /// Connection or transfer failure talking to a remote endpoint
    #[error("HTTP request to '{url}' failed")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Remote endpoint answered with a non-success status
    #[error("Request to '{url}' returned HTTP {status}")]
    HttpStatus {
        url: String,
        status: u16,
    },

    /// Release metadata could not be turned into a version
    #[error("Could not parse release metadata: {message}")]
    ReleaseParse {
        message: String,
    },

    /// A URL built from the configured templates is not valid
    #[error("Invalid URL '{url}': {suggestion}")]
    InvalidUrl {
        url: String,
        suggestion: String,
        #[source]
        source: url::ParseError,
    },

    /// File system I/O errors with file context
    #[error("File operation failed while {operation} '{path}'")]
    FileSystem {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    /// Archive is corrupt or uses an unsupported feature
    #[error("Failed to extract archive '{archive}'")]
    Archive {
        archive: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Archive entry would be written outside the destination directory
    #[error("Archive '{archive}' contains an unsafe entry '{entry}'")]
    UnsafeArchiveEntry {
        archive: PathBuf,
        entry: String,
    },

    /// The blocking extraction task did not run to completion
    #[error("Extraction task for '{archive}' failed: {reason}")]
    ExtractionTask {
        archive: PathBuf,
        reason: String,
    },

    /// Strict path checks found an expected path missing
    #[error("Layout step '{step}' expected '{path}' to exist")]
    MissingLayoutPath {
        step: &'static str,
        path: PathBuf,
    },

    /// A layout step failed on the file system
    #[error("Layout step '{step}' failed on '{path}'")]
    Layout {
        step: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors
    #[error("Invalid configuration: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },
}

/// Types of file operations for error context
#[derive(Debug, Clone, PartialEq)]
pub enum FileOperation {
    Read,
    Write,
    Create,
    Delete,
    Permissions,
    CreateDir,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Create => write!(f, "creating"),
            FileOperation::Delete => write!(f, "deleting"),
            FileOperation::Permissions => write!(f, "setting permissions on"),
            FileOperation::CreateDir => write!(f, "creating directory"),
        }
    }
}

pub type Result<T> = std::result::Result<T, RepackError>;

impl RepackError {
    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            RepackError::Network { .. } => "network",
            RepackError::HttpStatus { .. } => "http_status",
            RepackError::ReleaseParse { .. } => "release_parse",
            RepackError::InvalidUrl { .. } => "invalid_url",
            RepackError::FileSystem { .. } => "file_system",
            RepackError::Archive { .. } => "archive",
            RepackError::UnsafeArchiveEntry { .. } => "unsafe_archive_entry",
            RepackError::ExtractionTask { .. } => "extraction_task",
            RepackError::MissingLayoutPath { .. } => "missing_layout_path",
            RepackError::Layout { .. } => "layout",
            RepackError::Configuration { .. } => "configuration",
        }
    }

    /// Get a hint for resolving the error, where one exists
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            RepackError::InvalidUrl { suggestion, .. } => Some(suggestion),
            RepackError::MissingLayoutPath { .. } => {
                Some("The archive layout changed upstream; rerun with --lenient to continue anyway")
            }
            RepackError::Layout { .. } => {
                Some("Check that the deployment scaffold exists and is writable, then remove leftover files before retrying")
            }
            RepackError::FileSystem { .. } => {
                Some("Partial downloads and extracted trees are left in place; remove them before retrying")
            }
            _ => None,
        }
    }

    /// Create a detailed error report for diagnostics
    pub fn detailed_report(&self) -> String {
        let mut report = format!("Error: {}\n", self);
        report.push_str(&format!("Category: {}\n", self.category()));

        if let Some(suggestion) = self.suggestion() {
            report.push_str(&format!("Suggestion: {}\n", suggestion));
        }

        let mut cause = self.source();
        while let Some(source) = cause {
            report.push_str(&format!("Caused by: {}\n", source));
            cause = source.source();
        }

        report
    }
}

impl From<url::ParseError> for RepackError {
    fn from(error: url::ParseError) -> Self {
        RepackError::InvalidUrl {
            url: "<unparseable>".to_string(),
            suggestion: url_suggestion(&error).to_string(),
            source: error,
        }
    }
}

/// Pick a hint for a URL parse failure
pub(crate) fn url_suggestion(error: &url::ParseError) -> &'static str {
    match error {
        url::ParseError::EmptyHost => "URL must have a valid hostname",
        url::ParseError::InvalidPort => "Port number must be between 1 and 65535",
        url::ParseError::RelativeUrlWithoutBase => "URL must be absolute (include http:// or https://)",
        _ => "Check the URL templates in the configuration",
    }
}
