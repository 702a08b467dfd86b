//! Downloader module
//!
//! Streaming HTTP downloads and the progress reporting interface they feed.

pub mod http;
pub mod progress;

pub use http::HttpDownloader;
pub use progress::{
    CompositeProgressReporter, ConsoleProgressReporter, IntoProgressCallback, NullProgressReporter,
    ProgressCallback, ProgressEvent, ProgressReporter, TracingProgressReporter,
};
