//! Progress tracking and reporting for download operations

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

use crate::format::{cap_string_length, format_bytes, format_eta};

/// Progress callback for download operations
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Width a download title is capped to on the progress line
const TITLE_WIDTH: usize = 24;

/// Events emitted during download operations
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    DownloadStarted {
        url: String,
        total_size: Option<u64>,
    },
    /// Sent once per received chunk
    DownloadProgress {
        url: String,
        downloaded: u64,
        total: Option<u64>,
        elapsed: Duration,
    },
    DownloadComplete {
        url: String,
        final_size: u64,
        elapsed: Duration,
    },
}

impl ProgressEvent {
    /// Estimated time remaining, `None` when the total or throughput is unknown
    pub fn eta(&self) -> Option<Duration> {
        match self {
            ProgressEvent::DownloadProgress { downloaded, total: Some(total), elapsed, .. } => {
                estimate_remaining(*downloaded, *total, *elapsed)
            }
            ProgressEvent::DownloadComplete { .. } => Some(Duration::ZERO),
            _ => None,
        }
    }
}

/// Remaining time at the average throughput observed so far
pub fn estimate_remaining(downloaded: u64, total: u64, elapsed: Duration) -> Option<Duration> {
    let secs = elapsed.as_secs_f64();
    if downloaded == 0 || secs <= 0.0 {
        return None;
    }
    let remaining = total.saturating_sub(downloaded) as f64;
    let rate = downloaded as f64 / secs;
    Some(Duration::from_secs_f64(remaining / rate))
}

/// Trait for progress reporting with per-event hooks
pub trait ProgressReporter: Send + Sync {
    fn on_download_started(&self, _url: &str, _total_size: Option<u64>) {}
    fn on_download_progress(&self, _url: &str, _downloaded: u64, _total: Option<u64>, _elapsed: Duration) {}
    fn on_download_complete(&self, _url: &str, _final_size: u64, _elapsed: Duration) {}
}

/// Extension trait to convert ProgressReporter to ProgressCallback
pub trait IntoProgressCallback {
    fn into_callback(self) -> ProgressCallback;
}

impl<T: ProgressReporter + 'static> IntoProgressCallback for T {
    fn into_callback(self) -> ProgressCallback {
        Arc::new(move |event| match event {
            ProgressEvent::DownloadStarted { url, total_size } => {
                self.on_download_started(&url, total_size);
            }
            ProgressEvent::DownloadProgress { url, downloaded, total, elapsed } => {
                self.on_download_progress(&url, downloaded, total, elapsed);
            }
            ProgressEvent::DownloadComplete { url, final_size, elapsed } => {
                self.on_download_complete(&url, final_size, elapsed);
            }
        })
    }
}

/// Console reporter drawing one progress bar per download
///
/// Renders `title [#####-----] 42% || 1.20 MB / 2.85 MB || ETA: 3s`. When the
/// server sends no content length the percentage, total and ETA show `?`.
#[derive(Default)]
pub struct ConsoleProgressReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl std::fmt::Debug for ConsoleProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleProgressReporter").finish_non_exhaustive()
    }
}

impl ConsoleProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("{prefix} [{bar:40.cyan}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#-")
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }
}

/// Status text shown to the right of the bar
pub fn progress_message(downloaded: u64, total: Option<u64>, elapsed: Duration) -> String {
    match total.filter(|t| *t > 0) {
        Some(total) => {
            let percentage = (downloaded as f64 / total as f64 * 100.0).min(100.0);
            let eta = estimate_remaining(downloaded, total, elapsed)
                .map(format_eta)
                .unwrap_or_else(|| "?".to_string());
            format!(
                "{:.0}% || {} / {} || ETA: {}",
                percentage,
                format_bytes(downloaded),
                format_bytes(total),
                eta
            )
        }
        None => format!("?% || {} / ? || ETA: ?", format_bytes(downloaded)),
    }
}

/// File name portion of a URL, used as the bar title
fn title_for(url: &str) -> String {
    let name = url.rsplit('/').next().unwrap_or(url);
    let name = name.split('?').next().unwrap_or(name);
    cap_string_length(name, TITLE_WIDTH)
}

impl ProgressReporter for ConsoleProgressReporter {
    fn on_download_started(&self, url: &str, total_size: Option<u64>) {
        let bar = ProgressBar::new(total_size.unwrap_or(0));
        bar.set_style(Self::style());
        bar.set_prefix(title_for(url));
        bar.set_message(progress_message(0, total_size, Duration::ZERO));

        if let Ok(mut guard) = self.bar.lock() {
            if let Some(previous) = guard.replace(bar) {
                previous.finish();
            }
        }
    }

    fn on_download_progress(&self, _url: &str, downloaded: u64, total: Option<u64>, elapsed: Duration) {
        self.with_bar(|bar| {
            bar.set_position(downloaded);
            bar.set_message(progress_message(downloaded, total, elapsed));
        });
    }

    fn on_download_complete(&self, _url: &str, final_size: u64, elapsed: Duration) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(bar) = guard.take() {
                bar.set_length(final_size);
                bar.set_position(final_size);
                bar.finish_with_message(progress_message(final_size, Some(final_size), elapsed));
            }
        }
    }
}

/// Reporter that records download boundaries in the log
#[derive(Debug, Default)]
pub struct TracingProgressReporter;

impl ProgressReporter for TracingProgressReporter {
    fn on_download_started(&self, url: &str, total_size: Option<u64>) {
        match total_size {
            Some(size) => info!("Downloading {} ({})", url, format_bytes(size)),
            None => info!("Downloading {} (size unknown)", url),
        }
    }

    fn on_download_complete(&self, url: &str, final_size: u64, elapsed: Duration) {
        info!("Downloaded {} ({} in {:.1}s)", url, format_bytes(final_size), elapsed.as_secs_f64());
    }
}

/// Null progress reporter that does nothing
#[derive(Debug, Default)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {}

/// Composite progress reporter that forwards events to multiple reporters
pub struct CompositeProgressReporter {
    reporters: Vec<Box<dyn ProgressReporter>>,
}

impl std::fmt::Debug for CompositeProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeProgressReporter")
            .field("reporters_count", &self.reporters.len())
            .finish()
    }
}

impl CompositeProgressReporter {
    pub fn new() -> Self {
        Self { reporters: Vec::new() }
    }

    pub fn add_reporter<R: ProgressReporter + 'static>(mut self, reporter: R) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }
}

impl Default for CompositeProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for CompositeProgressReporter {
    fn on_download_started(&self, url: &str, total_size: Option<u64>) {
        for reporter in &self.reporters {
            reporter.on_download_started(url, total_size);
        }
    }

    fn on_download_progress(&self, url: &str, downloaded: u64, total: Option<u64>, elapsed: Duration) {
        for reporter in &self.reporters {
            reporter.on_download_progress(url, downloaded, total, elapsed);
        }
    }

    fn on_download_complete(&self, url: &str, final_size: u64, elapsed: Duration) {
        for reporter in &self.reporters {
            reporter.on_download_complete(url, final_size, elapsed);
        }
    }
}
