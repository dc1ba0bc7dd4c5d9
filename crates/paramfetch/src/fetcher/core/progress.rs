//! Progress tracking and reporting for fetch operations

use std::sync::Arc;
use tracing::{debug, info, warn};

/// Progress callback for fetch operations
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Events emitted while verifying and fetching parameter files
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    VerificationStarted {
        file: String,
    },
    VerificationComplete {
        file: String,
        valid: bool,
    },
    DownloadStarted {
        url: String,
        resume_from: u64,
        total_size: Option<u64>,
    },
    DownloadProgress {
        url: String,
        downloaded: u64,
        total: Option<u64>,
        speed_bps: f64,
    },
    DownloadComplete {
        url: String,
        final_size: u64,
    },
    Warning {
        file: String,
        message: String,
    },
    Error {
        file: String,
        error: String,
    },
}

/// Trait for progress reporting with more granular control
pub trait ProgressReporter: Send + Sync {
    fn on_verification_started(&self, _file: &str) {}
    fn on_verification_complete(&self, _file: &str, _valid: bool) {}
    fn on_download_started(&self, _url: &str, _resume_from: u64, _total_size: Option<u64>) {}
    fn on_download_progress(&self, _url: &str, _downloaded: u64, _total: Option<u64>, _speed_bps: f64) {}
    fn on_download_complete(&self, _url: &str, _final_size: u64) {}
    fn on_warning(&self, _file: &str, _message: &str) {}
    fn on_error(&self, _file: &str, _error: &str) {}
}

/// Extension trait to convert ProgressReporter to ProgressCallback
pub trait IntoProgressCallback {
    fn into_callback(self) -> ProgressCallback;
}

impl<T: ProgressReporter + 'static> IntoProgressCallback for T {
    fn into_callback(self) -> ProgressCallback {
        Arc::new(move |event| match event {
            ProgressEvent::VerificationStarted { file } => {
                self.on_verification_started(&file);
            }
            ProgressEvent::VerificationComplete { file, valid } => {
                self.on_verification_complete(&file, valid);
            }
            ProgressEvent::DownloadStarted { url, resume_from, total_size } => {
                self.on_download_started(&url, resume_from, total_size);
            }
            ProgressEvent::DownloadProgress { url, downloaded, total, speed_bps } => {
                self.on_download_progress(&url, downloaded, total, speed_bps);
            }
            ProgressEvent::DownloadComplete { url, final_size } => {
                self.on_download_complete(&url, final_size);
            }
            ProgressEvent::Warning { file, message } => {
                self.on_warning(&file, &message);
            }
            ProgressEvent::Error { file, error } => {
                self.on_error(&file, &error);
            }
        })
    }
}

/// Emit an event if a callback is present
pub(crate) fn emit(callback: Option<&ProgressCallback>, event: ProgressEvent) {
    if let Some(callback) = callback {
        callback(event);
    }
}

/// Simple console progress reporter implementation
#[derive(Debug, Default)]
pub struct ConsoleProgressReporter {
    pub verbose: bool,
}

impl ConsoleProgressReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn on_verification_complete(&self, file: &str, valid: bool) {
        if self.verbose || !valid {
            let icon = if valid { "✅" } else { "❌" };
            println!("{} Verification {}: {}", icon, if valid { "passed" } else { "failed" }, file);
        }
    }

    fn on_download_started(&self, url: &str, resume_from: u64, total_size: Option<u64>) {
        match (resume_from, total_size) {
            (0, Some(size)) => println!("📥 Fetching {} ({} bytes)", url, size),
            (0, None) => println!("📥 Fetching {}", url),
            (offset, Some(size)) => println!("📥 Resuming {} at byte {} of {}", url, offset, size),
            (offset, None) => println!("📥 Resuming {} at byte {}", url, offset),
        }
    }

    fn on_download_progress(&self, url: &str, downloaded: u64, total: Option<u64>, speed_bps: f64) {
        if self.verbose {
            let speed_mb = speed_bps / 1_000_000.0;
            match total {
                Some(total) if total > 0 => {
                    let percent = (downloaded as f64 / total as f64) * 100.0;
                    println!(
                        "⏬ {}: {:.1}% ({}/{} bytes, {:.1} MB/s)",
                        url, percent, downloaded, total, speed_mb
                    );
                }
                _ => {
                    println!(
                        "⏬ {}: {} bytes downloaded ({:.1} MB/s)",
                        url, downloaded, speed_mb
                    );
                }
            }
        }
    }

    fn on_download_complete(&self, url: &str, final_size: u64) {
        println!("✅ Fetch complete: {} ({} bytes)", url, final_size);
    }

    fn on_warning(&self, file: &str, message: &str) {
        eprintln!("⚠️  {}: {}", file, message);
    }

    fn on_error(&self, file: &str, error: &str) {
        eprintln!("❌ Error fetching {}: {}", file, error);
    }
}

/// Reporter that forwards every event to `tracing`
#[derive(Debug, Default)]
pub struct TracingProgressReporter;

impl ProgressReporter for TracingProgressReporter {
    fn on_verification_complete(&self, file: &str, valid: bool) {
        if valid {
            info!("Parameter file {} is ok", file);
        } else {
            debug!("Parameter file {} failed verification", file);
        }
    }

    fn on_download_started(&self, url: &str, resume_from: u64, total_size: Option<u64>) {
        info!(resume_from, ?total_size, "GET {}", url);
    }

    fn on_download_complete(&self, url: &str, final_size: u64) {
        info!(final_size, "Fetched {}", url);
    }

    fn on_warning(&self, file: &str, message: &str) {
        warn!("{}: {}", file, message);
    }

    fn on_error(&self, file: &str, error: &str) {
        warn!("Fetching {} failed: {}", file, error);
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
        Self {
            reporters: Vec::new(),
        }
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
    fn on_verification_started(&self, file: &str) {
        for reporter in &self.reporters {
            reporter.on_verification_started(file);
        }
    }

    fn on_verification_complete(&self, file: &str, valid: bool) {
        for reporter in &self.reporters {
            reporter.on_verification_complete(file, valid);
        }
    }

    fn on_download_started(&self, url: &str, resume_from: u64, total_size: Option<u64>) {
        for reporter in &self.reporters {
            reporter.on_download_started(url, resume_from, total_size);
        }
    }

    fn on_download_progress(&self, url: &str, downloaded: u64, total: Option<u64>, speed_bps: f64) {
        for reporter in &self.reporters {
            reporter.on_download_progress(url, downloaded, total, speed_bps);
        }
    }

    fn on_download_complete(&self, url: &str, final_size: u64) {
        for reporter in &self.reporters {
            reporter.on_download_complete(url, final_size);
        }
    }

    fn on_warning(&self, file: &str, message: &str) {
        for reporter in &self.reporters {
            reporter.on_warning(file, message);
        }
    }

    fn on_error(&self, file: &str, error: &str) {
        for reporter in &self.reporters {
            reporter.on_error(file, error);
        }
    }
}
