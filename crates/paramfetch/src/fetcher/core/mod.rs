//! Core types used throughout the fetcher
//!
//! Errors, progress reporting, metrics, verification, gateway downloads and
//! file helpers. Everything above this module depends on these types.

pub mod error;
pub mod files;
pub mod http;
pub mod metrics;
pub mod progress;
pub mod validation;

// Re-export main types for convenience
pub use error::{FetchErrors, FileOperation, ParamsError, Result};
pub use files::{ensure_param_dir, remove_corrupt_file};
pub use http::{GatewayDownloader, ParamDownloader};
pub use metrics::{FetchMetrics, FetchMetricsSnapshot};
pub use progress::{
    CompositeProgressReporter, ConsoleProgressReporter, IntoProgressCallback, NullProgressReporter,
    ProgressCallback, ProgressEvent, ProgressReporter, TracingProgressReporter,
};
pub use validation::{FileVerifier, IntegrityMode, Verification, digest_prefix, digest_prefix_of};
