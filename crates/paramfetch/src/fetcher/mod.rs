//! Fetcher module
//!
//! This module contains the parameter fetching pipeline: manifest and
//! selection, configuration, core types, the per-file batch logic and the
//! outcome aggregation.

pub mod core;
pub mod config;
pub mod manifest;
pub mod aggregate;
pub(crate) mod batch;
pub mod r#lib;

// Re-export main types for convenience
pub use r#lib::{ensure_params, ParamFetcher};
pub use core::{
    ParamsError, FetchErrors, Result, FileOperation,
    ProgressCallback, ProgressEvent, ProgressReporter, IntoProgressCallback,
    ConsoleProgressReporter, NullProgressReporter, CompositeProgressReporter, TracingProgressReporter,
    FileVerifier, IntegrityMode, Verification,
    GatewayDownloader, ParamDownloader,
    FetchMetrics, FetchMetricsSnapshot,
};
pub use config::FetchConfig;
pub use manifest::{Manifest, ParamFile};
pub use aggregate::{FetchOutcome, FetchSummary};

#[cfg(test)]
mod tests;
