//! Proof Parameter Fetcher
//!
//! This library makes sure the large parameter files a proving backend needs
//! are present in a local cache directory and match the digests recorded in
//! a bundled manifest. Missing or corrupt files are fetched from an IPFS
//! gateway, resuming partial downloads where possible.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use paramfetch::{ConsoleProgressReporter, FetchConfig, IntoProgressCallback, ParamFetcher};
//!
//! # async fn example() -> paramfetch::Result<()> {
//! // Read FIL_PROOFS_PARAMETER_CACHE, IPFS_GATEWAY and TRUST_PARAMS
//! let config = FetchConfig::from_env()?;
//!
//! let fetcher = ParamFetcher::new(config)?;
//! let progress = ConsoleProgressReporter::new(false).into_callback();
//!
//! // Everything needed for 1KiB sectors
//! let summary = fetcher.ensure_params(1024, Some(progress)).await?;
//! println!("{} fetched, {} already valid", summary.fetched.len(), summary.already_valid.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Size selection**: `.params` files are only fetched for their own sector size
//! - **Integrity checks**: BLAKE2b-512 digest prefixes, with an explicit trust mode
//! - **Resume capability**: partial files continue with HTTP range requests
//! - **Bounded fetching**: files are verified in parallel, downloads go through a semaphore
//! - **Error aggregation**: one failing file never hides or stops the others
//! - **Progress tracking**: events for verification and transfer progress

pub mod fetcher;

// Re-export commonly used types for convenience
pub use fetcher::{
    ensure_params, CompositeProgressReporter, ConsoleProgressReporter, FetchConfig, FetchErrors,
    FetchMetricsSnapshot, FetchOutcome, FetchSummary, IntegrityMode, IntoProgressCallback, Manifest,
    NullProgressReporter, ParamDownloader, ParamFetcher, ParamFile, ParamsError, ProgressCallback,
    ProgressEvent, ProgressReporter, Result, TracingProgressReporter,
};
