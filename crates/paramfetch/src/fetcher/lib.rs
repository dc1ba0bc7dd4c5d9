//! Main entry point for parameter fetching
//!
//! The call chain flows as follows:
//!
//! User Code
//! ↓
//! ParamFetcher::ensure_params (this file)
//! ↓
//! Manifest::select (manifest.rs)
//! ↓
//! batch::fetch_all, one task per file (batch.rs)
//! ↓
//! FileVerifier / GatewayDownloader (core/*)
//! ↓
//! OutcomeCollector (aggregate.rs)

use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::fetcher::{
    aggregate::FetchSummary,
    batch::{self, FetchContext},
    config::FetchConfig,
    core::{
        ensure_param_dir, FetchMetrics, FileVerifier, GatewayDownloader, IntegrityMode,
        IntoProgressCallback, ParamDownloader, ProgressCallback, Result, TracingProgressReporter,
    },
    manifest::{Manifest, ParamFile},
};

/// Ensures parameter files are present and verified in the cache directory
pub struct ParamFetcher {
    config: FetchConfig,
    manifest: Option<Arc<Manifest>>,
    downloader: Arc<dyn ParamDownloader>,
    integrity: IntegrityMode,
    fetch_permits: Arc<Semaphore>,
    metrics: Arc<FetchMetrics>,
}

impl ParamFetcher {
    /// Create a fetcher using the gateway named in `config`
    pub fn new(config: FetchConfig) -> Result<Self> {
        let downloader = Arc::new(GatewayDownloader::from_config(&config)?);
        Self::with_downloader(config, downloader)
    }

    /// Create a fetcher with a custom downloader implementation
    pub fn with_downloader(config: FetchConfig, downloader: Arc<dyn ParamDownloader>) -> Result<Self> {
        config.validate()?;
        let integrity = IntegrityMode::from_trust_flag(config.trust_params);
        let fetch_permits = Arc::new(Semaphore::new(config.max_concurrent_fetches));

        Ok(Self {
            config,
            manifest: None,
            downloader,
            integrity,
            fetch_permits,
            metrics: Arc::new(FetchMetrics::default()),
        })
    }

    /// Use `manifest` instead of the one compiled into the crate
    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = Some(Arc::new(manifest));
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn integrity_mode(&self) -> IntegrityMode {
        self.integrity
    }

    /// Get access to built-in fetch metrics
    pub fn metrics(&self) -> &FetchMetrics {
        &self.metrics
    }

    /// Manifest this fetcher works from
    pub fn manifest(&self) -> Result<Arc<Manifest>> {
        match &self.manifest {
            Some(manifest) => Ok(manifest.clone()),
            None => Ok(Arc::new(Manifest::embedded()?)),
        }
    }

    /// Files `ensure_params` would check for `sector_size`
    pub fn required_files(&self, sector_size: u64) -> Result<Vec<ParamFile>> {
        Ok(self.manifest()?.select(sector_size))
    }

    /// Make sure every file needed for `sector_size` is present and valid
    ///
    /// Manifest and directory problems abort before anything is fetched.
    /// Per-file failures do not stop other files; they are all returned
    /// together as `ParamsError::Aggregate` once every file is done.
    pub async fn ensure_params(
        &self,
        sector_size: u64,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<FetchSummary> {
        let manifest = self.manifest()?;
        let param_dir = ensure_param_dir(&self.config).await?;
        let files = manifest.select(sector_size);
        debug!(
            "Checking {} of {} parameter files for sector size {}",
            files.len(),
            manifest.len(),
            sector_size
        );

        let context = FetchContext {
            verifier: FileVerifier::new(self.integrity),
            downloader: self.downloader.clone(),
            fetch_permits: self.fetch_permits.clone(),
            metrics: self.metrics.clone(),
            progress_callback,
        };

        let summary = batch::fetch_all(&context, &param_dir, files).await?;
        info!(
            "Parameter files ready in {}: {} already valid, {} fetched",
            param_dir.display(),
            summary.already_valid.len(),
            summary.fetched.len()
        );
        Ok(summary)
    }
}

/// Ensure parameters for `sector_size` using configuration from the environment
///
/// Progress is reported through `tracing`.
pub async fn ensure_params(sector_size: u64) -> Result<FetchSummary> {
    let fetcher = ParamFetcher::new(FetchConfig::from_env()?)?;
    fetcher
        .ensure_params(sector_size, Some(TracingProgressReporter.into_callback()))
        .await
}
