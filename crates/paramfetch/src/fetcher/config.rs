//! Configuration types for the parameter fetcher

use std::path::PathBuf;
use std::time::Duration;

use crate::fetcher::core::{ParamsError, Result};

/// Default location of the parameter cache
pub const DEFAULT_PARAM_DIR: &str = "/var/tmp/filecoin-proof-parameters";
/// Default IPFS gateway, CIDs are appended verbatim
pub const DEFAULT_GATEWAY: &str = "https://ipfs.io/ipfs/";

/// Overrides the parameter cache directory
pub const PARAM_DIR_ENV: &str = "FIL_PROOFS_PARAMETER_CACHE";
/// Disables digest verification when set to an affirmative value
pub const TRUST_PARAMS_ENV: &str = "TRUST_PARAMS";
/// Overrides the gateway base URL
pub const GATEWAY_ENV: &str = "IPFS_GATEWAY";
/// Overrides the number of downloads allowed to run at once
pub const MAX_FETCHES_ENV: &str = "PARAMFETCH_MAX_CONCURRENT_FETCHES";

/// Configuration for parameter fetching
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Directory holding one file per manifest entry
    pub param_dir: PathBuf,
    /// Base URL the CID is appended to
    pub gateway: String,
    /// Accept any present file without computing its digest
    pub trust_params: bool,
    /// Number of downloads that may be in flight at once (1 = fully serialized)
    pub max_concurrent_fetches: usize,
    pub connect_timeout: Duration,
    pub user_agent: String,
    /// Minimum delay between two download progress events
    pub progress_interval: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            param_dir: PathBuf::from(DEFAULT_PARAM_DIR),
            gateway: DEFAULT_GATEWAY.to_string(),
            trust_params: false,
            max_concurrent_fetches: 1,
            connect_timeout: Duration::from_secs(30),
            user_agent: concat!("paramfetch/", env!("CARGO_PKG_VERSION")).to_string(),
            progress_interval: Duration::from_millis(100),
        }
    }
}

impl FetchConfig {
    /// Build a configuration from the process environment
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(dir) = non_empty(PARAM_DIR_ENV) {
            config.param_dir = PathBuf::from(dir);
        }
        if let Some(gateway) = non_empty(GATEWAY_ENV) {
            config.gateway = gateway;
        }
        if let Some(trust) = non_empty(TRUST_PARAMS_ENV) {
            config.trust_params = is_affirmative(&trust);
        }
        if let Some(limit) = non_empty(MAX_FETCHES_ENV) {
            let parsed = limit.trim().parse::<usize>().map_err(|e| ParamsError::Configuration {
                message: format!("{} must be a positive integer, got '{}': {}", MAX_FETCHES_ENV, limit, e),
                field: Some("max_concurrent_fetches".to_string()),
            })?;
            config.max_concurrent_fetches = parsed;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_param_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.param_dir = dir.into();
        self
    }

    pub fn with_gateway<S: Into<String>>(mut self, gateway: S) -> Self {
        self.gateway = gateway.into();
        self
    }

    pub fn with_trust_params(mut self, trust: bool) -> Self {
        self.trust_params = trust;
        self
    }

    pub fn with_max_concurrent_fetches(mut self, limit: usize) -> Self {
        self.max_concurrent_fetches = limit;
        self
    }

    pub fn with_user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Reject settings the fetcher cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_fetches == 0 {
            return Err(ParamsError::Configuration {
                message: "at least one concurrent fetch is required".to_string(),
                field: Some("max_concurrent_fetches".to_string()),
            });
        }
        if self.gateway.trim().is_empty() {
            return Err(ParamsError::Configuration {
                message: "gateway URL is empty".to_string(),
                field: Some("gateway".to_string()),
            });
        }
        if self.param_dir.as_os_str().is_empty() {
            return Err(ParamsError::Configuration {
                message: "parameter directory is empty".to_string(),
                field: Some("param_dir".to_string()),
            });
        }
        Ok(())
    }
}

fn is_affirmative(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
