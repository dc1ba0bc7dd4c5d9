//! File operation utilities
//!
//! Cache directory resolution and cleanup of files that failed verification.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::fetcher::config::FetchConfig;
use crate::fetcher::core::{ParamsError, Result};

/// Resolve the parameter directory and make sure it exists
///
/// Missing parents are created. A directory that already exists is fine; a
/// path occupied by anything else is an error.
pub async fn ensure_param_dir(config: &FetchConfig) -> Result<PathBuf> {
    let dir = config.param_dir.clone();

    match fs::create_dir_all(&dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
        Err(e) => return Err(ParamsError::Directory { path: dir, source: e }),
    }

    let metadata = fs::metadata(&dir)
        .await
        .map_err(|e| ParamsError::Directory { path: dir.clone(), source: e })?;
    if !metadata.is_dir() {
        return Err(ParamsError::Directory {
            path: dir,
            source: io::Error::new(io::ErrorKind::AlreadyExists, "path exists and is not a directory"),
        });
    }

    debug!("Using parameter directory {}", dir.display());
    Ok(dir)
}

/// Remove a file that failed verification after being fetched
///
/// A file that is already gone counts as removed.
pub async fn remove_corrupt_file(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => {
            warn!("Removed corrupt parameter file {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ParamsError::RemoveFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
