//! Digest verification of local parameter files

use blake2::{Blake2b512, Digest};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::fetcher::core::error::{FileOperation, ParamsError, Result};
use crate::fetcher::core::progress::{emit, ProgressCallback, ProgressEvent};
use crate::fetcher::manifest::ParamFile;

/// Buffer size for streaming files through the hasher (64KB)
const BUFFER_SIZE: usize = 64 * 1024;

/// Number of digest bytes recorded in the manifest
pub const DIGEST_PREFIX_LEN: usize = 16;

/// How local files are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityMode {
    /// Hash the file and compare the digest prefix
    Digest,
    /// Accept any present file. DO NOT USE IN PRODUCTION
    Trust,
}

impl IntegrityMode {
    pub fn from_trust_flag(trust_params: bool) -> Self {
        if trust_params { IntegrityMode::Trust } else { IntegrityMode::Digest }
    }
}

/// Result of checking a local file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid,
    NotPresent,
    Mismatch { expected: String, actual: String },
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid)
    }

    /// Convert a failed check into an error describing it
    pub fn into_error(self, path: &Path) -> Option<ParamsError> {
        match self {
            Verification::Valid => None,
            Verification::NotPresent => Some(ParamsError::NotPresent {
                path: path.to_path_buf(),
            }),
            Verification::Mismatch { expected, actual } => Some(ParamsError::ChecksumMismatch {
                path: path.to_path_buf(),
                expected,
                actual,
            }),
        }
    }
}

/// Checks local files against their manifest digest
#[derive(Debug, Clone)]
pub struct FileVerifier {
    mode: IntegrityMode,
}

impl FileVerifier {
    pub fn new(mode: IntegrityMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> IntegrityMode {
        self.mode
    }

    /// Verify `path` against `file`
    ///
    /// I/O failures other than a missing file are returned as errors so the
    /// caller can tell them apart from a digest mismatch.
    pub async fn verify(
        &self,
        path: &Path,
        file: &ParamFile,
        progress_callback: Option<&ProgressCallback>,
    ) -> Result<Verification> {
        let shown = path.display().to_string();
        emit(progress_callback, ProgressEvent::VerificationStarted { file: shown.clone() });

        let verification = match self.mode {
            IntegrityMode::Trust => self.check_present(path, progress_callback).await?,
            IntegrityMode::Digest => {
                let owned = path.to_path_buf();
                let hashed = tokio::task::spawn_blocking(move || digest_prefix(&owned))
                    .await
                    .map_err(|e| ParamsError::TaskFailed {
                        name: file.name.clone(),
                        reason: format!("Hash computation failed: {}", e),
                    })?;

                match hashed {
                    Ok(actual) if actual == file.digest => Verification::Valid,
                    Ok(actual) => {
                        debug!("Checksum mismatch in param file {}, {} != {}", shown, actual, file.digest);
                        Verification::Mismatch {
                            expected: file.digest.clone(),
                            actual,
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Verification::NotPresent,
                    Err(e) => {
                        return Err(ParamsError::FileSystem {
                            path: path.to_path_buf(),
                            operation: FileOperation::Read,
                            source: e,
                        });
                    }
                }
            }
        };

        emit(
            progress_callback,
            ProgressEvent::VerificationComplete {
                file: shown,
                valid: verification.is_valid(),
            },
        );
        Ok(verification)
    }

    async fn check_present(
        &self,
        path: &Path,
        progress_callback: Option<&ProgressCallback>,
    ) -> Result<Verification> {
        match tokio::fs::metadata(path).await {
            Ok(_) => {
                warn!("Assuming parameter file {} is ok. DO NOT USE IN PRODUCTION", path.display());
                emit(
                    progress_callback,
                    ProgressEvent::Warning {
                        file: path.display().to_string(),
                        message: "digest verification disabled, trusting local file".to_string(),
                    },
                );
                Ok(Verification::Valid)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Verification::NotPresent),
            Err(e) => Err(ParamsError::FileSystem {
                path: PathBuf::from(path),
                operation: FileOperation::Metadata,
                source: e,
            }),
        }
    }
}

/// Hex of the first 16 bytes of the file's BLAKE2b-512 digest
pub fn digest_prefix(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Blake2b512::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    let digest = hasher.finalize();
    Ok(hex::encode(&digest[..DIGEST_PREFIX_LEN]))
}

/// Digest prefix of an in-memory buffer, as stored in the manifest
pub fn digest_prefix_of(data: &[u8]) -> String {
    let digest = Blake2b512::digest(data);
    hex::encode(&digest[..DIGEST_PREFIX_LEN])
}
