//! Error types for the parameter fetcher with path and URL context

use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while loading the manifest or fetching parameter files
#[derive(Error, Debug)]
pub enum ParamsError {
    /// The bundled manifest could not be parsed
    #[error("Failed to parse parameter manifest")]
    Manifest {
        #[source]
        source: serde_json::Error,
    },

    /// The parameter cache directory could not be created or is not a directory
    #[error("Parameter directory '{path}' is unusable")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File system I/O errors with file context
    #[error("File operation failed on '{path}' while {operation}")]
    FileSystem {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    /// Transport-level HTTP failure
    #[error("HTTP request to '{url}' failed")]
    HttpRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The gateway answered with a non-success status
    #[error("Gateway returned {status} for '{url}'")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    /// Gateway base and CID did not form a valid URL
    #[error("Invalid gateway URL '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Download step failed for one file
    #[error("fetching file '{path}' failed")]
    FetchFailed {
        path: PathBuf,
        #[source]
        source: Box<ParamsError>,
    },

    /// File still did not verify after a successful download
    #[error("checking file '{path}' failed")]
    VerifyAfterFetch {
        path: PathBuf,
        #[source]
        source: Box<ParamsError>,
    },

    /// Digest of a local file did not match the manifest
    #[error("checksum mismatch in param file '{path}', {actual} != {expected}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// File vanished before it could be verified
    #[error("param file '{path}' is not present")]
    NotPresent { path: PathBuf },

    /// Removing a corrupt file failed
    #[error("remove file '{path}' failed")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A per-file task panicked or was cancelled
    #[error("Task for param file '{name}' failed: {reason}")]
    TaskFailed { name: String, reason: String },

    /// Configuration errors
    #[error("Invalid configuration: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// Every per-file failure of one invocation
    #[error(transparent)]
    Aggregate(FetchErrors),
}

/// Types of file operations for error context
#[derive(Debug, Clone, PartialEq)]
pub enum FileOperation {
    Open,
    Read,
    Write,
    Truncate,
    Sync,
    Metadata,
}

impl fmt::Display for FileOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOperation::Open => write!(f, "opening"),
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Truncate => write!(f, "truncating"),
            FileOperation::Sync => write!(f, "syncing"),
            FileOperation::Metadata => write!(f, "reading metadata"),
        }
    }
}

pub type Result<T> = std::result::Result<T, ParamsError>;

impl ParamsError {
    /// Fatal errors abort the whole invocation before any file is fetched
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ParamsError::Manifest { .. }
                | ParamsError::Directory { .. }
                | ParamsError::Configuration { .. }
        )
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            ParamsError::Manifest { .. } => "manifest",
            ParamsError::Directory { .. } => "directory",
            ParamsError::FileSystem { .. } => "file_system",
            ParamsError::HttpRequest { .. } => "http_request",
            ParamsError::HttpStatus { .. } => "http_status",
            ParamsError::InvalidUrl { .. } => "invalid_url",
            ParamsError::FetchFailed { .. } => "fetch_failed",
            ParamsError::VerifyAfterFetch { .. } => "verify_after_fetch",
            ParamsError::ChecksumMismatch { .. } => "checksum_mismatch",
            ParamsError::NotPresent { .. } => "not_present",
            ParamsError::RemoveFailed { .. } => "remove_failed",
            ParamsError::TaskFailed { .. } => "task_failed",
            ParamsError::Configuration { .. } => "configuration",
            ParamsError::Aggregate(_) => "aggregate",
        }
    }

    /// Render this error followed by every source, joined with ": "
    pub fn error_chain(&self) -> String {
        let mut chain = self.to_string();
        let mut current = self.source();
        while let Some(cause) = current {
            chain.push_str(": ");
            chain.push_str(&cause.to_string());
            current = cause.source();
        }
        chain
    }

    /// Create a detailed error report for debugging
    pub fn detailed_report(&self) -> String {
        let mut report = format!("Error: {}\n", self);
        report.push_str(&format!("Category: {}\n", self.category()));
        report.push_str(&format!("Fatal: {}\n", self.is_fatal()));

        if let Some(source) = self.source() {
            report.push_str(&format!("Root cause: {}\n", source));
        }

        report
    }
}

/// Failures collected from all per-file tasks of one invocation
#[derive(Debug, Default)]
pub struct FetchErrors {
    errors: Vec<ParamsError>,
}

impl FetchErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ParamsError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamsError> {
        self.errors.iter()
    }

    pub fn into_inner(self) -> Vec<ParamsError> {
        self.errors
    }

    /// `Ok(())` when nothing failed, otherwise the combined error
    pub fn into_result(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ParamsError::Aggregate(self))
        }
    }
}

impl fmt::Display for FetchErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [] => write!(f, "no errors"),
            [single] => write!(f, "{}", single.error_chain()),
            errors => {
                write!(f, "{} parameter files failed", errors.len())?;
                for error in errors {
                    write!(f, "\n  - {}", error.error_chain())?;
                }
                Ok(())
            }
        }
    }
}

impl Error for FetchErrors {}

impl FromIterator<ParamsError> for FetchErrors {
    fn from_iter<I: IntoIterator<Item = ParamsError>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl From<serde_json::Error> for ParamsError {
    fn from(error: serde_json::Error) -> Self {
        ParamsError::Manifest { source: error }
    }
}
