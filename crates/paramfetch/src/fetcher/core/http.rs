//! Resumable gateway downloads
//!
//! Files are fetched with `GET <gateway><cid>` and a `Range: bytes=<len>-`
//! header, where `<len>` is the size of whatever is already on disk. The
//! body is appended to the existing file so interrupted transfers continue
//! where they stopped.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::RANGE;
use reqwest::{Client, StatusCode};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::fetcher::config::FetchConfig;
use crate::fetcher::core::error::{FileOperation, ParamsError, Result};
use crate::fetcher::core::progress::{emit, ProgressCallback, ProgressEvent};
use crate::fetcher::manifest::ParamFile;

/// Source of parameter file bytes
///
/// Implementations append the remote content of a file to `dest`, resuming
/// from its current length, and return the number of bytes written. They
/// never verify what they wrote.
#[async_trait]
pub trait ParamDownloader: Send + Sync {
    async fn fetch(
        &self,
        file: &ParamFile,
        dest: &Path,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<u64>;
}

/// Downloader talking to an IPFS HTTP gateway
#[derive(Debug, Clone)]
pub struct GatewayDownloader {
    client: Client,
    gateway: String,
    progress_interval: Duration,
}

impl GatewayDownloader {
    /// Create a gateway downloader from fetch configuration
    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        // No overall timeout: parameter files run to gigabytes
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ParamsError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
                field: None,
            })?;

        Ok(Self {
            client,
            gateway: config.gateway.clone(),
            progress_interval: config.progress_interval,
        })
    }

    pub fn gateway(&self) -> &str {
        &self.gateway
    }

    /// URL serving `file`: the gateway base with the CID appended verbatim
    pub fn url_for(&self, file: &ParamFile) -> Result<Url> {
        let raw = format!("{}{}", self.gateway, file.cid);
        Url::parse(&raw).map_err(|e| ParamsError::InvalidUrl { url: raw, source: e })
    }

    async fn request(&self, url: &Url, start_byte: u64) -> Result<reqwest::Response> {
        info!("GET {} (bytes={}-)", url, start_byte);
        self.client
            .get(url.clone())
            .header(RANGE, format!("bytes={}-", start_byte))
            .send()
            .await
            .map_err(|e| ParamsError::HttpRequest {
                url: url.to_string(),
                source: e,
            })
    }
}

fn fs_error(path: &Path, operation: FileOperation) -> impl FnOnce(std::io::Error) -> ParamsError + '_ {
    move |source| ParamsError::FileSystem {
        path: path.to_path_buf(),
        operation,
        source,
    }
}

#[async_trait]
impl ParamDownloader for GatewayDownloader {
    async fn fetch(
        &self,
        file: &ParamFile,
        dest: &Path,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<u64> {
        let url = self.url_for(file)?;
        info!("Fetching {} from {}", dest.display(), self.gateway);

        // Never truncate here, existing bytes are the resume point
        let mut out = fs::OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(dest)
            .await
            .map_err(fs_error(dest, FileOperation::Open))?;
        let mut start_byte = out
            .metadata()
            .await
            .map_err(fs_error(dest, FileOperation::Metadata))?
            .len();

        let mut response = self.request(&url, start_byte).await?;

        // Local file is at least as long as the remote one, so it cannot be a prefix
        if start_byte > 0 && response.status() == StatusCode::RANGE_NOT_SATISFIABLE {
            warn!(
                "Gateway rejected range bytes={}- for {}, restarting from byte 0",
                start_byte, url
            );
            out.set_len(0)
                .await
                .map_err(fs_error(dest, FileOperation::Truncate))?;
            start_byte = 0;
            response = self.request(&url, start_byte).await?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(ParamsError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        // A 200 to a ranged request carries the whole file
        let resume_from = if start_byte > 0 && status != StatusCode::PARTIAL_CONTENT {
            warn!("Gateway ignored range request for {}, restarting from byte 0", url);
            out.set_len(0)
                .await
                .map_err(fs_error(dest, FileOperation::Truncate))?;
            0
        } else {
            start_byte
        };

        let total_size = response.content_length().map(|len| resume_from + len);
        debug!("Resuming at {} bytes, total size: {:?}", resume_from, total_size);

        emit(
            progress_callback.as_ref(),
            ProgressEvent::DownloadStarted {
                url: url.to_string(),
                resume_from,
                total_size,
            },
        );

        let mut stream = response.bytes_stream();
        let mut downloaded = resume_from;
        let start_time = Instant::now();
        let mut last_progress_time = start_time;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| ParamsError::HttpRequest {
                url: url.to_string(),
                source: e,
            })?;

            out.write_all(&chunk)
                .await
                .map_err(fs_error(dest, FileOperation::Write))?;
            downloaded += chunk.len() as u64;

            let now = Instant::now();
            if now.duration_since(last_progress_time) >= self.progress_interval {
                let elapsed = start_time.elapsed().as_secs_f64();
                let speed = if elapsed > 0.0 {
                    (downloaded - resume_from) as f64 / elapsed
                } else {
                    0.0
                };

                emit(
                    progress_callback.as_ref(),
                    ProgressEvent::DownloadProgress {
                        url: url.to_string(),
                        downloaded,
                        total: total_size,
                        speed_bps: speed,
                    },
                );
                last_progress_time = now;
            }
        }

        out.flush().await.map_err(fs_error(dest, FileOperation::Write))?;
        out.sync_all().await.map_err(fs_error(dest, FileOperation::Sync))?;

        emit(
            progress_callback.as_ref(),
            ProgressEvent::DownloadComplete {
                url: url.to_string(),
                final_size: downloaded,
            },
        );

        debug!("Fetched {} bytes into {}", downloaded - resume_from, dest.display());
        Ok(downloaded - resume_from)
    }
}
