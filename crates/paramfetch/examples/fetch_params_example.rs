//! Example showing how to fetch parameters for one sector size
//!
//! Files go to a temporary directory unless FIL_PROOFS_PARAMETER_CACHE is set.
//!
//! Run this example with:
//! ```
//! cargo run --example fetch_params_example
//! ```

use paramfetch::{FetchConfig, ParamFetcher, ProgressEvent};
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::main]
async fn main() -> paramfetch::Result<()> {
    tracing_subscriber::fmt::init();

    println!("🚀 Starting parameter fetch example");

    let temp_dir = tempdir().map_err(|e| paramfetch::ParamsError::Configuration {
        message: format!("could not create temporary directory: {}", e),
        field: None,
    })?;

    let mut config = FetchConfig::from_env()?;
    if std::env::var_os("FIL_PROOFS_PARAMETER_CACHE").is_none() {
        config = config.with_param_dir(temp_dir.path());
    }
    println!("📁 Parameter directory: {}", config.param_dir.display());
    println!("🌐 Gateway: {}", config.gateway);

    let fetcher = ParamFetcher::new(config)?;

    for file in fetcher.required_files(1024)? {
        println!("   needs {} ({})", file.name, file.cid);
    }

    let progress_callback = Arc::new(|event: ProgressEvent| match event {
        ProgressEvent::VerificationComplete { file, valid } => {
            if valid {
                println!("✅ {} is valid", file);
            } else {
                println!("🔍 {} needs fetching", file);
            }
        }
        ProgressEvent::DownloadStarted { url, resume_from, .. } => {
            if resume_from > 0 {
                println!("⏯️  Resuming {} from byte {}", url, resume_from);
            } else {
                println!("📥 Started downloading: {}", url);
            }
        }
        ProgressEvent::DownloadProgress { downloaded, total, speed_bps, .. } => match total {
            Some(total) => println!(
                "   Progress: {:.1}% ({} / {} bytes) at {:.1} KB/s",
                (downloaded as f64 / total as f64) * 100.0,
                downloaded,
                total,
                speed_bps / 1024.0
            ),
            None => println!("   Downloaded: {} bytes at {:.1} KB/s", downloaded, speed_bps / 1024.0),
        },
        ProgressEvent::DownloadComplete { final_size, .. } => {
            println!("✅ Download complete: {} bytes", final_size);
        }
        ProgressEvent::Warning { file, message } => {
            println!("⚠️  {}: {}", file, message);
        }
        ProgressEvent::Error { file, error } => {
            println!("❌ {}: {}", file, error);
        }
        ProgressEvent::VerificationStarted { .. } => {}
    });

    match fetcher.ensure_params(1024, Some(progress_callback)).await {
        Ok(summary) => {
            println!(
                "🎉 {} files ready ({} fetched, {} already valid)",
                summary.total(),
                summary.fetched.len(),
                summary.already_valid.len()
            );
        }
        Err(e) => {
            println!("{}", e.detailed_report());
            return Err(e);
        }
    }

    let snapshot = fetcher.metrics().snapshot();
    println!(
        "📊 {} checked, {} bytes downloaded, cache hit rate {:.0}%",
        snapshot.files_checked,
        snapshot.bytes_downloaded,
        snapshot.cache_hit_rate() * 100.0
    );

    Ok(())
}
