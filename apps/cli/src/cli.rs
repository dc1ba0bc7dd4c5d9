//! Command line front end for the parameter fetcher.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use paramfetch::{ConsoleProgressReporter, FetchConfig, IntoProgressCallback, ParamFetcher};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "paramfetch")]
#[command(about = "Fetch and verify proof parameter files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Make sure every parameter file for a sector size is present and valid.
    Fetch {
        /// Sector size in bytes, or with a KiB/MiB/GiB suffix.
        #[arg(value_parser = parse_sector_size)]
        sector_size: u64,

        /// Directory holding the parameter files.
        #[arg(long, value_name = "DIR")]
        param_dir: Option<PathBuf>,

        /// Gateway base URL the CID is appended to.
        #[arg(long, value_name = "URL")]
        gateway: Option<String>,

        /// Accept any present file without checking its digest.
        #[arg(long)]
        trust: bool,

        /// Number of downloads allowed at once.
        #[arg(long, value_name = "N")]
        parallel: Option<usize>,
    },

    /// List the parameter files a sector size needs.
    List {
        /// Sector size in bytes, or with a KiB/MiB/GiB suffix.
        #[arg(value_parser = parse_sector_size)]
        sector_size: u64,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut config = FetchConfig::from_env().context("reading configuration")?;

        match self.command {
            CliCommand::Fetch {
                sector_size,
                param_dir,
                gateway,
                trust,
                parallel,
            } => {
                if let Some(dir) = param_dir {
                    config = config.with_param_dir(dir);
                }
                if let Some(gateway) = gateway {
                    config = config.with_gateway(gateway);
                }
                if trust {
                    config = config.with_trust_params(true);
                }
                if let Some(limit) = parallel {
                    config = config.with_max_concurrent_fetches(limit);
                }
                run_fetch(config, sector_size, self.verbose > 0).await
            }
            CliCommand::List { sector_size } => run_list(config, sector_size),
        }
    }
}

async fn run_fetch(config: FetchConfig, sector_size: u64, verbose: bool) -> Result<()> {
    let fetcher = ParamFetcher::new(config)?;
    let progress = ConsoleProgressReporter::new(verbose).into_callback();

    let summary = fetcher
        .ensure_params(sector_size, Some(progress))
        .await
        .with_context(|| format!("ensuring parameters for sector size {}", sector_size))?;

    println!(
        "{} parameter files ready in {} ({} fetched)",
        summary.total(),
        fetcher.config().param_dir.display(),
        summary.fetched.len()
    );
    Ok(())
}

fn run_list(config: FetchConfig, sector_size: u64) -> Result<()> {
    let fetcher = ParamFetcher::new(config)?;
    check_known_size(&fetcher.manifest()?.sector_sizes(), sector_size)?;

    for file in fetcher.required_files(sector_size)? {
        println!("{}\t{}\t{}", file.name, file.cid, file.digest);
    }
    Ok(())
}

/// Reject sizes the manifest has no size-specific parameters for
fn check_known_size(known: &[u64], sector_size: u64) -> Result<()> {
    if !known.contains(&sector_size) {
        bail!(
            "no parameter files for sector size {} (known sizes: {:?})",
            sector_size,
            known
        );
    }
    Ok(())
}

/// Parse `1024`, `2KiB`, `512MiB` or `32GiB` into bytes
pub fn parse_sector_size(input: &str) -> Result<u64, String> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, suffix) = trimmed.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid sector size '{}'", input))?;
    let multiplier: u64 = match suffix.trim() {
        "" | "B" => 1,
        "KiB" => 1 << 10,
        "MiB" => 1 << 20,
        "GiB" => 1 << 30,
        other => return Err(format!("unknown size suffix '{}'", other)),
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("sector size '{}' is too large", input))
}
