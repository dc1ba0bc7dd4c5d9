//! Concurrent verify-or-fetch over a set of parameter files
//!
//! One task per file. Verification runs in parallel; the download step of
//! every task goes through a shared semaphore so only a bounded number of
//! transfers (one by default) hit the gateway at once.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn, Instrument, info_span};

use crate::fetcher::aggregate::{outcome_channel, FetchOutcome, FetchSummary, OutcomeSender};
use crate::fetcher::core::{
    remove_corrupt_file, FetchMetrics, FileVerifier, ParamDownloader, ParamsError, ProgressCallback,
    ProgressEvent, Result, Verification,
};
use crate::fetcher::core::progress::emit;
use crate::fetcher::manifest::ParamFile;

/// Everything a per-file task shares with its siblings
#[derive(Clone)]
pub(crate) struct FetchContext {
    pub verifier: FileVerifier,
    pub downloader: Arc<dyn ParamDownloader>,
    pub fetch_permits: Arc<Semaphore>,
    pub metrics: Arc<FetchMetrics>,
    pub progress_callback: Option<ProgressCallback>,
}

/// Spawn one task per file, wait for all of them and combine the outcomes
pub(crate) async fn fetch_all(
    context: &FetchContext,
    param_dir: &Path,
    files: Vec<ParamFile>,
) -> Result<FetchSummary> {
    let (sender, mut collector) = outcome_channel();
    let mut tasks = JoinSet::new();
    let mut names = std::collections::HashMap::new();

    for file in files {
        let context = context.clone();
        let sender: OutcomeSender = sender.clone();
        let path = param_dir.join(&file.name);
        let span = info_span!("param_file", name = %file.name);
        let name = file.name.clone();

        let handle = tasks.spawn(
            async move {
                let outcome = fetch_if_needed(&context, &file, path).await;
                // Receiver lives until every task has been joined
                let _ = sender.send((file.name, outcome));
            }
            .instrument(span),
        );
        names.insert(handle.id(), name);
    }
    drop(sender);

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            let name = names.remove(&e.id()).unwrap_or_default();
            warn!("Task for {} did not complete: {}", name, e);
            collector.record_error(ParamsError::TaskFailed {
                name,
                reason: e.to_string(),
            });
        }
    }

    collector.finish().await
}

/// Run the state machine for one file
///
/// `Unchecked -> Valid`, or `Unchecked -> NeedsFetch -> Fetching -> Valid | Invalid`.
pub(crate) async fn fetch_if_needed(context: &FetchContext, file: &ParamFile, path: PathBuf) -> FetchOutcome {
    let callback = context.progress_callback.as_ref();
    context.metrics.record_file_checked();

    match context.verifier.verify(&path, file, callback).await {
        Ok(Verification::Valid) => {
            info!("Parameter file {} is ok", path.display());
            context.metrics.record_already_valid();
            return FetchOutcome::AlreadyValid;
        }
        Ok(Verification::NotPresent) => {
            debug!("Parameter file {} is missing", path.display());
        }
        Ok(Verification::Mismatch { expected, actual }) => {
            warn!("checksum mismatch in param file {}, {} != {}", path.display(), actual, expected);
        }
        Err(e) => {
            warn!("Checking {} failed, fetching it again: {}", path.display(), e.error_chain());
        }
    }

    let fetched = {
        let _permit = match context.fetch_permits.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                return FetchOutcome::FetchFailed(ParamsError::TaskFailed {
                    name: file.name.clone(),
                    reason: format!("fetch permits unavailable: {}", e),
                });
            }
        };
        context.metrics.record_fetch_started();
        context
            .downloader
            .fetch(file, &path, context.progress_callback.clone())
            .await
    };

    match fetched {
        Ok(bytes) => context.metrics.record_fetch_completed(bytes),
        Err(e) => {
            context.metrics.record_fetch_failed();
            let error = ParamsError::FetchFailed {
                path,
                source: Box::new(e),
            };
            report_error(callback, file, &error);
            return FetchOutcome::FetchFailed(error);
        }
    }

    let failure = match context.verifier.verify(&path, file, callback).await {
        Ok(Verification::Valid) => return FetchOutcome::FetchedAndValid,
        Ok(other) => other
            .into_error(&path)
            .unwrap_or_else(|| ParamsError::NotPresent { path: path.clone() }),
        Err(e) => e,
    };

    context.metrics.record_verification_failed();
    let error = ParamsError::VerifyAfterFetch {
        path: path.clone(),
        source: Box::new(failure),
    };
    report_error(callback, file, &error);

    let removal = match remove_corrupt_file(&path).await {
        Ok(()) => {
            context.metrics.record_file_removed();
            None
        }
        Err(e) => {
            report_error(callback, file, &e);
            Some(e)
        }
    };

    FetchOutcome::VerifyFailedAfterFetch { error, removal }
}

fn report_error(callback: Option<&ProgressCallback>, file: &ParamFile, error: &ParamsError) {
    warn!("{}", error.error_chain());
    emit(
        callback,
        ProgressEvent::Error {
            file: file.name.clone(),
            error: error.error_chain(),
        },
    );
}
