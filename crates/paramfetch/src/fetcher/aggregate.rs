//! Collection of per-file outcomes into one result
//!
//! Each task sends exactly one `(name, FetchOutcome)` message. Once every
//! task has been awaited and every sender dropped, the collector drains the
//! channel and folds the messages into a `FetchSummary` or a `FetchErrors`.

use tokio::sync::mpsc;

use crate::fetcher::core::{FetchErrors, ParamsError, Result};

/// What happened to one parameter file
#[derive(Debug)]
pub enum FetchOutcome {
    AlreadyValid,
    FetchedAndValid,
    FetchFailed(ParamsError),
    VerifyFailedAfterFetch {
        error: ParamsError,
        /// Set when the corrupt file could not be removed
        removal: Option<ParamsError>,
    },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::AlreadyValid | FetchOutcome::FetchedAndValid)
    }
}

/// Files satisfied by one successful invocation, sorted by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub already_valid: Vec<String>,
    pub fetched: Vec<String>,
}

impl FetchSummary {
    pub fn total(&self) -> usize {
        self.already_valid.len() + self.fetched.len()
    }
}

pub(crate) type OutcomeSender = mpsc::UnboundedSender<(String, FetchOutcome)>;

/// Receiving half of the outcome channel
pub(crate) struct OutcomeCollector {
    receiver: mpsc::UnboundedReceiver<(String, FetchOutcome)>,
    extra: FetchErrors,
}

pub(crate) fn outcome_channel() -> (OutcomeSender, OutcomeCollector) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        sender,
        OutcomeCollector {
            receiver,
            extra: FetchErrors::new(),
        },
    )
}

impl OutcomeCollector {
    /// Record a failure that did not come through the channel
    pub(crate) fn record_error(&mut self, error: ParamsError) {
        self.extra.push(error);
    }

    /// Drain every outcome; call only after all senders are gone
    pub(crate) async fn finish(mut self) -> Result<FetchSummary> {
        let mut summary = FetchSummary::default();
        let mut errors = FetchErrors::new();

        while let Some((name, outcome)) = self.receiver.recv().await {
            match outcome {
                FetchOutcome::AlreadyValid => summary.already_valid.push(name),
                FetchOutcome::FetchedAndValid => summary.fetched.push(name),
                FetchOutcome::FetchFailed(error) => errors.push(error),
                FetchOutcome::VerifyFailedAfterFetch { error, removal } => {
                    errors.push(error);
                    if let Some(removal) = removal {
                        errors.push(removal);
                    }
                }
            }
        }

        for error in self.extra.into_inner() {
            errors.push(error);
        }

        errors.into_result()?;
        summary.already_valid.sort();
        summary.fetched.sort();
        Ok(summary)
    }
}
