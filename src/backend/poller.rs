//! Background polling loop with adaptive interval and exponential backoff.
//!
//! The interval comes from a `watch::Receiver<u64>` the event loop writes to
//! whenever run activity changes; the poller wakes early on a change. After
//! consecutive failures the delay grows as `base × 2^failures`, capped at
//! `MAX_BACKOFF_SECS`, and resets on the next success.

use crate::app::RunId;
use crate::backend::parser;
use crate::events::AppEvent;
use crate::traits::RunBackend;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time;

const MAX_BACKOFF_SECS: u64 = 300;

pub struct Poller {
    backend: Arc<dyn RunBackend>,
    limit: usize,
    job: Option<String>,
    tx: mpsc::UnboundedSender<AppEvent>,
    interval_rx: watch::Receiver<u64>,
}

/// Compute backoff delay: `min(base_interval * 2^failures, MAX_BACKOFF_SECS)`.
pub fn backoff_delay(base_interval: u64, failures: u32) -> u64 {
    let multiplier = 1u64.checked_shl(failures).unwrap_or(u64::MAX);
    base_interval
        .saturating_mul(multiplier)
        .clamp(1, MAX_BACKOFF_SECS)
}

impl Poller {
    pub fn new(
        backend: Arc<dyn RunBackend>,
        limit: usize,
        job: Option<String>,
        tx: mpsc::UnboundedSender<AppEvent>,
        interval_rx: watch::Receiver<u64>,
    ) -> Self {
        Self {
            backend,
            limit,
            job,
            tx,
            interval_rx,
        }
    }

    pub async fn run(mut self) {
        let mut failures: u32 = 0;

        loop {
            match refresh(&*self.backend, self.limit, self.job.as_deref(), &self.tx, false).await
            {
                PollOutcome::Success => failures = 0,
                PollOutcome::Failure => {
                    failures = failures.saturating_add(1);
                    let next_delay = backoff_delay(*self.interval_rx.borrow(), failures);
                    tracing::warn!(failures, next_delay, "poll failed");
                }
                PollOutcome::ChannelClosed => return,
            }

            let base_interval = *self.interval_rx.borrow();
            let delay = if failures > 0 {
                backoff_delay(base_interval, failures)
            } else {
                base_interval
            };
            tokio::select! {
                () = time::sleep(time::Duration::from_secs(delay)) => {},
                _ = self.interval_rx.changed() => {},
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Success,
    Failure,
    ChannelClosed,
}

/// Fetch runs and the workspace once and report them on `tx`.
///
/// A workspace failure does not fail the poll: the runs are still delivered
/// with `workspace: None` and the previous workspace stays in effect.
pub async fn refresh(
    backend: &dyn RunBackend,
    limit: usize,
    job: Option<&str>,
    tx: &mpsc::UnboundedSender<AppEvent>,
    manual: bool,
) -> PollOutcome {
    let runs = match backend.fetch_runs(limit, job).await {
        Ok(json) => match parser::parse_runs(&json) {
            Ok(runs) => runs,
            Err(e) => return report_failure(tx, format!("Parse error: {e}"), manual),
        },
        Err(e) => return report_failure(tx, format!("{e}"), manual),
    };

    let workspace = match backend.fetch_workspace().await {
        Ok(json) => match parser::parse_workspace(&json) {
            Ok(ws) => Some(ws),
            Err(e) => {
                tracing::warn!("workspace parse error: {e}");
                None
            }
        },
        Err(e) => {
            tracing::warn!("workspace fetch failed: {e}");
            None
        }
    };

    if tx
        .send(AppEvent::PollResult {
            runs,
            workspace,
            manual,
        })
        .is_err()
    {
        return PollOutcome::ChannelClosed;
    }
    PollOutcome::Success
}

fn report_failure(
    tx: &mpsc::UnboundedSender<AppEvent>,
    message: String,
    manual: bool,
) -> PollOutcome {
    if tx.send(AppEvent::PollFailed { message, manual }).is_err() {
        return PollOutcome::ChannelClosed;
    }
    PollOutcome::Failure
}

pub async fn fetch_run_config(
    backend: &dyn RunBackend,
    run_id: RunId,
    tx: &mpsc::UnboundedSender<AppEvent>,
) {
    let result = match backend.fetch_run_config(&run_id).await {
        Ok(json) => parser::parse_run_config(&json).map_err(|e| format!("Config parse error: {e}")),
        Err(e) => Err(format!("{e}")),
    };
    if tx.send(AppEvent::ConfigResult { run_id, result }).is_err() {
        tracing::warn!("fetch_run_config: channel closed");
    }
}
