//! Dispatch of confirmed dialog operations against the backend.
//!
//! Backend errors never escape: every requested run ends up with exactly one
//! [`RunOutcome`] in the returned report, in request order.

use crate::app::RunId;
use crate::backend::parser::{self, ReexecuteResponse};
use crate::dialog::{ActionReport, OperationRequest, RunOutcome, TerminationPolicy};
use crate::reexecute::ReexecutionRequest;
use crate::traits::RunBackend;
use std::collections::HashMap;

pub const SKIPPED_MESSAGE: &str = "launcher cannot terminate this run; press f to force";
const MISSING_RESULT_MESSAGE: &str = "no result returned for this run";

pub async fn execute(backend: &dyn RunBackend, request: &OperationRequest) -> ActionReport {
    let outcomes = match request {
        OperationRequest::Terminate {
            run_ids,
            policy,
            skipped,
        } => terminate(backend, run_ids, *policy, skipped).await,
        OperationRequest::Delete { run_ids } => delete(backend, run_ids).await,
        OperationRequest::Reexecute { requests } => reexecute(backend, requests).await,
    };
    let report = ActionReport::new(outcomes);
    tracing::info!(
        succeeded = report.succeeded_count(),
        total = report.outcomes.len(),
        "operation finished"
    );
    report
}

async fn terminate(
    backend: &dyn RunBackend,
    run_ids: &[RunId],
    policy: TerminationPolicy,
    skipped: &[RunId],
) -> Vec<RunOutcome> {
    let mut outcomes = Vec::with_capacity(run_ids.len() + skipped.len());

    if !run_ids.is_empty() {
        let result = match backend.terminate_runs(run_ids, policy).await {
            Ok(json) => parser::parse_terminate_results(&json).map_err(|e| format!("{e}")),
            Err(e) => Err(format!("{e}")),
        };
        match result {
            Ok(returned) => {
                let mut by_id: HashMap<RunId, RunOutcome> = returned
                    .into_iter()
                    .map(|o| (o.run_id.clone(), o))
                    .collect();
                for id in run_ids {
                    outcomes.push(
                        by_id
                            .remove(id)
                            .unwrap_or_else(|| RunOutcome::failed(id.clone(), MISSING_RESULT_MESSAGE)),
                    );
                }
            }
            Err(message) => {
                tracing::warn!("terminate failed: {message}");
                outcomes.extend(
                    run_ids
                        .iter()
                        .map(|id| RunOutcome::failed(id.clone(), message.clone())),
                );
            }
        }
    }

    outcomes.extend(
        skipped
            .iter()
            .map(|id| RunOutcome::failed(id.clone(), SKIPPED_MESSAGE)),
    );
    outcomes
}

async fn delete(backend: &dyn RunBackend, run_ids: &[RunId]) -> Vec<RunOutcome> {
    let mut outcomes = Vec::with_capacity(run_ids.len());
    for id in run_ids {
        let outcome = match backend.delete_run(id).await {
            Ok(()) => RunOutcome::succeeded(id.clone()),
            Err(e) => RunOutcome::failed(id.clone(), format!("{e}")),
        };
        outcomes.push(outcome);
    }
    outcomes
}

async fn reexecute(backend: &dyn RunBackend, requests: &[ReexecutionRequest]) -> Vec<RunOutcome> {
    let mut outcomes = Vec::with_capacity(requests.len());
    for request in requests {
        let parent = request.parent_run_id().clone();
        let json = match serde_json::to_string(request) {
            Ok(json) => json,
            Err(e) => {
                outcomes.push(RunOutcome::failed(parent, format!("Invalid request: {e}")));
                continue;
            }
        };
        let outcome = match backend.reexecute(&json).await {
            Ok(body) => match parser::parse_reexecute_result(&body) {
                Ok(ReexecuteResponse::Launched(new_run_id)) => {
                    tracing::info!(parent = %parent, new_run = %new_run_id, "run launched");
                    RunOutcome::launched(parent, new_run_id)
                }
                Ok(ReexecuteResponse::Rejected(message)) => RunOutcome::failed(parent, message),
                Err(e) => RunOutcome::failed(parent, format!("Parse error: {e}")),
            },
            Err(e) => RunOutcome::failed(parent, format!("{e}")),
        };
        outcomes.push(outcome);
    }
    outcomes
}
