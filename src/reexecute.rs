//! Building re-execution requests.
//!
//! A single run is re-executed from its fetched config and the repository
//! that still defines its job ([`ReexecutionRequest::Launch`]). Bulk
//! re-execution only names the parent run and lets the backend clone it
//! ([`ReexecutionRequest::FromParent`]).

use crate::app::{Resource, Run, RunConfig, RunId, RunTag};
use crate::permissions::{config_ready, DisabledReason};
use crate::status::is_failed;
use crate::workspace::RepositoryMatch;
use serde::Serialize;

/// Tags the backend reserves for re-execution lineage. Copied user tags with
/// this prefix are replaced, never duplicated.
pub const SYSTEM_TAG_PREFIX: &str = "runs/";
pub const PARENT_RUN_ID_TAG: &str = "runs/parent_run_id";
pub const ROOT_RUN_ID_TAG: &str = "runs/root_run_id";
pub const STRATEGY_TAG: &str = "runs/reexecution_strategy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReexecutionStrategy {
    AllSteps,
    FromFailure,
}

impl ReexecutionStrategy {
    pub fn label(self) -> &'static str {
        match self {
            ReexecutionStrategy::AllSteps => "all steps",
            ReexecutionStrategy::FromFailure => "from failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSelector {
    pub repository_name: String,
    pub repository_location_name: String,
    pub job_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionParams {
    pub parent_run_id: RunId,
    pub root_run_id: RunId,
    pub strategy: ReexecutionStrategy,
    /// Exactly the text returned by the config fetch.
    pub run_config_yaml: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    pub selector: JobSelector,
    /// `None` for from-failure: the backend picks the failed and unexecuted
    /// steps itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_selection: Option<Vec<String>>,
    pub tags: Vec<RunTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ReexecutionRequest {
    Launch(ExecutionParams),
    #[serde(rename_all = "camelCase")]
    FromParent {
        parent_run_id: RunId,
        strategy: ReexecutionStrategy,
    },
}

impl ReexecutionRequest {
    pub fn parent_run_id(&self) -> &RunId {
        match self {
            ReexecutionRequest::Launch(params) => &params.parent_run_id,
            ReexecutionRequest::FromParent { parent_run_id, .. } => parent_run_id,
        }
    }

    pub fn strategy(&self) -> ReexecutionStrategy {
        match self {
            ReexecutionRequest::Launch(params) => params.strategy,
            ReexecutionRequest::FromParent { strategy, .. } => *strategy,
        }
    }
}

/// Why a launch request could not be built. Callers render this as the
/// explanation on a disabled control.
pub type ReexecuteBlocked = DisabledReason;

/// Build the request for re-executing one run from its fetched config.
pub fn build_launch_request(
    run: &Run,
    config: Option<&Resource<RunConfig>>,
    repository: Option<&RepositoryMatch>,
    strategy: ReexecutionStrategy,
) -> Result<ReexecutionRequest, ReexecuteBlocked> {
    if !run.can_reexecute {
        return Err(DisabledReason::NoPermission);
    }
    if strategy == ReexecutionStrategy::FromFailure && !is_failed(run.status) {
        return Err(DisabledReason::NotFailed);
    }
    let repository = repository.ok_or(DisabledReason::NoRepositoryMatch)?;
    config_ready(config)?;
    let Some(Resource::Ready(config)) = config else {
        return Err(DisabledReason::ConfigNotFetched);
    };

    let root_run_id = run
        .root_run_id
        .clone()
        .unwrap_or_else(|| run.run_id.clone());

    let step_selection = match strategy {
        ReexecutionStrategy::AllSteps => run.step_selection.clone(),
        ReexecutionStrategy::FromFailure => None,
    };

    Ok(ReexecutionRequest::Launch(ExecutionParams {
        parent_run_id: run.run_id.clone(),
        root_run_id: root_run_id.clone(),
        strategy,
        run_config_yaml: config.yaml.clone(),
        mode: config.mode.clone(),
        selector: JobSelector {
            repository_name: repository.repository_name.clone(),
            repository_location_name: repository.location_name.clone(),
            job_name: run.job_name.clone(),
        },
        step_selection,
        tags: lineage_tags(&run.tags, &run.run_id, &root_run_id, strategy),
    }))
}

pub fn build_parent_request(parent_run_id: RunId, strategy: ReexecutionStrategy) -> ReexecutionRequest {
    ReexecutionRequest::FromParent {
        parent_run_id,
        strategy,
    }
}

fn lineage_tags(
    tags: &[RunTag],
    parent: &RunId,
    root: &RunId,
    strategy: ReexecutionStrategy,
) -> Vec<RunTag> {
    let strategy_value = match strategy {
        ReexecutionStrategy::AllSteps => "ALL_STEPS",
        ReexecutionStrategy::FromFailure => "FROM_FAILURE",
    };
    tags.iter()
        .filter(|t| !t.key.starts_with(SYSTEM_TAG_PREFIX))
        .cloned()
        .chain([
            RunTag::new(PARENT_RUN_ID_TAG, parent.as_str()),
            RunTag::new(ROOT_RUN_ID_TAG, root.as_str()),
            RunTag::new(STRATEGY_TAG, strategy_value),
        ])
        .collect()
}
