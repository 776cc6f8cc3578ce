use crate::app::{Run, RunConfig, RunId};
use crate::dialog::RunOutcome;
use crate::workspace::RepositoryLocation;
use color_eyre::eyre::{eyre, Result};
use serde::Deserialize;

const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10 MB

fn check_response_size(json: &str) -> Result<()> {
    if json.len() > MAX_RESPONSE_SIZE {
        return Err(eyre!(
            "Response too large ({:.1} MB, max {} MB)",
            json.len() as f64 / (1024.0 * 1024.0),
            MAX_RESPONSE_SIZE / (1024 * 1024)
        ));
    }
    Ok(())
}

pub fn parse_runs(json: &str) -> Result<Vec<Run>> {
    check_response_size(json)?;
    let runs: Vec<Run> = serde_json::from_str(json)?;
    Ok(runs)
}

#[derive(Deserialize)]
struct WorkspaceResponse {
    #[serde(rename = "locationEntries")]
    locations: Vec<RepositoryLocation>,
}

pub fn parse_workspace(json: &str) -> Result<Vec<RepositoryLocation>> {
    check_response_size(json)?;
    let resp: WorkspaceResponse = serde_json::from_str(json)?;
    Ok(resp.locations)
}

pub fn parse_run_config(json: &str) -> Result<RunConfig> {
    check_response_size(json)?;
    let config: RunConfig = serde_json::from_str(json)?;
    Ok(config)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TerminateEntry {
    run_id: RunId,
    ok: bool,
    #[serde(default)]
    message: Option<String>,
}

/// Per-run outcomes of a terminate call, in response order.
pub fn parse_terminate_results(json: &str) -> Result<Vec<RunOutcome>> {
    check_response_size(json)?;
    let entries: Vec<TerminateEntry> = serde_json::from_str(json)?;
    Ok(entries
        .into_iter()
        .map(|e| {
            if e.ok {
                RunOutcome::succeeded(e.run_id)
            } else {
                let message = e
                    .message
                    .unwrap_or_else(|| "termination rejected".to_string());
                RunOutcome::failed(e.run_id, message)
            }
        })
        .collect())
}

/// Domain answer to a re-execution request. A rejected launch is not a
/// transport error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReexecuteResponse {
    Launched(RunId),
    Rejected(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReexecuteEntry {
    ok: bool,
    #[serde(default)]
    run_id: Option<RunId>,
    #[serde(default)]
    message: Option<String>,
}

pub fn parse_reexecute_result(json: &str) -> Result<ReexecuteResponse> {
    check_response_size(json)?;
    let entry: ReexecuteEntry = serde_json::from_str(json)?;
    match (entry.ok, entry.run_id) {
        (true, Some(run_id)) => Ok(ReexecuteResponse::Launched(run_id)),
        (true, None) => Err(eyre!("launch reported success without a run id")),
        (false, _) => Ok(ReexecuteResponse::Rejected(
            entry
                .message
                .unwrap_or_else(|| "launch rejected".to_string()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::RunStatus;
    use crate::dialog::OutcomeStatus;
    use pretty_assertions::assert_eq;

    const RUNS_JSON: &str = r#"[
        {
            "runId": "8f1c2a90-77aa-4c1e-9b0e-3d2f8a6b5c41",
            "jobName": "nightly_etl",
            "status": "FAILURE",
            "canTerminate": true,
            "canDelete": true,
            "canReexecute": true,
            "launcherCanTerminate": false,
            "origin": { "repositoryName": "warehouse", "locationName": "etl" },
            "rootRunId": "11111111-0000-0000-0000-000000000000",
            "stepSelection": ["extract", "load"],
            "tags": [{ "key": "team", "value": "data" }],
            "createdAt": "2026-03-02T10:00:00Z",
            "updatedAt": "2026-03-02T10:05:00Z"
        }
    ]"#;

    #[test]
    fn parse_full_run() {
        let runs = parse_runs(RUNS_JSON).unwrap();
        assert_eq!(runs.len(), 1);
        let run = &runs[0];
        assert_eq!(run.run_id.as_str(), "8f1c2a90-77aa-4c1e-9b0e-3d2f8a6b5c41");
        assert_eq!(run.job_name, "nightly_etl");
        assert_eq!(run.status, RunStatus::Failure);
        assert!(run.can_terminate && run.can_delete && run.can_reexecute);
        assert!(!run.launcher_can_terminate);
        let origin = run.origin.as_ref().unwrap();
        assert_eq!(origin.repository_name, "warehouse");
        assert_eq!(origin.location_name, "etl");
        assert_eq!(
            run.root_run_id.as_ref().map(RunId::as_str),
            Some("11111111-0000-0000-0000-000000000000")
        );
        assert_eq!(
            run.step_selection,
            Some(vec!["extract".to_string(), "load".to_string()])
        );
        assert_eq!(run.tags.len(), 1);
        assert!(run.updated_at.is_some());
    }

    #[test]
    fn missing_capabilities_deny() {
        let json = r#"[{
            "runId": "r1", "jobName": "j", "status": "STARTED",
            "createdAt": "2026-03-02T10:00:00Z"
        }]"#;
        let run = &parse_runs(json).unwrap()[0];
        assert!(!run.can_terminate);
        assert!(!run.can_delete);
        assert!(!run.can_reexecute);
        assert!(run.launcher_can_terminate);
        assert!(run.origin.is_none());
        assert!(run.tags.is_empty());
    }

    #[test]
    fn unrecognized_status_is_unknown() {
        let json = r#"[{
            "runId": "r1", "jobName": "j", "status": "PAUSED",
            "createdAt": "2026-03-02T10:00:00Z"
        }]"#;
        assert_eq!(parse_runs(json).unwrap()[0].status, RunStatus::Unknown);
    }

    #[test]
    fn parse_runs_rejects_garbage() {
        assert!(parse_runs("not json").is_err());
        assert!(parse_runs(r#"{"runs": []}"#).is_err());
    }

    #[test]
    fn parse_empty_runs() {
        assert!(parse_runs("[]").unwrap().is_empty());
    }

    #[test]
    fn parse_workspace_locations() {
        let json = r#"{
            "locationEntries": [
                {
                    "name": "etl",
                    "repositories": [{ "name": "warehouse", "jobs": ["nightly_etl"] }]
                },
                { "name": "ml", "loadError": "ImportError: no module named torch" }
            ]
        }"#;
        let locations = parse_workspace(json).unwrap();
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].repositories[0].jobs, vec!["nightly_etl"]);
        assert!(locations[1].repositories.is_empty());
        assert_eq!(
            locations[1].load_error.as_deref(),
            Some("ImportError: no module named torch")
        );
    }

    #[test]
    fn parse_config_keeps_text_verbatim() {
        let json = r#"{ "runConfigYaml": "ops:\n  load:\n    config: {batch: 5}\n", "mode": "prod" }"#;
        let config = parse_run_config(json).unwrap();
        assert_eq!(config.yaml, "ops:\n  load:\n    config: {batch: 5}\n");
        assert_eq!(config.mode.as_deref(), Some("prod"));
    }

    #[test]
    fn parse_config_without_mode() {
        let config = parse_run_config(r#"{ "runConfigYaml": "" }"#).unwrap();
        assert_eq!(config.yaml, "");
        assert_eq!(config.mode, None);
    }

    #[test]
    fn parse_terminate_mixed() {
        let json = r#"[
            { "runId": "a", "ok": true },
            { "runId": "b", "ok": false, "message": "run already finished" },
            { "runId": "c", "ok": false }
        ]"#;
        let outcomes = parse_terminate_results(json).unwrap();
        assert_eq!(
            outcomes,
            vec![
                RunOutcome::succeeded(RunId::from("a")),
                RunOutcome::failed(RunId::from("b"), "run already finished"),
                RunOutcome::failed(RunId::from("c"), "termination rejected"),
            ]
        );
        assert!(matches!(outcomes[1].status, OutcomeStatus::Failed(_)));
    }

    #[test]
    fn parse_reexecute_launched() {
        let result = parse_reexecute_result(r#"{ "ok": true, "runId": "new-1" }"#).unwrap();
        assert_eq!(result, ReexecuteResponse::Launched(RunId::from("new-1")));
    }

    #[test]
    fn parse_reexecute_rejected() {
        let result =
            parse_reexecute_result(r#"{ "ok": false, "message": "invalid config" }"#).unwrap();
        assert_eq!(result, ReexecuteResponse::Rejected("invalid config".to_string()));
    }

    #[test]
    fn parse_reexecute_success_without_id_is_error() {
        assert!(parse_reexecute_result(r#"{ "ok": true }"#).is_err());
    }

    #[test]
    fn oversized_action_responses_rejected() {
        let huge = format!("[{}]", " ".repeat(MAX_RESPONSE_SIZE));
        let err = parse_terminate_results(&huge).unwrap_err();
        assert!(err.to_string().contains("too large"), "{err}");
        let err = parse_reexecute_result(&huge).unwrap_err();
        assert!(err.to_string().contains("too large"), "{err}");
    }
}
