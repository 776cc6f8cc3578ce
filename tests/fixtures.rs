#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use color_eyre::eyre::{eyre, Result};
use runw::app::{AppConfig, AppState, Run, RunConfig, RunId, RunOrigin, RunStatus};
use runw::dialog::TerminationPolicy;
use runw::traits::RunBackend;
use runw::workspace::{Repository, RepositoryLocation};
use std::sync::Mutex;

pub const CONFIG_YAML: &str = "ops:\n  load:\n    config:\n      batch_size: 500\n";

/// A run in `warehouse@etl` with every capability granted.
pub fn run_with(id: &str, status: RunStatus) -> Run {
    Run {
        can_terminate: true,
        can_delete: true,
        can_reexecute: true,
        origin: Some(RunOrigin {
            repository_name: "warehouse".to_string(),
            location_name: "etl".to_string(),
        }),
        ..Run::new(id, "nightly_etl", status, Utc::now())
    }
}

pub fn run_started(id: &str) -> Run {
    run_with(id, RunStatus::Started)
}

pub fn run_failed(id: &str) -> Run {
    run_with(id, RunStatus::Failure)
}

pub fn run_succeeded(id: &str) -> Run {
    run_with(id, RunStatus::Success)
}

pub fn default_workspace() -> Vec<RepositoryLocation> {
    vec![RepositoryLocation {
        name: "etl".to_string(),
        repositories: vec![Repository {
            name: "warehouse".to_string(),
            jobs: vec!["nightly_etl".to_string()],
        }],
        load_error: None,
    }]
}

pub fn default_config() -> RunConfig {
    RunConfig {
        yaml: CONFIG_YAML.to_string(),
        mode: Some("default".to_string()),
    }
}

pub fn make_state_with_runs(runs: Vec<Run>) -> AppState {
    let mut state = AppState::new(AppConfig {
        backend: "runctl".to_string(),
        job_filter: None,
        limit: 50,
        version_string: "runw v0.0.0+0".to_string(),
    });
    state.update_workspace(default_workspace());
    state.update_runs(runs);
    state.last_poll = Some(std::time::Instant::now());
    state
}

pub fn id(s: &str) -> RunId {
    RunId::from(s)
}

/// In-memory backend that records every call.
#[derive(Default)]
pub struct FakeBackend {
    pub runs_json: String,
    pub workspace_json: String,
    pub config_json: Option<String>,
    pub failing_deletes: Vec<String>,
    pub launched_run_id: Option<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            runs_json: "[]".to_string(),
            workspace_json: r#"{"locationEntries": []}"#.to_string(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RunBackend for FakeBackend {
    async fn check_available(&self) -> Result<()> {
        Ok(())
    }

    async fn fetch_runs(&self, limit: usize, job: Option<&str>) -> Result<String> {
        self.record(format!("list {limit} {job:?}"));
        Ok(self.runs_json.clone())
    }

    async fn fetch_workspace(&self) -> Result<String> {
        self.record("workspace".to_string());
        Ok(self.workspace_json.clone())
    }

    async fn fetch_run_config(&self, run_id: &RunId) -> Result<String> {
        self.record(format!("config {run_id}"));
        self.config_json
            .clone()
            .ok_or_else(|| eyre!("runctl command failed: config not found"))
    }

    async fn terminate_runs(&self, run_ids: &[RunId], policy: TerminationPolicy) -> Result<String> {
        let ids: Vec<&str> = run_ids.iter().map(RunId::as_str).collect();
        self.record(format!("terminate {policy:?} {}", ids.join(",")));
        let entries: Vec<String> = ids
            .iter()
            .map(|id| format!(r#"{{"runId": "{id}", "ok": true}}"#))
            .collect();
        Ok(format!("[{}]", entries.join(",")))
    }

    async fn delete_run(&self, run_id: &RunId) -> Result<()> {
        self.record(format!("delete {run_id}"));
        if self.failing_deletes.iter().any(|f| f == run_id.as_str()) {
            Err(eyre!("run is still referenced by a backfill"))
        } else {
            Ok(())
        }
    }

    async fn reexecute(&self, request_json: &str) -> Result<String> {
        self.record(format!("reexecute {request_json}"));
        match &self.launched_run_id {
            Some(new_id) => Ok(format!(r#"{{"ok": true, "runId": "{new_id}"}}"#)),
            None => Ok(r#"{"ok": false, "message": "launch rejected"}"#.to_string()),
        }
    }

    async fn copy_to_clipboard(&self, text: &str) -> Result<()> {
        self.record(format!("copy {} bytes", text.len()));
        Ok(())
    }
}
