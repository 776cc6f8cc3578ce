use crate::app::RunId;
use crate::dialog::TerminationPolicy;
use async_trait::async_trait;
use color_eyre::eyre::Result;

/// Everything the watcher needs from the run service. Methods return the raw
/// JSON payloads; decoding lives in `backend::parser`.
#[async_trait]
pub trait RunBackend: Send + Sync {
    async fn check_available(&self) -> Result<()>;
    async fn fetch_runs(&self, limit: usize, job: Option<&str>) -> Result<String>;
    async fn fetch_workspace(&self) -> Result<String>;
    async fn fetch_run_config(&self, run_id: &RunId) -> Result<String>;
    async fn terminate_runs(&self, run_ids: &[RunId], policy: TerminationPolicy)
        -> Result<String>;
    async fn delete_run(&self, run_id: &RunId) -> Result<()>;
    /// `request_json` is a serialized `ReexecutionRequest`.
    async fn reexecute(&self, request_json: &str) -> Result<String>;
    async fn copy_to_clipboard(&self, text: &str) -> Result<()>;
}
