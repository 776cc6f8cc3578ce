use crate::app::RunId;
use crate::dialog::TerminationPolicy;
use crate::traits::RunBackend;
use async_trait::async_trait;
use color_eyre::eyre::{eyre, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const CLI_TIMEOUT: Duration = Duration::from_secs(30);
const CLIPBOARD_TIMEOUT: Duration = Duration::from_secs(10);

/// Backend that shells out to the run service's command-line client.
pub struct CommandBackend {
    pub program: String,
}

impl CommandBackend {
    pub fn new(program: String) -> Self {
        Self { program }
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        run_cli(&self.program, args, None).await
    }
}

#[async_trait]
impl RunBackend for CommandBackend {
    async fn check_available(&self) -> Result<()> {
        self.run(&["--version"]).await.map(|_| ())
    }

    async fn fetch_runs(&self, limit: usize, job: Option<&str>) -> Result<String> {
        let limit_str = limit.to_string();
        let mut args = vec!["runs", "list", "--limit", &limit_str];
        if let Some(j) = job {
            args.push("--job");
            args.push(j);
        }
        args.push("--json");
        self.run(&args).await
    }

    async fn fetch_workspace(&self) -> Result<String> {
        self.run(&["workspace", "--json"]).await
    }

    async fn fetch_run_config(&self, run_id: &RunId) -> Result<String> {
        self.run(&["runs", "config", run_id.as_str(), "--json"])
            .await
    }

    async fn terminate_runs(
        &self,
        run_ids: &[RunId],
        policy: TerminationPolicy,
    ) -> Result<String> {
        let mut args = vec!["runs", "terminate"];
        if policy == TerminationPolicy::MarkAsCanceledImmediately {
            args.push("--force");
        }
        args.extend(run_ids.iter().map(RunId::as_str));
        args.push("--json");
        self.run(&args).await
    }

    async fn delete_run(&self, run_id: &RunId) -> Result<()> {
        self.run(&["runs", "delete", run_id.as_str()]).await?;
        Ok(())
    }

    async fn reexecute(&self, request_json: &str) -> Result<String> {
        run_cli(
            &self.program,
            &["runs", "reexecute", "--json", "-"],
            Some(request_json),
        )
        .await
    }

    async fn copy_to_clipboard(&self, text: &str) -> Result<()> {
        copy_to_clipboard_impl(text).await
    }
}

async fn run_cli(program: &str, args: &[&str], stdin: Option<&str>) -> Result<String> {
    let start = std::time::Instant::now();
    let mut child = Command::new(program)
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                eyre!("{program} not found. Install it or point --cli at the run client.")
            } else {
                eyre!("Failed to run {program}: {e}")
            }
        })?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input.as_bytes())
            .await
            .map_err(|e| eyre!("Failed to write request to {program}: {e}"))?;
        drop(pipe);
    }

    let output = tokio::time::timeout(CLI_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| eyre!("{program} timed out after {}s", CLI_TIMEOUT.as_secs()))?
        .map_err(|e| eyre!("Failed to run {program}: {e}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!(args = ?args, status = ?output.status, "{program} failed");
        return Err(eyre!("{}", classify_cli_error(program, &stderr)));
    }

    tracing::debug!(
        args = ?args,
        elapsed_ms = start.elapsed().as_millis(),
        "{program} command completed"
    );
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

async fn copy_to_clipboard_impl(text: &str) -> Result<()> {
    let candidates: &[(&str, &[&str])] = if cfg!(target_os = "macos") {
        &[("pbcopy", &[])]
    } else if cfg!(target_os = "windows") {
        &[("clip.exe", &[])]
    } else {
        &[
            ("clip.exe", &[]),
            ("wl-copy", &[]),
            ("xclip", &["-selection", "clipboard"]),
        ]
    };

    for (cmd, args) in candidates {
        let child = Command::new(cmd)
            .args(*args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        if let Ok(mut child) = child {
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(text.as_bytes())
                    .await
                    .map_err(|e| eyre!("Failed to write to clipboard: {e}"))?;
                drop(stdin);
            }
            let status = tokio::time::timeout(CLIPBOARD_TIMEOUT, child.wait())
                .await
                .map_err(|_| {
                    eyre!(
                        "clipboard command timed out after {}s",
                        CLIPBOARD_TIMEOUT.as_secs()
                    )
                })??;
            if status.success() {
                return Ok(());
            }
        }
    }

    Err(eyre!(
        "No clipboard tool found. Install xclip, wl-copy, or use WSL with clip.exe"
    ))
}

/// Turn the client's stderr into a message fit for the error toast.
pub fn classify_cli_error(program: &str, stderr: &str) -> String {
    let lower = stderr.to_lowercase();
    if lower.contains("not logged in") || lower.contains("unauthorized") {
        format!("Not authenticated with {program}. Log in and try again.")
    } else if lower.contains("permission denied") || lower.contains("forbidden") {
        "Permission denied by the run service".to_string()
    } else if lower.contains("connection refused") || lower.contains("could not connect") {
        format!("{program} could not reach the run service")
    } else {
        let trimmed = stderr.trim();
        if trimmed.is_empty() {
            format!("{program} command failed")
        } else {
            format!("{program} command failed: {trimmed}")
        }
    }
}
