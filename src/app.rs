//! Run data model and application state.

use crate::dialog::{
    completion_summary, ActionKind, ActionSession, Completion, DialogController, SessionScope,
};
use crate::permissions::{Eligibility, RunPermissions};
use crate::reexecute::{build_launch_request, build_parent_request, ReexecutionStrategy};
use crate::selection::{
    any_deletable, any_reexecutable, any_reexecutable_from_failure, any_terminable,
    deletable_subset, reexecutable_from_failure_subset, reexecutable_subset, terminable_subset,
    Selection,
};
use crate::status::is_in_progress;
use crate::workspace::{resolve_repository, RepositoryLocation, RepositoryMatch};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

// ── Shared utility functions ──

/// Format a duration in seconds into a human-readable string (e.g. "2m 5s").
pub fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86_400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86_400, (secs % 86_400) / 3600)
    }
}

/// Unicode-width-aware truncation with ellipsis.
/// Returns `""` when `max_width` is 0.
pub fn truncate(s: &str, max_width: usize) -> String {
    use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};
    if max_width == 0 {
        return String::new();
    }
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut width = 0;
    for c in s.chars() {
        let cw = UnicodeWidthChar::width(c).unwrap_or(0);
        if width + cw + 1 > max_width {
            break;
        }
        result.push(c);
        width += cw;
    }
    result.push('\u{2026}');
    result
}

/// Runs are active while queued or executing; poll fast so terminations show up.
pub const POLL_INTERVAL_ACTIVE: u64 = 3;
pub const NOTIFICATION_TTL_SECS: u64 = 5;
/// Must match the length of `BRAILLE_FRAMES` in `tui::spinner`.
pub const SPINNER_FRAME_COUNT: usize = 10;
/// Below 60 cols the age column and key hints are dropped.
pub const NARROW_WIDTH_THRESHOLD: u16 = 60;
pub const ERROR_TTL_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, the way run ids are usually shown.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Queued,
    NotStarted,
    Managed,
    Starting,
    Started,
    Success,
    Failure,
    Canceling,
    Canceled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOrigin {
    pub repository_name: String,
    pub location_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct RunTag {
    pub key: String,
    pub value: String,
}

impl RunTag {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub run_id: RunId,
    pub job_name: String,
    pub status: RunStatus,
    /// Capability flags are advisory: the backend may still reject the action.
    /// Missing flags deny.
    #[serde(default)]
    pub can_terminate: bool,
    #[serde(default)]
    pub can_delete: bool,
    #[serde(default)]
    pub can_reexecute: bool,
    #[serde(default = "default_true")]
    pub launcher_can_terminate: bool,
    /// `None` for runs not launched from a code location.
    #[serde(default)]
    pub origin: Option<RunOrigin>,
    #[serde(default)]
    pub root_run_id: Option<RunId>,
    #[serde(default)]
    pub step_selection: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Vec<RunTag>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Run {
    /// A run with every capability denied.
    pub fn new(run_id: &str, job_name: &str, status: RunStatus, created_at: DateTime<Utc>) -> Self {
        Self {
            run_id: RunId::from(run_id),
            job_name: job_name.to_string(),
            status,
            can_terminate: false,
            can_delete: false,
            can_reexecute: false,
            launcher_can_terminate: true,
            origin: None,
            root_run_id: None,
            step_selection: None,
            tags: Vec::new(),
            created_at,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    #[serde(rename = "runConfigYaml")]
    pub yaml: String,
    #[serde(default)]
    pub mode: Option<String>,
}

/// Fetch state of a lazily loaded resource. Absence (no entry) means it was
/// never requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource<T> {
    Loading,
    Failed(String),
    Ready(T),
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub timestamp: std::time::Instant,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MenuState {
    #[default]
    Closed,
    Run(RunId),
    Bulk,
}

/// One row of the run or bulk action menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub kind: ActionKind,
    pub key: &'static str,
    pub label: String,
    pub disabled: Option<String>,
}

/// Immutable configuration set at startup.
pub struct AppConfig {
    pub backend: String,
    pub job_filter: Option<String>,
    pub limit: usize,
    pub version_string: String,
}

pub struct AppState {
    pub config: AppConfig,

    pub runs: Vec<Run>,
    pub workspace: Vec<RepositoryLocation>,
    pub run_configs: HashMap<RunId, Resource<RunConfig>>,

    // Navigation and selection
    pub cursor: usize,
    pub selection: Selection,
    /// Run to move the cursor to once it shows up in a poll.
    pub pending_focus: Option<RunId>,

    // Menus and dialogs
    pub menu: MenuState,
    pub dialogs: DialogController,

    // Polling
    pub last_poll: Option<std::time::Instant>,
    pub next_poll_in: u64,
    pub poll_interval: u64,

    // Transient UI
    pub notifications: Vec<Notification>,
    pub error: Option<(String, std::time::Instant)>,
    pub spinner_frame: usize,
    pub loading_count: u16,
    pub should_quit: bool,

    pub desktop_notify: bool,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            runs: Vec::new(),
            workspace: Vec::new(),
            run_configs: HashMap::new(),
            cursor: 0,
            selection: Selection::new(),
            pending_focus: None,
            menu: MenuState::Closed,
            dialogs: DialogController::new(),
            last_poll: None,
            next_poll_in: 0,
            poll_interval: 10,
            notifications: Vec::new(),
            error: None,
            spinner_frame: 0,
            loading_count: 0,
            should_quit: false,
            desktop_notify: true,
        }
    }

    /// Replace the run list. Selection, cached configs and menus that refer
    /// to runs no longer listed are dropped.
    pub fn update_runs(&mut self, runs: Vec<Run>) {
        self.runs = runs;
        self.selection.retain_listed(&self.runs);
        let listed = &self.runs;
        self.run_configs
            .retain(|id, _| listed.iter().any(|r| r.run_id == *id));

        let menu_stale = matches!(&self.menu, MenuState::Run(id) if self.run(id).is_none());
        if menu_stale {
            self.menu = MenuState::Closed;
        }
        let config_stale = matches!(
            self.dialogs.session(),
            ActionSession::Config(view) if self.run(&view.run_id).is_none()
        );
        if config_stale {
            self.dialogs.close();
        }

        if let Some(focus) = self.pending_focus.clone() {
            if let Some(idx) = self.runs.iter().position(|r| r.run_id == focus) {
                self.cursor = idx;
                self.pending_focus = None;
            }
        }
        self.clamp_cursor();
    }

    pub fn update_workspace(&mut self, workspace: Vec<RepositoryLocation>) {
        self.workspace = workspace;
    }

    fn clamp_cursor(&mut self) {
        if self.runs.is_empty() {
            self.cursor = 0;
        } else if self.cursor >= self.runs.len() {
            self.cursor = self.runs.len() - 1;
        }
    }

    pub fn run(&self, id: &RunId) -> Option<&Run> {
        self.runs.iter().find(|r| r.run_id == *id)
    }

    pub fn move_cursor_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_cursor_down(&mut self) {
        if !self.runs.is_empty() && self.cursor < self.runs.len() - 1 {
            self.cursor += 1;
        }
    }

    pub fn current_run(&self) -> Option<&Run> {
        self.runs.get(self.cursor)
    }

    pub fn current_run_id(&self) -> Option<RunId> {
        self.current_run().map(|r| r.run_id.clone())
    }

    pub fn has_active_runs(&self) -> bool {
        self.runs.iter().any(|r| is_in_progress(r.status))
    }

    /// Poll interval for the current data: fast while runs are in flight.
    pub fn desired_poll_interval(&self) -> u64 {
        if self.has_active_runs() {
            POLL_INTERVAL_ACTIVE.min(self.poll_interval)
        } else {
            self.poll_interval
        }
    }

    // --- Selection ---

    pub fn toggle_current_selection(&mut self) {
        if let Some(id) = self.current_run_id() {
            self.selection.toggle(&id);
        }
    }

    pub fn select_all(&mut self) {
        for run in &self.runs {
            self.selection.insert(run.run_id.clone());
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn selected_runs(&self) -> Vec<&Run> {
        self.selection.resolve(&self.runs)
    }

    // --- Repository match and config ---

    pub fn repository_match(&self, run: &Run) -> Option<RepositoryMatch> {
        resolve_repository(run, &self.workspace)
    }

    pub fn run_config(&self, id: &RunId) -> Option<&Resource<RunConfig>> {
        self.run_configs.get(id)
    }

    /// Mark a config fetch as started. Returns `false` when a fetch is in
    /// flight or the config is already loaded, so at most one request per run
    /// is ever outstanding. A failed fetch is retried.
    pub fn begin_config_fetch(&mut self, id: &RunId) -> bool {
        match self.run_configs.get(id) {
            Some(Resource::Loading | Resource::Ready(_)) => false,
            Some(Resource::Failed(_)) | None => {
                self.run_configs.insert(id.clone(), Resource::Loading);
                true
            }
        }
    }

    pub fn finish_config_fetch(&mut self, id: RunId, result: Result<RunConfig, String>) {
        if self.run(&id).is_none() {
            return;
        }
        let resource = match result {
            Ok(config) => Resource::Ready(config),
            Err(e) => {
                tracing::warn!(run_id = %id, error = %e, "run config fetch failed");
                Resource::Failed(e)
            }
        };
        self.run_configs.insert(id, resource);
    }

    pub fn permissions_for(&self, run: &Run) -> RunPermissions {
        let repository = self.repository_match(run);
        RunPermissions::evaluate(run, repository.as_ref(), self.run_config(&run.run_id))
    }

    // --- Menus ---

    /// Open the action menu for the run under the cursor. Returns the run id
    /// when its config still has to be fetched.
    pub fn open_run_menu(&mut self) -> Option<RunId> {
        if !self.dialogs.can_open() {
            return None;
        }
        let id = self.current_run_id()?;
        self.menu = MenuState::Run(id.clone());
        self.begin_config_fetch(&id).then_some(id)
    }

    pub fn open_bulk_menu(&mut self) -> bool {
        if !self.dialogs.can_open() || self.selection.is_empty() {
            return false;
        }
        self.menu = MenuState::Bulk;
        true
    }

    pub fn close_menu(&mut self) {
        self.menu = MenuState::Closed;
    }

    pub fn has_menu(&self) -> bool {
        self.menu != MenuState::Closed
    }

    pub fn run_menu_entries(&self, run: &Run) -> Vec<MenuEntry> {
        let perms = self.permissions_for(run);
        let entry = |kind, key, label: &str, eligibility: Eligibility| MenuEntry {
            kind,
            key,
            label: label.to_string(),
            disabled: eligibility.reason().map(|r| r.message().to_string()),
        };
        vec![
            entry(ActionKind::Terminate, "t", "Terminate", perms.terminate),
            entry(ActionKind::Delete, "d", "Delete", perms.delete),
            entry(ActionKind::Reexecute, "R", "Re-execute", perms.reexecute),
            entry(
                ActionKind::ReexecuteFromFailure,
                "F",
                "Re-execute from failure",
                perms.reexecute_from_failure,
            ),
            entry(ActionKind::Config, "c", "View config", perms.view_config),
        ]
    }

    /// Actions no selected run supports are left out; the rest show how many
    /// of the selected runs they apply to.
    pub fn bulk_menu_entries(&self) -> Vec<MenuEntry> {
        let selected = self.selected_runs();
        let total = selected.len();
        let entry = |kind, key, label: &str, eligible: usize, reason: &str| MenuEntry {
            kind,
            key,
            label: format!("{label} ({eligible} of {total})"),
            disabled: (eligible == 0).then(|| reason.to_string()),
        };

        let mut entries = Vec::new();
        if any_terminable(&selected) {
            entries.push(entry(
                ActionKind::Terminate,
                "t",
                "Terminate",
                terminable_subset(&selected).len(),
                "no selected run can be terminated",
            ));
        }
        if any_deletable(&selected) {
            entries.push(entry(
                ActionKind::Delete,
                "d",
                "Delete",
                deletable_subset(&selected).len(),
                "no selected run can be deleted",
            ));
        }
        if any_reexecutable(&selected) {
            entries.push(entry(
                ActionKind::Reexecute,
                "R",
                "Re-execute",
                reexecutable_subset(&selected).len(),
                "no selected run can be re-executed",
            ));
        }
        if any_reexecutable_from_failure(&selected) {
            entries.push(entry(
                ActionKind::ReexecuteFromFailure,
                "F",
                "Re-execute from failure",
                reexecutable_from_failure_subset(&selected).len(),
                "no selected run failed",
            ));
        }
        entries
    }

    /// Activate a menu item. Disabled items are a no-op; on success the menu
    /// closes and the matching dialog opens.
    pub fn activate(&mut self, kind: ActionKind) -> bool {
        let opened = match self.menu.clone() {
            MenuState::Closed => false,
            MenuState::Run(id) => self.activate_single(&id, kind),
            MenuState::Bulk => self.activate_bulk(kind),
        };
        if opened {
            self.menu = MenuState::Closed;
        }
        opened
    }

    fn activate_single(&mut self, id: &RunId, kind: ActionKind) -> bool {
        let Some(run) = self.run(id) else {
            return false;
        };
        let perms = self.permissions_for(run);
        let scope = SessionScope::Single(id.clone());
        match kind {
            ActionKind::Terminate if perms.terminate.is_allowed() => {
                let targets = terminable_subset(&[run]);
                self.dialogs.open_terminate(scope, targets)
            }
            ActionKind::Delete if perms.delete.is_allowed() => {
                let targets = deletable_subset(&[run]);
                self.dialogs.open_delete(scope, targets)
            }
            ActionKind::Reexecute | ActionKind::ReexecuteFromFailure => {
                let strategy = if kind == ActionKind::Reexecute {
                    ReexecutionStrategy::AllSteps
                } else {
                    ReexecutionStrategy::FromFailure
                };
                let repository = self.repository_match(run);
                match build_launch_request(
                    run,
                    self.run_config(id),
                    repository.as_ref(),
                    strategy,
                ) {
                    Ok(request) => self.dialogs.open_reexecute(scope, strategy, vec![request]),
                    Err(reason) => {
                        tracing::debug!(run_id = %id, ?reason, "re-execution unavailable");
                        false
                    }
                }
            }
            ActionKind::Config if perms.view_config.is_allowed() => {
                self.dialogs.open_config(id.clone())
            }
            _ => false,
        }
    }

    fn activate_bulk(&mut self, kind: ActionKind) -> bool {
        let selected = self.selection.resolve(&self.runs);
        match kind {
            ActionKind::Terminate => {
                let targets = terminable_subset(&selected);
                self.dialogs.open_terminate(SessionScope::Bulk, targets)
            }
            ActionKind::Delete => {
                let targets = deletable_subset(&selected);
                self.dialogs.open_delete(SessionScope::Bulk, targets)
            }
            ActionKind::Reexecute | ActionKind::ReexecuteFromFailure => {
                let (strategy, subset) = if kind == ActionKind::Reexecute {
                    (ReexecutionStrategy::AllSteps, reexecutable_subset(&selected))
                } else {
                    (
                        ReexecutionStrategy::FromFailure,
                        reexecutable_from_failure_subset(&selected),
                    )
                };
                let requests = subset
                    .ids
                    .into_iter()
                    .map(|id| build_parent_request(id, strategy))
                    .collect();
                self.dialogs
                    .open_reexecute(SessionScope::Bulk, strategy, requests)
            }
            ActionKind::Config => false,
        }
    }

    /// Apply the controller's verdict on a finished operation. Returns whether
    /// the run list should be refreshed.
    pub fn apply_completion(&mut self, completion: &Completion) -> bool {
        if let Completion::Finished {
            kind,
            report,
            clear_selection,
            focus_run,
        } = completion
        {
            if *clear_selection {
                self.selection.clear();
            }
            if let Some(id) = focus_run {
                self.pending_focus = Some(id.clone());
            }
            self.add_notification(completion_summary(*kind, report));
        }
        completion.needs_refresh()
    }

    // --- Transient UI ---

    pub fn prune_notifications(&mut self) {
        let now = std::time::Instant::now();
        self.notifications
            .retain(|n| now.duration_since(n.timestamp).as_secs() < NOTIFICATION_TTL_SECS);
    }

    pub fn add_notification(&mut self, message: String) {
        self.notifications.push(Notification {
            message,
            timestamp: std::time::Instant::now(),
        });
    }

    pub fn is_loading(&self) -> bool {
        self.loading_count > 0
    }

    pub fn begin_loading(&mut self) {
        self.loading_count = self.loading_count.saturating_add(1);
    }

    pub fn end_loading(&mut self) {
        self.loading_count = self.loading_count.saturating_sub(1);
    }

    pub fn advance_spinner(&mut self) {
        self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAME_COUNT;
    }

    pub fn set_error(&mut self, msg: String) {
        self.error = Some((msg, std::time::Instant::now()));
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn prune_error(&mut self) {
        if let Some((_, ts)) = &self.error {
            if ts.elapsed().as_secs() >= ERROR_TTL_SECS {
                self.error = None;
            }
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|(msg, _)| msg.as_str())
    }

    /// Text of the config being viewed, for copying.
    pub fn viewed_config_text(&self) -> Option<&str> {
        let ActionSession::Config(view) = self.dialogs.session() else {
            return None;
        };
        match self.run_config(&view.run_id)? {
            Resource::Ready(config) => Some(config.yaml.as_str()),
            Resource::Loading | Resource::Failed(_) => None,
        }
    }
}
