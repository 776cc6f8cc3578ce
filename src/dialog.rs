//! Action dialog controller.
//!
//! One [`ActionSession`] value per controller: opening a dialog is only
//! possible from [`ActionSession::None`], so two confirmations can never be
//! open (or in flight) at once. Every session gets a fresh [`SessionToken`];
//! results carrying an old token are applied as [`Completion::Detached`] and
//! never move the controller.

use crate::app::RunId;
use crate::reexecute::{ReexecutionRequest, ReexecutionStrategy};
use crate::selection::ActionSubset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminationPolicy {
    /// Ask the launcher to stop the run; skipped for runs whose launcher
    /// cannot terminate.
    #[default]
    SafeTerminate,
    /// Mark the run canceled immediately without waiting for the process.
    MarkAsCanceledImmediately,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Terminate,
    Delete,
    Reexecute,
    ReexecuteFromFailure,
    Config,
}

impl ActionKind {
    pub fn title(self) -> &'static str {
        match self {
            ActionKind::Terminate => "Terminate",
            ActionKind::Delete => "Delete",
            ActionKind::Reexecute => "Re-execute",
            ActionKind::ReexecuteFromFailure => "Re-execute from failure",
            ActionKind::Config => "Run config",
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            ActionKind::Terminate => "terminated",
            ActionKind::Delete => "deleted",
            ActionKind::Reexecute | ActionKind::ReexecuteFromFailure => "re-executed",
            ActionKind::Config => "viewed",
        }
    }
}

/// A single run from its own menu, or the bulk selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionScope {
    Single(RunId),
    Bulk,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// `new_run_id` is set for re-executions.
    Succeeded { new_run_id: Option<RunId> },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub status: OutcomeStatus,
}

impl RunOutcome {
    pub fn succeeded(run_id: RunId) -> Self {
        Self {
            run_id,
            status: OutcomeStatus::Succeeded { new_run_id: None },
        }
    }

    pub fn launched(parent: RunId, new_run_id: RunId) -> Self {
        Self {
            run_id: parent,
            status: OutcomeStatus::Succeeded {
                new_run_id: Some(new_run_id),
            },
        }
    }

    pub fn failed(run_id: RunId, message: impl Into<String>) -> Self {
        Self {
            run_id,
            status: OutcomeStatus::Failed(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded { .. })
    }
}

/// Per-run results of one dispatched operation. Runs are independent: a
/// failure for one run never undoes another run's success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionReport {
    pub outcomes: Vec<RunOutcome>,
}

impl ActionReport {
    pub fn new(outcomes: Vec<RunOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn all_succeeded(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(RunOutcome::is_success)
    }

    pub fn any_succeeded(&self) -> bool {
        self.outcomes.iter().any(RunOutcome::is_success)
    }

    pub fn succeeded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed_ids(&self) -> Vec<RunId> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.run_id.clone())
            .collect()
    }

    pub fn launched_runs(&self) -> Vec<RunId> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.status {
                OutcomeStatus::Succeeded { new_run_id } => new_run_id.clone(),
                OutcomeStatus::Failed(_) => None,
            })
            .collect()
    }

    /// Fold the results of a retry into the report it retried: outcomes for
    /// retried runs are replaced, earlier successes are kept.
    pub fn merge_retry(mut self, retry: ActionReport) -> ActionReport {
        for outcome in retry.outcomes {
            if let Some(slot) = self
                .outcomes
                .iter_mut()
                .find(|o| o.run_id == outcome.run_id)
            {
                *slot = outcome;
            } else {
                self.outcomes.push(outcome);
            }
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogPhase {
    Confirming,
    Pending,
    Failed(ActionReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminateDialog {
    pub scope: SessionScope,
    /// Value: whether the launcher can stop the run cleanly.
    pub targets: ActionSubset<bool>,
    pub policy: TerminationPolicy,
    pub phase: DialogPhase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteDialog {
    pub scope: SessionScope,
    pub targets: ActionSubset<bool>,
    pub phase: DialogPhase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReexecuteDialog {
    pub scope: SessionScope,
    pub strategy: ReexecutionStrategy,
    pub requests: Vec<ReexecutionRequest>,
    pub phase: DialogPhase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigView {
    pub run_id: RunId,
    pub scroll: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActionSession {
    #[default]
    None,
    Terminate(TerminateDialog),
    Delete(DeleteDialog),
    Reexecute(ReexecuteDialog),
    ReexecuteFromFailure(ReexecuteDialog),
    Config(ConfigView),
}

impl ActionSession {
    pub fn kind(&self) -> Option<ActionKind> {
        match self {
            ActionSession::None => None,
            ActionSession::Terminate(_) => Some(ActionKind::Terminate),
            ActionSession::Delete(_) => Some(ActionKind::Delete),
            ActionSession::Reexecute(_) => Some(ActionKind::Reexecute),
            ActionSession::ReexecuteFromFailure(_) => Some(ActionKind::ReexecuteFromFailure),
            ActionSession::Config(_) => Some(ActionKind::Config),
        }
    }

    pub fn phase(&self) -> Option<&DialogPhase> {
        match self {
            ActionSession::Terminate(d) => Some(&d.phase),
            ActionSession::Delete(d) => Some(&d.phase),
            ActionSession::Reexecute(d) | ActionSession::ReexecuteFromFailure(d) => Some(&d.phase),
            ActionSession::None | ActionSession::Config(_) => None,
        }
    }

    fn phase_mut(&mut self) -> Option<&mut DialogPhase> {
        match self {
            ActionSession::Terminate(d) => Some(&mut d.phase),
            ActionSession::Delete(d) => Some(&mut d.phase),
            ActionSession::Reexecute(d) | ActionSession::ReexecuteFromFailure(d) => {
                Some(&mut d.phase)
            }
            ActionSession::None | ActionSession::Config(_) => None,
        }
    }

    pub fn scope(&self) -> Option<&SessionScope> {
        match self {
            ActionSession::Terminate(d) => Some(&d.scope),
            ActionSession::Delete(d) => Some(&d.scope),
            ActionSession::Reexecute(d) | ActionSession::ReexecuteFromFailure(d) => Some(&d.scope),
            ActionSession::None | ActionSession::Config(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionToken(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationRequest {
    Terminate {
        run_ids: Vec<RunId>,
        policy: TerminationPolicy,
        /// Targets left out under the safe policy; reported as failures.
        skipped: Vec<RunId>,
    },
    Delete {
        run_ids: Vec<RunId>,
    },
    Reexecute {
        requests: Vec<ReexecutionRequest>,
    },
}

/// The one network operation a confirmed session issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    pub token: SessionToken,
    pub request: OperationRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Every run succeeded; the controller is back to `None`.
    Finished {
        kind: ActionKind,
        report: ActionReport,
        clear_selection: bool,
        focus_run: Option<RunId>,
    },
    /// At least one run failed; the dialog stays open showing the report.
    Failed { refresh: bool },
    /// The session that issued the operation is gone.
    Detached { refresh: bool },
}

impl Completion {
    pub fn needs_refresh(&self) -> bool {
        match self {
            Completion::Finished { .. } => true,
            Completion::Failed { refresh } | Completion::Detached { refresh } => *refresh,
        }
    }
}

#[derive(Debug, Default)]
pub struct DialogController {
    session: ActionSession,
    token: Option<SessionToken>,
    /// Token of the dispatched operation that has not reported back yet.
    /// Survives `close`, so a dismissed dialog still blocks a second request.
    in_flight: Option<SessionToken>,
    next_token: u64,
    /// Report of the attempt being retried, merged into the retry's result.
    carried: Option<ActionReport>,
}

impl DialogController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> &ActionSession {
        &self.session
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.session, ActionSession::None)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.session.phase(), Some(DialogPhase::Pending))
    }

    /// An operation is still running, even if its dialog was closed.
    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether a new session (or a menu leading to one) may be opened.
    pub fn can_open(&self) -> bool {
        self.is_idle() && self.in_flight.is_none()
    }

    fn open(&mut self, session: ActionSession) -> bool {
        if !self.can_open() {
            tracing::debug!(
                current = ?self.session.kind(),
                requested = ?session.kind(),
                in_flight = ?self.in_flight,
                "dialog busy, ignoring activation"
            );
            return false;
        }
        self.next_token += 1;
        self.token = Some(SessionToken(self.next_token));
        self.carried = None;
        tracing::info!(kind = ?session.kind(), "dialog opened");
        self.session = session;
        true
    }

    pub fn open_terminate(&mut self, scope: SessionScope, targets: ActionSubset<bool>) -> bool {
        if targets.is_empty() {
            return false;
        }
        self.open(ActionSession::Terminate(TerminateDialog {
            scope,
            targets,
            policy: TerminationPolicy::default(),
            phase: DialogPhase::Confirming,
        }))
    }

    pub fn open_delete(&mut self, scope: SessionScope, targets: ActionSubset<bool>) -> bool {
        if targets.is_empty() {
            return false;
        }
        self.open(ActionSession::Delete(DeleteDialog {
            scope,
            targets,
            phase: DialogPhase::Confirming,
        }))
    }

    pub fn open_reexecute(
        &mut self,
        scope: SessionScope,
        strategy: ReexecutionStrategy,
        requests: Vec<ReexecutionRequest>,
    ) -> bool {
        if requests.is_empty() || requests.iter().any(|r| r.strategy() != strategy) {
            return false;
        }
        let dialog = ReexecuteDialog {
            scope,
            strategy,
            requests,
            phase: DialogPhase::Confirming,
        };
        self.open(match strategy {
            ReexecutionStrategy::AllSteps => ActionSession::Reexecute(dialog),
            ReexecutionStrategy::FromFailure => ActionSession::ReexecuteFromFailure(dialog),
        })
    }

    pub fn open_config(&mut self, run_id: RunId) -> bool {
        self.open(ActionSession::Config(ConfigView { run_id, scroll: 0 }))
    }

    /// Any state to `None`. A pending operation still completes; its result
    /// arrives as [`Completion::Detached`]. Until then no new session opens.
    pub fn close(&mut self) {
        if let Some(kind) = self.session.kind() {
            tracing::info!(?kind, pending = self.is_pending(), "dialog closed");
        }
        self.session = ActionSession::None;
        self.token = None;
        self.carried = None;
    }

    /// Only while confirming. Returns the new policy.
    pub fn toggle_force(&mut self) -> Option<TerminationPolicy> {
        let ActionSession::Terminate(dialog) = &mut self.session else {
            return None;
        };
        if dialog.phase == DialogPhase::Pending {
            return None;
        }
        dialog.policy = match dialog.policy {
            TerminationPolicy::SafeTerminate => TerminationPolicy::MarkAsCanceledImmediately,
            TerminationPolicy::MarkAsCanceledImmediately => TerminationPolicy::SafeTerminate,
        };
        Some(dialog.policy)
    }

    /// Confirm (or retry after a failure). Moves the session to `Pending` and
    /// returns the single operation to dispatch. `None` when nothing may be
    /// issued: idle, read-only config view, or already pending.
    pub fn confirm(&mut self) -> Option<PendingOperation> {
        let token = self.token?;
        if self.in_flight.is_some() {
            return None;
        }
        let previous = match self.session.phase()? {
            DialogPhase::Pending => return None,
            DialogPhase::Confirming => None,
            DialogPhase::Failed(report) => Some(report.clone()),
        };

        if let Some(report) = &previous {
            let failed = report.failed_ids();
            if !failed.is_empty() {
                self.restrict_to_failed(&failed);
            }
        }

        let request = match &self.session {
            ActionSession::Terminate(d) => terminate_request(&d.targets, d.policy),
            ActionSession::Delete(d) => OperationRequest::Delete {
                run_ids: d.targets.ids.clone(),
            },
            ActionSession::Reexecute(d) | ActionSession::ReexecuteFromFailure(d) => {
                OperationRequest::Reexecute {
                    requests: d.requests.clone(),
                }
            }
            ActionSession::None | ActionSession::Config(_) => return None,
        };

        self.carried = previous;
        self.in_flight = Some(token);
        if let Some(phase) = self.session.phase_mut() {
            *phase = DialogPhase::Pending;
        }
        tracing::info!(kind = ?self.session.kind(), retry = self.carried.is_some(), "dispatching action");
        Some(PendingOperation { token, request })
    }

    fn restrict_to_failed(&mut self, failed: &[RunId]) {
        match &mut self.session {
            ActionSession::Terminate(d) => d.targets = d.targets.restrict_to(failed),
            ActionSession::Delete(d) => d.targets = d.targets.restrict_to(failed),
            ActionSession::Reexecute(d) | ActionSession::ReexecuteFromFailure(d) => {
                d.requests.retain(|r| failed.contains(r.parent_run_id()));
            }
            ActionSession::None | ActionSession::Config(_) => {}
        }
    }

    /// Apply the result of a dispatched operation.
    pub fn resolve(&mut self, token: SessionToken, report: ActionReport) -> Completion {
        if self.in_flight == Some(token) {
            self.in_flight = None;
        }
        let current = self.token == Some(token) && self.is_pending();
        if !current {
            tracing::warn!(?token, "result for a closed dialog, not transitioning");
            return Completion::Detached {
                refresh: report.any_succeeded(),
            };
        }

        let report = match self.carried.take() {
            Some(previous) => previous.merge_retry(report),
            None => report,
        };

        if report.all_succeeded() {
            let kind = self.session.kind().unwrap_or(ActionKind::Config);
            let bulk = self.session.scope() == Some(&SessionScope::Bulk);
            let focus_run = match (&self.session, bulk) {
                (ActionSession::Reexecute(_) | ActionSession::ReexecuteFromFailure(_), false) => {
                    report.launched_runs().into_iter().next()
                }
                _ => None,
            };
            tracing::info!(?kind, runs = report.outcomes.len(), "action completed");
            self.close();
            return Completion::Finished {
                kind,
                report,
                clear_selection: bulk,
                focus_run,
            };
        }

        let refresh = report.any_succeeded();
        tracing::warn!(
            kind = ?self.session.kind(),
            failed = report.failed_ids().len(),
            "action failed for some runs"
        );
        if let Some(phase) = self.session.phase_mut() {
            *phase = DialogPhase::Failed(report);
        }
        Completion::Failed { refresh }
    }

    pub fn scroll_config(&mut self, delta: isize, max: usize) {
        if let ActionSession::Config(view) = &mut self.session {
            view.scroll = view.scroll.saturating_add_signed(delta).min(max);
        }
    }

    pub fn scroll_config_to(&mut self, position: usize) {
        if let ActionSession::Config(view) = &mut self.session {
            view.scroll = position;
        }
    }
}

fn terminate_request(targets: &ActionSubset<bool>, policy: TerminationPolicy) -> OperationRequest {
    let (run_ids, skipped) = match policy {
        TerminationPolicy::MarkAsCanceledImmediately => (targets.ids.clone(), Vec::new()),
        TerminationPolicy::SafeTerminate => targets
            .ids
            .iter()
            .cloned()
            .partition(|id| targets.targets.get(id).copied().unwrap_or(false)),
    };
    OperationRequest::Terminate {
        run_ids,
        policy,
        skipped,
    }
}

/// One-line summary for the footer after a finished action.
pub fn completion_summary(kind: ActionKind, report: &ActionReport) -> String {
    let n = report.succeeded_count();
    let noun = if n == 1 { "run" } else { "runs" };
    format!("{n} {noun} {}", kind.past_tense())
}
