//! Which actions a single run allows right now.
//!
//! Everything here is derived from the run, its repository match and its
//! config fetch state on every call. Nothing is cached, so the answers can
//! never disagree with the data they came from.

use crate::app::{Resource, Run, RunConfig};
use crate::status::{is_done, is_failed};
use crate::workspace::RepositoryMatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisabledReason {
    NoPermission,
    AlreadyFinished,
    NotFailed,
    NotFinished,
    NoRepositoryMatch,
    ConfigNotFetched,
    ConfigLoading,
    ConfigUnavailable,
}

impl DisabledReason {
    pub fn message(self) -> &'static str {
        match self {
            DisabledReason::NoPermission => "you do not have permission for this action",
            DisabledReason::AlreadyFinished => "run has already finished",
            DisabledReason::NotFailed => "run did not fail",
            DisabledReason::NotFinished => "run has not finished yet",
            DisabledReason::NoRepositoryMatch => {
                "job is no longer defined in the loaded workspace"
            }
            DisabledReason::ConfigNotFetched => "run config not loaded",
            DisabledReason::ConfigLoading => "loading run config…",
            DisabledReason::ConfigUnavailable => "run config unavailable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Allowed,
    Disabled(DisabledReason),
}

impl Eligibility {
    pub fn is_allowed(self) -> bool {
        self == Eligibility::Allowed
    }

    pub fn reason(self) -> Option<DisabledReason> {
        match self {
            Eligibility::Allowed => None,
            Eligibility::Disabled(r) => Some(r),
        }
    }

    fn check(allowed: bool, reason: DisabledReason) -> Result<(), DisabledReason> {
        if allowed {
            Ok(())
        } else {
            Err(reason)
        }
    }
}

impl From<Result<(), DisabledReason>> for Eligibility {
    fn from(r: Result<(), DisabledReason>) -> Self {
        match r {
            Ok(()) => Eligibility::Allowed,
            Err(reason) => Eligibility::Disabled(reason),
        }
    }
}

pub fn is_terminable(run: &Run) -> bool {
    run.can_terminate && !is_done(run.status)
}

pub fn is_deletable(run: &Run) -> bool {
    run.can_delete
}

/// Bulk re-execution clones a finished run server-side, so no config or
/// repository match is required.
pub fn is_bulk_reexecutable(run: &Run) -> bool {
    run.can_reexecute && is_done(run.status)
}

pub fn is_reexecutable_from_failure(run: &Run) -> bool {
    run.can_reexecute && is_failed(run.status)
}

/// Config readiness as an eligibility step: ready, loading, failed or never
/// requested.
pub fn config_ready(config: Option<&Resource<RunConfig>>) -> Result<(), DisabledReason> {
    match config {
        Some(Resource::Ready(_)) => Ok(()),
        Some(Resource::Loading) => Err(DisabledReason::ConfigLoading),
        Some(Resource::Failed(_)) => Err(DisabledReason::ConfigUnavailable),
        None => Err(DisabledReason::ConfigNotFetched),
    }
}

/// Per-action eligibility of one run, as shown in the run menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPermissions {
    pub terminate: Eligibility,
    pub delete: Eligibility,
    pub reexecute: Eligibility,
    pub reexecute_from_failure: Eligibility,
    pub view_config: Eligibility,
}

impl RunPermissions {
    pub fn evaluate(
        run: &Run,
        repository: Option<&RepositoryMatch>,
        config: Option<&Resource<RunConfig>>,
    ) -> Self {
        let terminate = Eligibility::check(run.can_terminate, DisabledReason::NoPermission)
            .and_then(|()| {
                Eligibility::check(!is_done(run.status), DisabledReason::AlreadyFinished)
            });

        let delete = Eligibility::check(run.can_delete, DisabledReason::NoPermission);

        let launchable = || {
            Eligibility::check(repository.is_some(), DisabledReason::NoRepositoryMatch)
                .and_then(|()| config_ready(config))
        };

        let reexecute = Eligibility::check(run.can_reexecute, DisabledReason::NoPermission)
            .and_then(|()| launchable());

        let reexecute_from_failure =
            Eligibility::check(run.can_reexecute, DisabledReason::NoPermission)
                .and_then(|()| Eligibility::check(is_failed(run.status), DisabledReason::NotFailed))
                .and_then(|()| launchable());

        Self {
            terminate: terminate.into(),
            delete: delete.into(),
            reexecute: reexecute.into(),
            reexecute_from_failure: reexecute_from_failure.into(),
            view_config: config_ready(config).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::RunStatus;
    use chrono::Utc;

    const STATUSES: [RunStatus; 10] = [
        RunStatus::Queued,
        RunStatus::NotStarted,
        RunStatus::Managed,
        RunStatus::Starting,
        RunStatus::Started,
        RunStatus::Success,
        RunStatus::Failure,
        RunStatus::Canceling,
        RunStatus::Canceled,
        RunStatus::Unknown,
    ];

    fn run(status: RunStatus) -> Run {
        Run {
            can_terminate: true,
            can_delete: true,
            can_reexecute: true,
            ..Run::new("r1", "nightly", status, Utc::now())
        }
    }

    fn repo() -> RepositoryMatch {
        RepositoryMatch {
            repository_name: "warehouse".to_string(),
            location_name: "etl".to_string(),
        }
    }

    fn ready() -> Resource<RunConfig> {
        Resource::Ready(RunConfig {
            yaml: "ops: {}\n".to_string(),
            mode: None,
        })
    }

    #[test]
    fn terminable_only_while_not_done() {
        for status in STATUSES {
            let r = run(status);
            assert_eq!(is_terminable(&r), !is_done(status), "{status:?}");
        }
    }

    #[test]
    fn terminate_flag_false_never_terminable() {
        for status in STATUSES {
            let r = Run {
                can_terminate: false,
                ..run(status)
            };
            assert!(!is_terminable(&r));
            let perms = RunPermissions::evaluate(&r, Some(&repo()), Some(&ready()));
            assert_eq!(
                perms.terminate,
                Eligibility::Disabled(DisabledReason::NoPermission)
            );
        }
    }

    #[test]
    fn deletable_ignores_status() {
        for status in STATUSES {
            assert!(is_deletable(&run(status)));
            let denied = Run {
                can_delete: false,
                ..run(status)
            };
            assert!(!is_deletable(&denied));
        }
    }

    #[test]
    fn finished_run_explains_terminate_denial() {
        let perms = RunPermissions::evaluate(&run(RunStatus::Success), None, None);
        assert_eq!(
            perms.terminate,
            Eligibility::Disabled(DisabledReason::AlreadyFinished)
        );
    }

    #[test]
    fn reexecute_needs_match_and_config() {
        let r = run(RunStatus::Success);
        assert!(RunPermissions::evaluate(&r, Some(&repo()), Some(&ready()))
            .reexecute
            .is_allowed());
        assert_eq!(
            RunPermissions::evaluate(&r, None, Some(&ready())).reexecute,
            Eligibility::Disabled(DisabledReason::NoRepositoryMatch)
        );
        assert_eq!(
            RunPermissions::evaluate(&r, Some(&repo()), Some(&Resource::Loading)).reexecute,
            Eligibility::Disabled(DisabledReason::ConfigLoading)
        );
        assert_eq!(
            RunPermissions::evaluate(&r, Some(&repo()), Some(&Resource::Failed("boom".into())))
                .reexecute,
            Eligibility::Disabled(DisabledReason::ConfigUnavailable)
        );
        assert_eq!(
            RunPermissions::evaluate(&r, Some(&repo()), None).reexecute,
            Eligibility::Disabled(DisabledReason::ConfigNotFetched)
        );
    }

    #[test]
    fn from_failure_requires_failed_status() {
        let ok = RunPermissions::evaluate(&run(RunStatus::Failure), Some(&repo()), Some(&ready()));
        assert!(ok.reexecute_from_failure.is_allowed());

        let success =
            RunPermissions::evaluate(&run(RunStatus::Success), Some(&repo()), Some(&ready()));
        assert_eq!(
            success.reexecute_from_failure,
            Eligibility::Disabled(DisabledReason::NotFailed)
        );
    }

    #[test]
    fn permission_checked_before_everything_else() {
        let r = Run {
            can_reexecute: false,
            ..run(RunStatus::Failure)
        };
        let perms = RunPermissions::evaluate(&r, None, None);
        assert_eq!(perms.reexecute.reason(), Some(DisabledReason::NoPermission));
        assert_eq!(
            perms.reexecute_from_failure.reason(),
            Some(DisabledReason::NoPermission)
        );
    }

    #[test]
    fn bulk_reexecution_requires_done() {
        assert!(is_bulk_reexecutable(&run(RunStatus::Canceled)));
        assert!(!is_bulk_reexecutable(&run(RunStatus::Started)));
        assert!(!is_bulk_reexecutable(&Run {
            can_reexecute: false,
            ..run(RunStatus::Success)
        }));
    }

    #[test]
    fn view_config_tracks_fetch_state() {
        let r = run(RunStatus::Success);
        assert!(RunPermissions::evaluate(&r, None, Some(&ready()))
            .view_config
            .is_allowed());
        assert_eq!(
            RunPermissions::evaluate(&r, None, Some(&Resource::Loading)).view_config,
            Eligibility::Disabled(DisabledReason::ConfigLoading)
        );
    }
}
