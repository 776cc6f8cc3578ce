//! Status categories. Every eligibility rule that depends on a run's status
//! goes through these predicates.

use crate::app::RunStatus;

/// Terminal statuses: the run will never change status again.
pub fn is_done(status: RunStatus) -> bool {
    matches!(
        status,
        RunStatus::Success | RunStatus::Failure | RunStatus::Canceled
    )
}

pub fn is_failed(status: RunStatus) -> bool {
    status == RunStatus::Failure
}

/// `Unknown` is in no category.
pub fn is_in_progress(status: RunStatus) -> bool {
    matches!(
        status,
        RunStatus::Queued
            | RunStatus::NotStarted
            | RunStatus::Managed
            | RunStatus::Starting
            | RunStatus::Started
            | RunStatus::Canceling
    )
}
