use crate::app::RunId;

/// Announce a launched re-execution. Returns an error message on failure.
#[cfg(feature = "desktop-notify")]
pub fn send_launched(job_name: &str, parent: &RunId, new_run: &RunId) -> Option<String> {
    use notify_rust::{Notification, Urgency};

    let body = format!("{job_name}: {} → {}", parent.short(), new_run.short());
    Notification::new()
        .summary("Run re-executed")
        .body(&body)
        .icon("dialog-information")
        .urgency(Urgency::Normal)
        .show()
        .err()
        .map(|e| format!("Desktop notification failed: {e}"))
}

#[cfg(not(feature = "desktop-notify"))]
pub fn send_launched(_job_name: &str, _parent: &RunId, _new_run: &RunId) -> Option<String> {
    None
}
