//! Repository resolution: which loaded code location (if any) still defines
//! the job a run was launched from.

use crate::app::Run;

/// One code location as reported by `workspace --json`.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryLocation {
    pub name: String,
    #[serde(default)]
    pub repositories: Vec<Repository>,
    /// Set when the location failed to load; such a location matches nothing.
    #[serde(default)]
    pub load_error: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub jobs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryMatch {
    pub repository_name: String,
    pub location_name: String,
}

/// Returns the match only when the run's origin location is loaded, contains
/// the origin repository, and that repository still defines the run's job.
pub fn resolve_repository(run: &Run, workspace: &[RepositoryLocation]) -> Option<RepositoryMatch> {
    let origin = run.origin.as_ref()?;
    let location = workspace
        .iter()
        .find(|l| l.name == origin.location_name && l.load_error.is_none())?;
    let repository = location
        .repositories
        .iter()
        .find(|r| r.name == origin.repository_name)?;
    if !repository.jobs.iter().any(|j| *j == run.job_name) {
        return None;
    }
    Some(RepositoryMatch {
        repository_name: repository.name.clone(),
        location_name: location.name.clone(),
    })
}
