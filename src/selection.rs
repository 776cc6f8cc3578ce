//! Bulk selection and the per-action subsets derived from it.

use crate::app::{Run, RunId};
use crate::permissions::{
    is_bulk_reexecutable, is_deletable, is_reexecutable_from_failure, is_terminable,
};
use std::collections::{BTreeMap, BTreeSet};

/// The runs the user has marked for a bulk action. Order is irrelevant;
/// subsets are always emitted in run-list order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<RunId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &RunId) -> bool {
        self.ids.contains(id)
    }

    /// Returns whether the run is selected after the toggle.
    pub fn toggle(&mut self, id: &RunId) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.clone());
            true
        }
    }

    pub fn insert(&mut self, id: RunId) {
        self.ids.insert(id);
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Drop ids for runs that are no longer listed.
    pub fn retain_listed(&mut self, runs: &[Run]) {
        self.ids
            .retain(|id| runs.iter().any(|r| r.run_id == *id));
    }

    /// The selected runs, in list order.
    pub fn resolve<'a>(&self, runs: &'a [Run]) -> Vec<&'a Run> {
        runs.iter().filter(|r| self.ids.contains(&r.run_id)).collect()
    }
}

/// Eligible runs for one action: the ids in list order, plus the value each
/// dialog needs per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSubset<T> {
    pub ids: Vec<RunId>,
    pub targets: BTreeMap<RunId, T>,
}

impl<T> Default for ActionSubset<T> {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            targets: BTreeMap::new(),
        }
    }
}

impl<T> ActionSubset<T> {
    fn collect<'a>(
        runs: &[&'a Run],
        eligible: impl Fn(&Run) -> bool,
        value: impl Fn(&'a Run) -> T,
    ) -> Self {
        let mut subset = Self::default();
        for run in runs.iter().copied().filter(|r| eligible(r)) {
            subset.ids.push(run.run_id.clone());
            subset.targets.insert(run.run_id.clone(), value(run));
        }
        subset
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Keep only the listed ids (used when retrying the failed part of a
    /// bulk action).
    pub fn restrict_to(&self, keep: &[RunId]) -> Self
    where
        T: Clone,
    {
        let ids: Vec<RunId> = self
            .ids
            .iter()
            .filter(|id| keep.contains(id))
            .cloned()
            .collect();
        let targets = ids
            .iter()
            .filter_map(|id| self.targets.get(id).map(|v| (id.clone(), v.clone())))
            .collect();
        Self { ids, targets }
    }
}

pub fn any_terminable(runs: &[&Run]) -> bool {
    runs.iter().any(|r| is_terminable(r))
}

pub fn any_deletable(runs: &[&Run]) -> bool {
    runs.iter().any(|r| is_deletable(r))
}

pub fn any_reexecutable(runs: &[&Run]) -> bool {
    runs.iter().any(|r| is_bulk_reexecutable(r))
}

pub fn any_reexecutable_from_failure(runs: &[&Run]) -> bool {
    runs.iter().any(|r| is_reexecutable_from_failure(r))
}

/// Value: whether the launcher can stop the run cleanly. `false` runs are
/// only terminated under the force policy.
pub fn terminable_subset(runs: &[&Run]) -> ActionSubset<bool> {
    ActionSubset::collect(runs, is_terminable, |r| r.launcher_can_terminate)
}

/// Governed by the delete capability alone; status does not matter.
pub fn deletable_subset(runs: &[&Run]) -> ActionSubset<bool> {
    ActionSubset::collect(runs, is_deletable, |r| r.can_delete)
}

/// Value: the parent run the new run is cloned from.
pub fn reexecutable_subset(runs: &[&Run]) -> ActionSubset<RunId> {
    ActionSubset::collect(runs, is_bulk_reexecutable, |r| r.run_id.clone())
}

pub fn reexecutable_from_failure_subset(runs: &[&Run]) -> ActionSubset<RunId> {
    ActionSubset::collect(runs, is_reexecutable_from_failure, |r| r.run_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::RunStatus;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn run(id: &str, status: RunStatus) -> Run {
        Run {
            can_terminate: true,
            can_delete: true,
            can_reexecute: true,
            ..Run::new(id, "nightly", status, Utc::now())
        }
    }

    fn ids(list: &[&str]) -> Vec<RunId> {
        list.iter().map(|s| RunId::from(*s)).collect()
    }

    #[test]
    fn empty_selection_is_inert() {
        let none: Vec<&Run> = Vec::new();
        assert!(!any_terminable(&none));
        assert!(!any_deletable(&none));
        assert!(!any_reexecutable(&none));
        assert!(!any_reexecutable_from_failure(&none));
        assert!(terminable_subset(&none).is_empty());
        assert!(deletable_subset(&none).is_empty());
        assert!(reexecutable_subset(&none).is_empty());
        assert!(reexecutable_from_failure_subset(&none).is_empty());
    }

    #[test]
    fn failed_and_succeeded_pair() {
        let a = run("a", RunStatus::Failure);
        let b = run("b", RunStatus::Success);
        let sel = vec![&a, &b];
        assert_eq!(reexecutable_subset(&sel).ids, ids(&["a", "b"]));
        assert_eq!(reexecutable_from_failure_subset(&sel).ids, ids(&["a"]));
    }

    #[test]
    fn from_failure_subset_is_exact() {
        let runs = vec![
            run("a", RunStatus::Failure),
            Run {
                can_reexecute: false,
                ..run("b", RunStatus::Failure)
            },
            run("c", RunStatus::Canceled),
            run("d", RunStatus::Started),
            run("e", RunStatus::Failure),
        ];
        let sel: Vec<&Run> = runs.iter().collect();
        let subset = reexecutable_from_failure_subset(&sel);
        assert_eq!(subset.ids, ids(&["a", "e"]));
        assert_eq!(subset.targets.get(&RunId::from("e")), Some(&RunId::from("e")));
    }

    #[test]
    fn any_matches_subset_emptiness() {
        let runs = vec![
            run("a", RunStatus::Started),
            run("b", RunStatus::Success),
            Run {
                can_terminate: false,
                can_delete: false,
                can_reexecute: false,
                ..run("c", RunStatus::Queued)
            },
        ];
        let all: Vec<&Run> = runs.iter().collect();
        let combos: Vec<Vec<&Run>> = vec![
            vec![],
            vec![all[0]],
            vec![all[1]],
            vec![all[2]],
            vec![all[1], all[2]],
            all.clone(),
        ];
        for sel in combos {
            assert_eq!(any_terminable(&sel), !terminable_subset(&sel).is_empty());
            assert_eq!(any_deletable(&sel), !deletable_subset(&sel).is_empty());
            assert_eq!(any_reexecutable(&sel), !reexecutable_subset(&sel).is_empty());
            assert_eq!(
                any_reexecutable_from_failure(&sel),
                !reexecutable_from_failure_subset(&sel).is_empty()
            );
        }
    }

    #[test]
    fn terminable_subset_maps_launcher_capability() {
        let runs = vec![
            run("a", RunStatus::Started),
            Run {
                launcher_can_terminate: false,
                ..run("b", RunStatus::Queued)
            },
            run("c", RunStatus::Success),
        ];
        let sel: Vec<&Run> = runs.iter().collect();
        let subset = terminable_subset(&sel);
        assert_eq!(subset.ids, ids(&["a", "b"]));
        assert_eq!(subset.targets.get(&RunId::from("a")), Some(&true));
        assert_eq!(subset.targets.get(&RunId::from("b")), Some(&false));
    }

    #[test]
    fn deletable_subset_ignores_terminate_flag() {
        let runs = vec![
            Run {
                can_terminate: false,
                ..run("a", RunStatus::Success)
            },
            Run {
                can_delete: false,
                ..run("b", RunStatus::Started)
            },
        ];
        let sel: Vec<&Run> = runs.iter().collect();
        assert_eq!(deletable_subset(&sel).ids, ids(&["a"]));
    }

    #[test]
    fn selection_toggle_and_resolve_in_list_order() {
        let runs = vec![
            run("a", RunStatus::Success),
            run("b", RunStatus::Success),
            run("c", RunStatus::Success),
        ];
        let mut sel = Selection::new();
        assert!(sel.toggle(&RunId::from("c")));
        assert!(sel.toggle(&RunId::from("a")));
        let resolved: Vec<&str> = sel.resolve(&runs).iter().map(|r| r.run_id.as_str()).collect();
        assert_eq!(resolved, vec!["a", "c"]);
        assert!(!sel.toggle(&RunId::from("a")));
        assert_eq!(sel.len(), 1);
    }

    #[test]
    fn selection_drops_unlisted_runs() {
        let runs = vec![run("a", RunStatus::Success)];
        let mut sel = Selection::new();
        sel.insert(RunId::from("a"));
        sel.insert(RunId::from("gone"));
        sel.retain_listed(&runs);
        assert_eq!(sel.len(), 1);
        assert!(sel.contains(&RunId::from("a")));
    }

    #[test]
    fn restrict_keeps_order_and_values() {
        let runs = vec![
            run("a", RunStatus::Started),
            run("b", RunStatus::Started),
            run("c", RunStatus::Started),
        ];
        let sel: Vec<&Run> = runs.iter().collect();
        let subset = terminable_subset(&sel).restrict_to(&ids(&["c", "a"]));
        assert_eq!(subset.ids, ids(&["a", "c"]));
        assert_eq!(subset.targets.len(), 2);
    }
}
