//! Reconciliation
//!
//! Computes the set-difference between the previously active applications and
//! the newly planned set. `diff` is a pure function: calling it twice with
//! the same inputs yields identical results, and a mode change is expressed
//! as a stop-then-start of the application.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::optimizer::CyclePlan;

/// The applications currently realized by the deployment sink, with the mode
/// rank each one runs at. Updated only after a plan has been applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSet {
    entries: BTreeMap<String, u8>,
}

impl ActiveSet {
    /// An empty active set, the state before the first cycle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an active set from explicit `(name, rank)` entries.
    pub fn from_entries<I: IntoIterator<Item = (String, u8)>>(entries: I) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Mode rank the named application currently runs at, if active.
    pub fn mode_of(&self, name: &str) -> Option<u8> {
        self.entries.get(name).copied()
    }

    /// Whether the named application is active.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of active applications.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no application is active.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Active application names in name order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// One application to start, at a specific mode rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartItem {
    /// Application name
    pub app_name: String,
    /// Mode rank to start at
    pub mode_rank: u8,
}

/// The start/stop work needed to move from an active set to a plan.
/// Both lists are in name order for deterministic application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileDiff {
    /// Applications to start (new, or restarting at a different mode)
    pub to_start: Vec<StartItem>,
    /// Applications to stop (no longer planned, or changing mode)
    pub to_stop: Vec<String>,
}

impl ReconcileDiff {
    /// Whether the diff requires no work.
    pub fn is_empty(&self) -> bool {
        self.to_start.is_empty() && self.to_stop.is_empty()
    }
}

/// Owner of the [`ActiveSet`] across cycles.
pub struct Reconciler {
    active: ActiveSet,
}

impl Reconciler {
    /// Create a reconciler with an empty active set.
    pub fn new() -> Self {
        Self {
            active: ActiveSet::new(),
        }
    }

    /// The current active set.
    pub fn active(&self) -> &ActiveSet {
        &self.active
    }

    /// Pure diff between a previous active set and a new plan.
    ///
    /// `to_stop` contains every previously active name absent from the plan's
    /// placed decisions. `to_start` contains every placed decision whose
    /// application is not active, plus every one whose active mode differs
    /// from the planned mode (stop-then-start is the sink's job; the
    /// mode-changed name appears in `to_start` only).
    pub fn diff(previous: &ActiveSet, plan: &CyclePlan) -> ReconcileDiff {
        let planned: BTreeMap<String, u8> = plan.placements().into_iter().collect();

        let to_stop: Vec<String> = previous
            .names()
            .filter(|name| !planned.contains_key(*name))
            .map(String::from)
            .collect();

        let to_start: Vec<StartItem> = planned
            .iter()
            .filter(|(name, &rank)| previous.mode_of(name) != Some(rank))
            .map(|(name, &rank)| StartItem {
                app_name: name.clone(),
                mode_rank: rank,
            })
            .collect();

        ReconcileDiff { to_start, to_stop }
    }

    /// Diff the owned active set against a plan.
    pub fn plan_diff(&self, plan: &CyclePlan) -> ReconcileDiff {
        Self::diff(&self.active, plan)
    }

    /// Update the active set after the sink applied a diff. Items the sink
    /// failed on are passed in `failed_starts` and stay out of the set.
    pub fn commit(&mut self, diff: &ReconcileDiff, failed_starts: &[String]) {
        for name in &diff.to_stop {
            self.active.entries.remove(name);
        }
        for item in &diff.to_start {
            if failed_starts.contains(&item.app_name) {
                self.active.entries.remove(&item.app_name);
            } else {
                self.active
                    .entries
                    .insert(item.app_name.clone(), item.mode_rank);
            }
        }
        debug!(active = self.active.len(), "active set committed");
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::{AllocationDecision, Outcome};
    use crate::vehicle::VehicleState;
    use crate::Category;
    use uuid::Uuid;

    fn decision(name: &str, mode: Option<u8>) -> AllocationDecision {
        let outcome = match mode {
            Some(1) => Outcome::Selected,
            Some(_) => Outcome::Downgraded,
            None => Outcome::Rejected,
        };
        AllocationDecision {
            app_name: name.into(),
            category: Category::Safety,
            chosen_mode: mode,
            score: if mode.is_some() { 1.0 } else { 0.0 },
            outcome,
            reason: String::new(),
        }
    }

    fn plan_with(decisions: Vec<AllocationDecision>) -> CyclePlan {
        CyclePlan {
            id: Uuid::new_v4(),
            vehicle_state: VehicleState::Driving,
            baseline: false,
            decisions,
            total_cpu: 0,
            total_memory: 0,
            total_bandwidth: 0.0,
            total_ux: 0.0,
        }
    }

    #[test]
    fn test_first_cycle_starts_everything() {
        let plan = plan_with(vec![decision("a", Some(1)), decision("b", Some(2))]);
        let diff = Reconciler::diff(&ActiveSet::new(), &plan);
        assert_eq!(diff.to_stop, Vec::<String>::new());
        assert_eq!(diff.to_start.len(), 2);
        assert_eq!(diff.to_start[0].app_name, "a");
        assert_eq!(diff.to_start[1].mode_rank, 2);
    }

    #[test]
    fn test_dropped_app_is_stopped() {
        let active = ActiveSet::from_entries([("a".to_string(), 1), ("b".to_string(), 1)]);
        let plan = plan_with(vec![decision("a", Some(1))]);
        let diff = Reconciler::diff(&active, &plan);
        assert_eq!(diff.to_stop, vec!["b".to_string()]);
        assert!(diff.to_start.is_empty());
    }

    #[test]
    fn test_rejected_app_is_stopped() {
        let active = ActiveSet::from_entries([("a".to_string(), 1)]);
        let plan = plan_with(vec![decision("a", None)]);
        let diff = Reconciler::diff(&active, &plan);
        assert_eq!(diff.to_stop, vec!["a".to_string()]);
    }

    #[test]
    fn test_mode_change_restarts() {
        let active = ActiveSet::from_entries([("a".to_string(), 1)]);
        let plan = plan_with(vec![decision("a", Some(2))]);
        let diff = Reconciler::diff(&active, &plan);
        // Mode change appears in to_start; the sink performs stop-then-start.
        assert!(diff.to_stop.is_empty());
        assert_eq!(
            diff.to_start,
            vec![StartItem {
                app_name: "a".to_string(),
                mode_rank: 2
            }]
        );
    }

    #[test]
    fn test_unchanged_plan_yields_empty_diff() {
        let active = ActiveSet::from_entries([("a".to_string(), 1), ("b".to_string(), 2)]);
        let plan = plan_with(vec![decision("a", Some(1)), decision("b", Some(2))]);
        assert!(Reconciler::diff(&active, &plan).is_empty());
    }

    #[test]
    fn test_diff_is_idempotent() {
        let active = ActiveSet::from_entries([("a".to_string(), 1), ("old".to_string(), 2)]);
        let plan = plan_with(vec![decision("a", Some(2)), decision("new", Some(1))]);
        let first = Reconciler::diff(&active, &plan);
        let second = Reconciler::diff(&active, &plan);
        assert_eq!(first, second);
    }

    #[test]
    fn test_commit_then_rediff_is_empty() {
        let mut reconciler = Reconciler::new();
        let plan = plan_with(vec![decision("a", Some(1)), decision("b", Some(2))]);
        let diff = reconciler.plan_diff(&plan);
        reconciler.commit(&diff, &[]);
        assert!(reconciler.plan_diff(&plan).is_empty());
    }

    #[test]
    fn test_failed_start_stays_out_of_active_set() {
        let mut reconciler = Reconciler::new();
        let plan = plan_with(vec![decision("a", Some(1)), decision("b", Some(1))]);
        let diff = reconciler.plan_diff(&plan);
        reconciler.commit(&diff, &["b".to_string()]);
        assert!(reconciler.active().contains("a"));
        assert!(!reconciler.active().contains("b"));
        // The failed app is retried on the next cycle.
        let retry = reconciler.plan_diff(&plan);
        assert_eq!(retry.to_start.len(), 1);
        assert_eq!(retry.to_start[0].app_name, "b");
    }
}
