//! Allocation optimizer
//!
//! The per-cycle admission algorithm: score the applications required by the
//! current vehicle state, try each one's modes from richest to cheapest under
//! the shared bandwidth budget and the resource oracle, and emit a plan of
//! selected, downgraded, and rejected decisions with aggregate totals.
//!
//! The algorithm is greedy and priority-monotone: once an application is
//! placed at a mode, earlier decisions are never revisited, and bandwidth
//! committed by higher-scored applications is never reclaimed for lower-scored
//! ones. A rejected application never blocks later candidates.

use std::collections::BTreeSet;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::catalog::{Application, Catalog, Mode};
use crate::profile::WeightTable;
use crate::resources::{ResourceProvider, ResourceRequest};
use crate::vehicle::{StateRequirementMap, VehicleState};
use crate::Category;

/// Outcome of one application's admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Placed at rank 1
    Selected,
    /// Placed at a rank greater than 1
    Downgraded,
    /// No mode was feasible
    Rejected,
}

/// Why an application was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Every attempted mode would have exceeded the bandwidth budget
    CapacityExceeded,
    /// The resource oracle refused the cheapest attempted mode
    ResourceUnavailable,
}

impl RejectReason {
    /// Stable snake_case name, used in trace records.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::CapacityExceeded => "capacity_exceeded",
            RejectReason::ResourceUnavailable => "resource_unavailable",
        }
    }
}

/// One application's decision for one cycle. Created fresh each cycle and
/// never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationDecision {
    /// Application name
    pub app_name: String,
    /// Application category
    pub category: Category,
    /// Chosen mode rank, `None` when rejected
    pub chosen_mode: Option<u8>,
    /// priority × weight(category) × mode.ux_value, 0.0 when rejected
    pub score: f64,
    /// Admission outcome
    pub outcome: Outcome,
    /// Diagnostic reason, e.g. `selected_mode_1`, `downgraded_to_mode_2`,
    /// `capacity_exceeded`
    pub reason: String,
}

impl AllocationDecision {
    /// Whether the application was placed at some mode.
    pub fn is_placed(&self) -> bool {
        matches!(self.outcome, Outcome::Selected | Outcome::Downgraded)
    }
}

/// The aggregate of all decisions for one cycle, immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CyclePlan {
    /// Unique plan identifier, carried into metrics records
    pub id: Uuid,
    /// Vehicle state the plan was computed for
    pub vehicle_state: VehicleState,
    /// Whether baseline (rank-1-only) selection was in effect
    pub baseline: bool,
    /// Per-application decisions in the order they were tried
    pub decisions: Vec<AllocationDecision>,
    /// Sum of placed modes' CPU in millicores
    pub total_cpu: u64,
    /// Sum of placed modes' memory in MiB
    pub total_memory: u64,
    /// Sum of placed modes' bandwidth in Mbps
    pub total_bandwidth: f64,
    /// Sum of placed decisions' scores
    pub total_ux: f64,
}

impl CyclePlan {
    /// Decisions that placed their application at some mode.
    pub fn placed(&self) -> impl Iterator<Item = &AllocationDecision> {
        self.decisions.iter().filter(|d| d.is_placed())
    }

    /// Decisions that rejected their application.
    pub fn rejected(&self) -> impl Iterator<Item = &AllocationDecision> {
        self.decisions
            .iter()
            .filter(|d| d.outcome == Outcome::Rejected)
    }

    /// `(name, rank)` pairs for every placed application.
    pub fn placements(&self) -> Vec<(String, u8)> {
        self.placed()
            .map(|d| {
                (
                    d.app_name.clone(),
                    d.chosen_mode.expect("placed decision has a mode"),
                )
            })
            .collect()
    }
}

/// The per-cycle allocation optimizer.
#[derive(Debug, Clone)]
pub struct Optimizer {
    capacity: f64,
    baseline: bool,
}

impl Optimizer {
    /// Create an optimizer with a global bandwidth budget. `baseline`
    /// disables degradation and forces rank-1-only selection.
    pub fn new(capacity: f64, baseline: bool) -> Self {
        Self { capacity, baseline }
    }

    /// The global bandwidth budget in Mbps.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Whether baseline selection is in effect.
    pub fn is_baseline(&self) -> bool {
        self.baseline
    }

    /// Ordering score for an application: priority × weight(category).
    /// Governs selection order among applications, independent of mode.
    fn app_score(app: &Application, weights: &WeightTable) -> f64 {
        app.priority as f64 * weights.weight(app.category)
    }

    /// Decision score for a placed mode:
    /// priority × weight(category) × mode.ux_value.
    fn mode_score(app: &Application, mode: &Mode, weights: &WeightTable) -> f64 {
        Self::app_score(app, weights) * mode.ux_value
    }

    /// Compute the allocation plan for one cycle.
    ///
    /// Candidates are the deduplicated union of application names required by
    /// `state`, resolved against the catalog; names absent from the catalog
    /// are skipped, since catalogs and requirement maps may drift. Ordering is
    /// deterministic: score descending, ties broken by name ascending.
    pub fn plan(
        &self,
        state: VehicleState,
        catalog: &Catalog,
        weights: &WeightTable,
        requirements: &StateRequirementMap,
        resources: &dyn ResourceProvider,
    ) -> CyclePlan {
        let required: BTreeSet<String> = requirements.required_names(state).into_iter().collect();

        let mut candidates: Vec<&Application> = required
            .iter()
            .filter_map(|name| {
                let app = catalog.lookup(name);
                if app.is_none() {
                    debug!(app = %name, "required application not in catalog, skipping");
                }
                app
            })
            .collect();

        candidates.sort_by(|a, b| {
            OrderedFloat(Self::app_score(b, weights))
                .cmp(&OrderedFloat(Self::app_score(a, weights)))
                .then_with(|| a.name.cmp(&b.name))
        });

        let mut plan = CyclePlan {
            id: Uuid::new_v4(),
            vehicle_state: state,
            baseline: self.baseline,
            decisions: Vec::with_capacity(candidates.len()),
            total_cpu: 0,
            total_memory: 0,
            total_bandwidth: 0.0,
            total_ux: 0.0,
        };

        for app in candidates {
            let decision = self.try_place(app, weights, resources, &mut plan);
            trace!(
                app = %decision.app_name,
                outcome = ?decision.outcome,
                reason = %decision.reason,
                "decision"
            );
            plan.decisions.push(decision);
        }

        debug!(
            state = %state,
            placed = plan.placed().count(),
            rejected = plan.rejected().count(),
            bandwidth = plan.total_bandwidth,
            capacity = self.capacity,
            "cycle plan computed"
        );
        plan
    }

    /// Try an application's modes in rank order, committing the first
    /// feasible one into the running totals.
    fn try_place(
        &self,
        app: &Application,
        weights: &WeightTable,
        resources: &dyn ResourceProvider,
        plan: &mut CyclePlan,
    ) -> AllocationDecision {
        // Baseline failure at rank 1 is terminal for the application.
        let modes: &[Mode] = if self.baseline {
            &app.modes[..1]
        } else {
            &app.modes
        };

        let mut last_failure = RejectReason::CapacityExceeded;
        for mode in modes {
            if plan.total_bandwidth + mode.bandwidth > self.capacity {
                last_failure = RejectReason::CapacityExceeded;
                continue;
            }
            let check = resources.check(
                app.category,
                &ResourceRequest {
                    cpu: mode.cpu,
                    memory: mode.memory,
                    bandwidth: mode.bandwidth,
                },
            );
            if !check.ok {
                last_failure = RejectReason::ResourceUnavailable;
                continue;
            }

            // First feasible mode: commit.
            plan.total_cpu += mode.cpu as u64;
            plan.total_memory += mode.memory as u64;
            plan.total_bandwidth += mode.bandwidth;
            let score = Self::mode_score(app, mode, weights);
            plan.total_ux += score;

            let (outcome, reason) = if mode.rank == 1 {
                (Outcome::Selected, format!("selected_mode_{}", mode.rank))
            } else {
                (
                    Outcome::Downgraded,
                    format!("downgraded_to_mode_{}", mode.rank),
                )
            };
            return AllocationDecision {
                app_name: app.name.clone(),
                category: app.category,
                chosen_mode: Some(mode.rank),
                score,
                outcome,
                reason,
            };
        }

        AllocationDecision {
            app_name: app.name.clone(),
            category: app.category,
            chosen_mode: None,
            score: 0.0,
            outcome: Outcome::Rejected,
            reason: last_failure.as_str().to_string(),
        }
    }
}
