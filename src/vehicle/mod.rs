//! Vehicle operating-state model
//!
//! Holds the current vehicle state behind a lock so an independent timer can
//! mutate it while the control loop reads a consistent snapshot, plus the
//! static mapping from state to the applications required in that state.

use std::collections::BTreeMap;

use parking_lot::{Mutex, RwLock};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::Category;

/// Vehicle operating states. Exactly one is current at any instant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum VehicleState {
    /// Vehicle in motion
    Driving,
    /// Vehicle parked, occupants possibly present
    Parking,
    /// Vehicle connected to a charger
    Charging,
    /// Emergency condition detected
    Emergency,
}

impl VehicleState {
    /// All states.
    pub const ALL: [VehicleState; 4] = [
        VehicleState::Driving,
        VehicleState::Parking,
        VehicleState::Charging,
        VehicleState::Emergency,
    ];

    /// Stable lowercase name, used in metrics and trace records.
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleState::Driving => "driving",
            VehicleState::Parking => "parking",
            VehicleState::Charging => "charging",
            VehicleState::Emergency => "emergency",
        }
    }
}

impl std::fmt::Display for VehicleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single state change, delivered to the control loop as one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State before the change
    pub from: VehicleState,
    /// State after the change
    pub to: VehicleState,
}

/// Static, immutable mapping from vehicle state to the per-category ordered
/// sets of required application names. Defined at startup, never mutated.
#[derive(Debug, Clone)]
pub struct StateRequirementMap {
    map: BTreeMap<VehicleState, BTreeMap<Category, Vec<String>>>,
}

impl StateRequirementMap {
    /// Build a requirement map from explicit entries.
    pub fn new(map: BTreeMap<VehicleState, BTreeMap<Category, Vec<String>>>) -> Self {
        Self { map }
    }

    /// The built-in testbench mapping for the four operating states.
    pub fn builtin() -> Self {
        let mut map = BTreeMap::new();
        map.insert(
            VehicleState::Driving,
            requirements([
                (
                    Category::Safety,
                    vec!["emergency_brake", "collision_warning", "lane_assist"],
                ),
                (Category::Comfort, vec!["climate_control"]),
                (Category::Infotainment, vec!["music_player", "navigation_display"]),
            ]),
        );
        map.insert(
            VehicleState::Parking,
            requirements([
                (Category::Safety, vec!["emergency_brake"]),
                (
                    Category::Comfort,
                    vec!["climate_control", "seat_massage", "cabin_lighting"],
                ),
                (Category::Infotainment, vec!["music_player", "video_streaming"]),
            ]),
        );
        map.insert(
            VehicleState::Charging,
            requirements([
                (Category::Safety, vec!["emergency_brake"]),
                (
                    Category::Comfort,
                    vec!["climate_control", "seat_massage", "cabin_lighting"],
                ),
                (
                    Category::Infotainment,
                    vec!["video_streaming", "music_player", "navigation_display"],
                ),
            ]),
        );
        map.insert(
            VehicleState::Emergency,
            requirements([
                (
                    Category::Safety,
                    vec!["emergency_brake", "collision_warning", "lane_assist"],
                ),
                (Category::Comfort, vec![]),
                (Category::Infotainment, vec![]),
            ]),
        );
        Self { map }
    }

    /// Required applications for a state, per category. An unknown state
    /// yields empty requirement sets for every category, never an error.
    pub fn required_apps(&self, state: VehicleState) -> BTreeMap<Category, Vec<String>> {
        self.map.get(&state).cloned().unwrap_or_else(|| {
            Category::ALL.iter().map(|&c| (c, Vec::new())).collect()
        })
    }

    /// Deduplicated union of required application names across categories,
    /// in name order.
    pub fn required_names(&self, state: VehicleState) -> Vec<String> {
        let mut names: Vec<String> = self
            .required_apps(state)
            .into_values()
            .flatten()
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

fn requirements<const N: usize>(
    entries: [(Category, Vec<&str>); N],
) -> BTreeMap<Category, Vec<String>> {
    entries
        .into_iter()
        .map(|(c, names)| (c, names.into_iter().map(String::from).collect()))
        .collect()
}

/// Weighted transition table keyed by current state.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    rows: BTreeMap<VehicleState, Vec<(VehicleState, f64)>>,
}

impl TransitionTable {
    /// The built-in transition probabilities for the simulated vehicle.
    pub fn builtin() -> Self {
        let mut rows = BTreeMap::new();
        rows.insert(
            VehicleState::Parking,
            vec![
                (VehicleState::Driving, 0.6),
                (VehicleState::Charging, 0.25),
                (VehicleState::Emergency, 0.05),
                (VehicleState::Parking, 0.1),
            ],
        );
        rows.insert(
            VehicleState::Driving,
            vec![
                (VehicleState::Parking, 0.4),
                (VehicleState::Emergency, 0.1),
                (VehicleState::Charging, 0.05),
                (VehicleState::Driving, 0.45),
            ],
        );
        rows.insert(
            VehicleState::Charging,
            vec![
                (VehicleState::Parking, 0.7),
                (VehicleState::Driving, 0.2),
                (VehicleState::Emergency, 0.05),
                (VehicleState::Charging, 0.05),
            ],
        );
        rows.insert(
            VehicleState::Emergency,
            vec![
                (VehicleState::Parking, 0.6),
                (VehicleState::Driving, 0.2),
                (VehicleState::Charging, 0.1),
                (VehicleState::Emergency, 0.1),
            ],
        );
        Self { rows }
    }

    /// Sample the next state for the given current state.
    fn sample(&self, current: VehicleState, rng: &mut ChaCha8Rng) -> VehicleState {
        let Some(row) = self.rows.get(&current) else {
            return current;
        };
        let total: f64 = row.iter().map(|(_, p)| p).sum();
        let mut roll = rng.gen::<f64>() * total;
        for &(state, prob) in row {
            roll -= prob;
            if roll <= 0.0 {
                return state;
            }
        }
        current
    }
}

struct StateCell {
    current: VehicleState,
    previous: Option<VehicleState>,
}

/// The operating-state holder.
///
/// Reads and transition writes go through an internal `RwLock`; a periodic
/// background trigger can request transitions concurrently with the control
/// loop reading the current state, and a cycle always sees a single
/// consistent value.
pub struct VehicleStateModel {
    cell: RwLock<StateCell>,
    table: TransitionTable,
    rng: Mutex<ChaCha8Rng>,
}

impl VehicleStateModel {
    /// Create a model in the given initial state with a seeded transition rng.
    pub fn new(initial: VehicleState, table: TransitionTable, seed: u64) -> Self {
        Self {
            cell: RwLock::new(StateCell {
                current: initial,
                previous: None,
            }),
            table,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    /// Snapshot of the current state.
    pub fn current_state(&self) -> VehicleState {
        self.cell.read().current
    }

    /// The state before the most recent transition, if any occurred.
    pub fn previous_state(&self) -> Option<VehicleState> {
        self.cell.read().previous
    }

    /// Apply a transition. With an explicit target the model adopts it
    /// unconditionally; without one the transition table picks the next
    /// state. Returns the transition that took place.
    pub fn request_transition(&self, target: Option<VehicleState>) -> Transition {
        let next = match target {
            Some(state) => state,
            None => {
                let current = self.current_state();
                let mut rng = self.rng.lock();
                self.table.sample(current, &mut rng)
            }
        };

        let mut cell = self.cell.write();
        let from = cell.current;
        if next != from {
            cell.previous = Some(from);
            cell.current = next;
            info!(from = %from, to = %next, "vehicle state changed");
        }
        Transition { from, to: next }
    }
}
