//! Mode catalog
//!
//! This module holds the static registry of applications. Each application
//! belongs to a category and carries an ordered list of fidelity modes, from
//! richest (rank 1) to most conservative (rank N). The catalog is validated
//! once at load time and never mutated afterwards.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{Category, OrchestratorError};

/// One discrete resource/quality tier an application can run at.
///
/// Modes are owned exclusively by their parent [`Application`] and are
/// immutable after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mode {
    /// Rank within the application, 1 = highest fidelity
    pub rank: u8,
    /// CPU request in millicores
    pub cpu: u32,
    /// Memory request in MiB
    pub memory: u32,
    /// Network bandwidth in Mbps, counted against the global budget
    pub bandwidth: f64,
    /// Non-negative quality score contributed when this mode runs
    pub ux_value: f64,
}

/// A catalog application: identity, category, priority, and its modes.
///
/// Priority convention: higher number = more critical = scheduled earlier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    /// Unique application name
    pub name: String,
    /// Category the application belongs to
    pub category: Category,
    /// Positive priority; higher means more critical
    pub priority: u32,
    /// Modes ordered from rank 1 (richest) to rank N (cheapest)
    pub modes: Vec<Mode>,
}

impl Application {
    /// Look up a mode by rank.
    pub fn mode(&self, rank: u8) -> Option<&Mode> {
        self.modes.iter().find(|m| m.rank == rank)
    }

    /// Validate the per-application invariants: a non-empty mode list with
    /// ranks 1..N and monotonically non-increasing cpu, bandwidth, and
    /// ux_value.
    fn validate(&self) -> Result<(), OrchestratorError> {
        if self.name.is_empty() {
            return Err(OrchestratorError::Config(
                "application with empty name".into(),
            ));
        }
        if self.priority == 0 {
            return Err(OrchestratorError::Config(format!(
                "{}: priority must be positive",
                self.name
            )));
        }
        if self.modes.is_empty() {
            return Err(OrchestratorError::Config(format!(
                "{}: empty mode list",
                self.name
            )));
        }
        for (i, mode) in self.modes.iter().enumerate() {
            if mode.rank as usize != i + 1 {
                return Err(OrchestratorError::Config(format!(
                    "{}: mode at position {} has rank {}, expected {}",
                    self.name,
                    i,
                    mode.rank,
                    i + 1
                )));
            }
            if mode.bandwidth < 0.0 || mode.ux_value < 0.0 {
                return Err(OrchestratorError::Config(format!(
                    "{}: mode {} has negative bandwidth or ux_value",
                    self.name, mode.rank
                )));
            }
        }
        for pair in self.modes.windows(2) {
            let (hi, lo) = (&pair[0], &pair[1]);
            if lo.cpu > hi.cpu || lo.bandwidth > hi.bandwidth || lo.ux_value > hi.ux_value {
                return Err(OrchestratorError::Config(format!(
                    "{}: modes {} -> {} violate monotonic degradation",
                    self.name, hi.rank, lo.rank
                )));
            }
        }
        Ok(())
    }
}

/// Immutable application registry, keyed by name.
#[derive(Debug, Clone)]
pub struct Catalog {
    apps: BTreeMap<String, Application>,
}

impl Catalog {
    /// Build a catalog from a list of applications, validating every entry.
    ///
    /// Fails with [`OrchestratorError::Config`] on an empty list, a duplicate
    /// name, or a mode list violating the monotonic-degradation invariant.
    /// This is a startup-time fatal condition, never a per-cycle one.
    pub fn from_apps(apps: Vec<Application>) -> Result<Self, OrchestratorError> {
        if apps.is_empty() {
            return Err(OrchestratorError::Config("empty catalog".into()));
        }
        let mut map = BTreeMap::new();
        for app in apps {
            app.validate()?;
            if map.insert(app.name.clone(), app.clone()).is_some() {
                return Err(OrchestratorError::Config(format!(
                    "duplicate application name: {}",
                    app.name
                )));
            }
        }
        Ok(Self { apps: map })
    }

    /// Load a catalog from a YAML file containing a list of applications.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read catalog file: {:?}", path.as_ref()))?;
        let apps: Vec<Application> =
            serde_yaml::from_str(&content).context("Failed to parse catalog YAML")?;
        Ok(Self::from_apps(apps)?)
    }

    /// The built-in testbench catalog: 9 applications across the three
    /// categories, two modes each (rank 1 = performance, rank 2 = eco).
    pub fn builtin() -> Self {
        let apps = vec![
            app("emergency_brake", Category::Safety, 10, [
                (400, 256, 3.0, 10.0),
                (200, 128, 1.5, 6.0),
            ]),
            app("collision_warning", Category::Safety, 9, [
                (300, 256, 2.5, 9.0),
                (150, 128, 1.3, 5.0),
            ]),
            app("lane_assist", Category::Safety, 8, [
                (250, 200, 2.0, 8.0),
                (125, 100, 1.0, 4.0),
            ]),
            app("climate_control", Category::Comfort, 6, [
                (300, 200, 2.0, 6.0),
                (150, 100, 1.0, 3.0),
            ]),
            app("seat_massage", Category::Comfort, 5, [
                (200, 150, 1.2, 5.0),
                (100, 75, 0.6, 2.0),
            ]),
            app("cabin_lighting", Category::Comfort, 3, [
                (100, 64, 0.5, 2.0),
                (50, 32, 0.25, 1.0),
            ]),
            app("music_player", Category::Infotainment, 4, [
                (200, 128, 1.5, 4.0),
                (100, 64, 0.8, 2.0),
            ]),
            app("video_streaming", Category::Infotainment, 7, [
                (300, 256, 3.0, 7.0),
                (150, 128, 1.5, 3.0),
            ]),
            app("navigation_display", Category::Infotainment, 6, [
                (250, 192, 2.2, 6.0),
                (125, 96, 1.1, 3.0),
            ]),
        ];
        // The built-in table is known-valid; a violation here is a programming
        // error, not a runtime condition.
        Self::from_apps(apps).expect("builtin catalog must validate")
    }

    /// Look up an application by name.
    pub fn lookup(&self, name: &str) -> Option<&Application> {
        self.apps.get(name)
    }

    /// Every application whose category is in the given set. No ordering
    /// guarantee; ordering is imposed by the scorer.
    pub fn apps_in_categories<'a, I>(&self, categories: I) -> Vec<&Application>
    where
        I: IntoIterator<Item = &'a Category>,
    {
        let set: Vec<Category> = categories.into_iter().copied().collect();
        self.apps
            .values()
            .filter(|a| set.contains(&a.category))
            .collect()
    }

    /// Number of applications in the catalog.
    pub fn len(&self) -> usize {
        self.apps.len()
    }

    /// Whether the catalog is empty (never true after a successful load).
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Iterate over all applications in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Application> {
        self.apps.values()
    }
}

fn app<const N: usize>(
    name: &str,
    category: Category,
    priority: u32,
    modes: [(u32, u32, f64, f64); N],
) -> Application {
    Application {
        name: name.into(),
        category,
        priority,
        modes: modes
            .iter()
            .enumerate()
            .map(|(i, &(cpu, memory, bandwidth, ux_value))| Mode {
                rank: (i + 1) as u8,
                cpu,
                memory,
                bandwidth,
                ux_value,
            })
            .collect(),
    }
}
