//! Profile weights
//!
//! Per-category multipliers used by the optimizer's scorer. A named user
//! profile can override the built-in defaults; a missing or unreadable
//! profile is a warning, never a fatal condition.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::Category;

/// Built-in default weights: safety > comfort > infotainment.
const DEFAULT_WEIGHTS: [(Category, f64); 3] = [
    (Category::Safety, 3.0),
    (Category::Comfort, 2.0),
    (Category::Infotainment, 1.0),
];

/// Read-only category → multiplier table, fixed for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    weights: HashMap<Category, f64>,
}

impl WeightTable {
    /// Build a table from explicit per-category weights.
    pub fn new(weights: HashMap<Category, f64>) -> Self {
        Self { weights }
    }

    /// Multiplier for a category. Absence of a configured weight defaults
    /// to 1.0 per the scoring contract.
    pub fn weight(&self, category: Category) -> f64 {
        self.weights.get(&category).copied().unwrap_or(1.0)
    }

    /// Whether every configured weight is strictly positive.
    pub fn is_valid(&self) -> bool {
        self.weights.values().all(|&w| w > 0.0)
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            weights: DEFAULT_WEIGHTS.into_iter().collect(),
        }
    }
}

/// External source of named weight profiles.
pub trait ProfileSource {
    /// Load the named profile, returning `Ok(None)` when the name is unknown.
    fn load(&self, name: &str) -> Result<Option<WeightTable>>;
}

/// Profile source backed by a YAML file of the shape
/// `{profile_name: {category: weight}}`.
#[derive(Debug, Clone)]
pub struct YamlProfileSource {
    path: PathBuf,
}

impl YamlProfileSource {
    /// Create a source reading from the given file path.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ProfileSource for YamlProfileSource {
    fn load(&self, name: &str) -> Result<Option<WeightTable>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read profiles file: {:?}", self.path))?;
        let profiles: HashMap<String, HashMap<Category, f64>> =
            serde_yaml::from_str(&content).context("Failed to parse profiles YAML")?;
        Ok(profiles.get(name).cloned().map(WeightTable::new))
    }
}

/// Resolve the weight table for a run.
///
/// Without a profile name the built-in defaults are returned. With a name,
/// a missing source, an unknown name, or an invalid table falls back to the
/// defaults with a warning; this never aborts the run.
pub fn resolve(source: &dyn ProfileSource, profile_name: Option<&str>) -> WeightTable {
    let Some(name) = profile_name else {
        info!("UX profile: built-in default weights");
        return WeightTable::default();
    };

    match source.load(name) {
        Ok(Some(table)) if table.is_valid() => {
            info!(profile = name, "UX profile loaded");
            table
        }
        Ok(Some(_)) => {
            warn!(
                profile = name,
                "profile contains non-positive weights, using defaults"
            );
            WeightTable::default()
        }
        Ok(None) => {
            warn!(profile = name, "unknown profile, using defaults");
            WeightTable::default()
        }
        Err(e) => {
            warn!(profile = name, error = %e, "profile source unavailable, using defaults");
            WeightTable::default()
        }
    }
}
