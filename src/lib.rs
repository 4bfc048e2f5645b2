//! # SDV Orchestrator
//!
//! State-Aware Application Orchestrator for Software-Defined Vehicles with
//! UX-Aware Admission Control and Graceful Mode Degradation.
//!
//! This crate decides, once per cycle, which vehicle applications should run
//! and at which fidelity mode, subject to a shared network bandwidth budget
//! and per-node resource availability.
//!
//! ## Features
//!
//! - **State-Aware Selection**: required application sets follow the vehicle
//!   operating state (driving, parking, charging, emergency)
//! - **UX-Aware Scoring**: priority × category weight ordering with optional
//!   user profiles
//! - **Graceful Degradation**: per-application fallback through cheaper
//!   fidelity modes before rejection
//! - **Idempotent Reconciliation**: pure diffing against the previously
//!   active application set
//!
//! ## Example
//!
//! ```rust,no_run
//! use sdv_orchestrator::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load configuration
//!     let config = Config::from_file("config/default.yaml")?;
//!
//!     // Create the orchestrator with a fixed seed for reproducibility
//!     let mut orchestrator = Orchestrator::new(config, 42)?;
//!
//!     // Run the control loop for one minute
//!     orchestrator.run(std::time::Duration::from_secs(60)).await?;
//!
//!     let results = orchestrator.collect_results();
//!     println!("Cycles executed: {}", results.cycles);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The orchestrator consists of five main components:
//!
//! 1. **Mode Catalog** (`catalog` module): immutable registry of applications
//!    with ordered fidelity modes, validated once at load time.
//!
//! 2. **Vehicle Operating-State Model** (`vehicle` module): the current
//!    vehicle state plus the static mapping from state to required
//!    applications, mutated by an independent timer.
//!
//! 3. **Allocation Optimizer** (`optimizer` module): the greedy,
//!    priority-monotone admission algorithm with ordered mode degradation
//!    under a global bandwidth budget.
//!
//! 4. **Reconciler** (`reconciler` module): computes the start/stop diff
//!    between the previously active set and the new plan.
//!
//! 5. **Sinks** (`deploy`, `metrics` modules): boundary traits realizing the
//!    plan and persisting per-cycle records.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod catalog;
pub mod config;
pub mod deploy;
pub mod metrics;
pub mod optimizer;
pub mod orchestrator;
pub mod profile;
pub mod reconciler;
pub mod resources;
pub mod vehicle;

// Re-export commonly used types
pub use catalog::{Application, Catalog, Mode};
pub use config::Config;
pub use deploy::{AppliedResult, DeploymentSink, LoggingDeploymentSink};
pub use metrics::{CsvMetricsSink, MetricsCollector, MetricsSink, OrchestratorResults};
pub use optimizer::{AllocationDecision, CyclePlan, Optimizer, Outcome};
pub use orchestrator::{Orchestrator, OrchestratorHandle};
pub use profile::{ProfileSource, WeightTable, YamlProfileSource};
pub use reconciler::{ActiveSet, ReconcileDiff, Reconciler};
pub use resources::{ResourceCheck, ResourceProvider, ResourceRequest, SimulatedResourceProvider};
pub use vehicle::{StateRequirementMap, VehicleState, VehicleStateModel};

/// Application categories, ordered from most to least critical.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Safety-critical functions (braking, collision warning)
    Safety,
    /// Cabin comfort functions (climate, seats, lighting)
    Comfort,
    /// Infotainment functions (media, navigation display)
    Infotainment,
}

impl Category {
    /// All categories in criticality order.
    pub const ALL: [Category; 3] = [Category::Safety, Category::Comfort, Category::Infotainment];

    /// Stable lowercase name, used in trace records and node labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Safety => "safety",
            Category::Comfort => "comfort",
            Category::Infotainment => "infotainment",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "safety" => Ok(Category::Safety),
            "comfort" => Ok(Category::Comfort),
            "infotainment" => Ok(Category::Infotainment),
            other => Err(OrchestratorError::Config(format!(
                "unknown category: {other}"
            ))),
        }
    }
}

/// Error types for the orchestrator
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Configuration or catalog validation error (fatal, startup only)
    #[error("configuration error: {0}")]
    Config(String),

    /// Deployment sink failed for a single item (recoverable, per-item)
    #[error("deployment failure for {app}: {reason}")]
    Deploy {
        /// Application the sink failed on
        app: String,
        /// Sink-reported failure description
        reason: String,
    },

    /// Metrics sink write failure (recoverable, never blocks the next cycle)
    #[error("metrics sink failure: {0}")]
    Metrics(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AllocationDecision, Application, Catalog, Category, Config, CyclePlan, Mode, Optimizer,
        Orchestrator, OrchestratorError, Outcome, ReconcileDiff, Reconciler, VehicleState,
        VehicleStateModel, WeightTable,
    };
}
