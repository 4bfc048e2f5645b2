//! Configuration management
//!
//! This module handles loading and validation of orchestrator configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::vehicle::VehicleState;

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Control-loop settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// Shared network budget
    #[serde(default)]
    pub network: NetworkConfig,
    /// Vehicle state simulation settings
    #[serde(default)]
    pub vehicle: VehicleConfig,
    /// Per-node resource capacities
    #[serde(default)]
    pub node: NodeResourceConfig,
    /// User profile settings
    #[serde(default)]
    pub profiles: ProfilesConfig,
    /// Application catalog settings
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// Metrics output settings
    #[serde(default)]
    pub output: OutputConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.orchestrator.cycle_period_secs == 0 {
            anyhow::bail!("cycle_period_secs must be positive");
        }

        if self.orchestrator.duration_secs == 0 {
            anyhow::bail!("duration_secs must be positive");
        }

        let limit = self.network.bandwidth_limit_mbps;
        if !limit.is_finite() || limit <= 0.0 {
            anyhow::bail!("bandwidth_limit_mbps must be positive and finite");
        }

        if self.vehicle.state_change_interval_secs == 0 {
            anyhow::bail!("state_change_interval_secs must be positive");
        }

        if self.node.cpu_capacity_millis == 0 || self.node.memory_capacity_mib == 0 {
            anyhow::bail!("node capacities must be positive");
        }

        Ok(())
    }
}

/// Control-loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Seconds between control cycles
    pub cycle_period_secs: u64,
    /// Default run duration in seconds
    pub duration_secs: u64,
    /// Restrict every application to its preferred mode (no degradation)
    pub baseline: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cycle_period_secs: 8,
            duration_secs: 60,
            baseline: false,
        }
    }
}

/// Shared network budget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Global bandwidth capacity in Mbps, shared across all placed modes
    pub bandwidth_limit_mbps: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bandwidth_limit_mbps: 10.0,
        }
    }
}

/// Vehicle state simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleConfig {
    /// State the vehicle starts in
    pub initial_state: VehicleState,
    /// Seconds between simulated state-change triggers
    pub state_change_interval_secs: u64,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            initial_state: VehicleState::Parking,
            state_change_interval_secs: 10,
        }
    }
}

/// Per-node resource capacities for the simulated provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NodeResourceConfig {
    /// Node CPU capacity in millicores
    pub cpu_capacity_millis: u32,
    /// Node memory capacity in MiB
    pub memory_capacity_mib: u32,
}

impl Default for NodeResourceConfig {
    fn default() -> Self {
        Self {
            cpu_capacity_millis: 2000,
            memory_capacity_mib: 2048,
        }
    }
}

/// User profile configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilesConfig {
    /// Path to the named-profiles YAML file
    pub path: PathBuf,
    /// Profile to use for this run; `None` means built-in default weights
    #[serde(default)]
    pub profile: Option<String>,
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("config/user_profiles.yaml"),
            profile: None,
        }
    }
}

/// Application catalog configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Path to a catalog YAML file; `None` means the built-in catalog
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Metrics output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Whether CSV records are written at all
    pub enabled: bool,
    /// Per-cycle summary CSV path
    pub metrics_csv: PathBuf,
    /// Per-application decision trace CSV path
    pub trace_csv: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            metrics_csv: PathBuf::from("metrics.csv"),
            trace_csv: PathBuf::from("app_trace.csv"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter, overridable via `RUST_LOG`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}
