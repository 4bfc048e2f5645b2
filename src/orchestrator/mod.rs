//! Control loop
//!
//! This module provides the main `Orchestrator` struct that wires the
//! catalog, vehicle state model, allocation optimizer, reconciler, and the
//! deployment and metrics sinks into a periodic cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::deploy::{DeploymentSink, LoggingDeploymentSink};
use crate::metrics::{
    CsvMetricsSink, MetricsCollector, MetricsSink, NullMetricsSink, OrchestratorResults,
};
use crate::optimizer::Optimizer;
use crate::profile::{self, WeightTable, YamlProfileSource};
use crate::reconciler::Reconciler;
use crate::resources::{ResourceProvider, SimulatedResourceProvider};
use crate::vehicle::{StateRequirementMap, TransitionTable, VehicleStateModel};

/// Handle for controlling the orchestrator from external code
#[derive(Clone)]
pub struct OrchestratorHandle {
    shutdown_tx: Arc<RwLock<Option<oneshot::Sender<()>>>>,
    running: Arc<AtomicBool>,
}

impl OrchestratorHandle {
    /// Signal the orchestrator to shut down after the current cycle
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(tx) = self.shutdown_tx.write().take() {
            let _ = tx.send(());
        }
    }

    /// Check if the orchestrator is still running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Main orchestrator struct
pub struct Orchestrator {
    /// Configuration
    config: Config,

    /// Application catalog
    catalog: Catalog,

    /// Resolved category weights for this run
    weights: WeightTable,

    /// State to required-application mapping
    requirements: StateRequirementMap,

    /// Allocation optimizer
    optimizer: Optimizer,

    /// Vehicle operating-state model
    vehicle: Arc<VehicleStateModel>,

    /// Resource availability oracle
    resources: Box<dyn ResourceProvider + Send + Sync>,

    /// Active-set reconciler
    reconciler: Reconciler,

    /// Deployment sink
    deploy: Box<dyn DeploymentSink + Send + Sync>,

    /// Per-cycle metrics sink
    metrics_sink: Box<dyn MetricsSink + Send + Sync>,

    /// Run-level aggregates
    collector: Arc<MetricsCollector>,

    /// Shutdown channel
    shutdown_rx: Option<oneshot::Receiver<()>>,

    /// Orchestrator handle
    handle: OrchestratorHandle,

    /// Cycle counter
    cycle: u64,
}

impl Orchestrator {
    /// Create a new orchestrator from validated configuration. `seed` fixes
    /// the state-transition and resource-sampling rngs for reproducible runs.
    pub fn new(config: Config, seed: u64) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        info!(seed, "Initializing orchestrator");

        let catalog = match &config.catalog.path {
            Some(path) => Catalog::from_file(path).context("Failed to load catalog")?,
            None => Catalog::builtin(),
        };
        info!(applications = catalog.len(), "Catalog loaded");

        let source = YamlProfileSource::new(&config.profiles.path);
        let weights = profile::resolve(&source, config.profiles.profile.as_deref());

        let optimizer = Optimizer::new(
            config.network.bandwidth_limit_mbps,
            config.orchestrator.baseline,
        );

        let vehicle = Arc::new(VehicleStateModel::new(
            config.vehicle.initial_state,
            TransitionTable::builtin(),
            seed,
        ));

        let resources = Box::new(SimulatedResourceProvider::new(
            config.node,
            seed.wrapping_add(1),
        ));

        let metrics_sink: Box<dyn MetricsSink + Send + Sync> = if config.output.enabled {
            Box::new(
                CsvMetricsSink::new(&config.output.metrics_csv, &config.output.trace_csv)
                    .context("Failed to create metrics CSV files")?,
            )
        } else {
            Box::new(NullMetricsSink)
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = OrchestratorHandle {
            shutdown_tx: Arc::new(RwLock::new(Some(shutdown_tx))),
            running: Arc::new(AtomicBool::new(true)),
        };

        Ok(Self {
            config,
            catalog,
            weights,
            requirements: StateRequirementMap::builtin(),
            optimizer,
            vehicle,
            resources,
            reconciler: Reconciler::new(),
            deploy: Box::new(LoggingDeploymentSink),
            metrics_sink,
            collector: Arc::new(MetricsCollector::new()),
            shutdown_rx: Some(shutdown_rx),
            handle,
            cycle: 0,
        })
    }

    /// Get a handle for external control
    pub fn handle(&self) -> OrchestratorHandle {
        self.handle.clone()
    }

    /// The vehicle state model, shared with the state-change timer.
    pub fn vehicle(&self) -> Arc<VehicleStateModel> {
        Arc::clone(&self.vehicle)
    }

    /// Replace the deployment sink (tests, alternative backends).
    pub fn set_deployment_sink(&mut self, sink: Box<dyn DeploymentSink + Send + Sync>) {
        self.deploy = sink;
    }

    /// Replace the resource provider (tests, real telemetry).
    pub fn set_resource_provider(&mut self, provider: Box<dyn ResourceProvider + Send + Sync>) {
        self.resources = provider;
    }

    /// Replace the per-cycle metrics sink.
    pub fn set_metrics_sink(&mut self, sink: Box<dyn MetricsSink + Send + Sync>) {
        self.metrics_sink = sink;
    }

    /// Run the control loop until `duration` elapses or the handle signals
    /// shutdown. The first cycle executes immediately.
    pub async fn run(&mut self, duration: Duration) -> Result<()> {
        let mut shutdown_rx = self
            .shutdown_rx
            .take()
            .context("Orchestrator already ran")?;

        let cycle_period = Duration::from_secs(self.config.orchestrator.cycle_period_secs);
        let mut cycle_timer = tokio::time::interval(cycle_period);

        // Independent timer mutating the vehicle state between cycles.
        let vehicle = Arc::clone(&self.vehicle);
        let collector = Arc::clone(&self.collector);
        let state_interval = Duration::from_secs(self.config.vehicle.state_change_interval_secs);
        let state_task = tokio::spawn(async move {
            let mut timer = tokio::time::interval(state_interval);
            timer.tick().await;
            loop {
                timer.tick().await;
                let transition = vehicle.request_transition(None);
                if transition.from != transition.to {
                    collector.record_state_change();
                }
            }
        });

        info!(
            period_secs = cycle_period.as_secs(),
            duration_secs = duration.as_secs(),
            baseline = self.optimizer.is_baseline(),
            "Control loop started"
        );

        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    info!("Run duration elapsed");
                    break;
                }
                _ = &mut shutdown_rx => {
                    info!("Shutdown requested");
                    break;
                }
                _ = cycle_timer.tick() => {
                    self.run_cycle();
                }
            }
        }

        state_task.abort();
        self.handle.running.store(false, Ordering::SeqCst);
        info!(cycles = self.cycle, "Control loop stopped");
        Ok(())
    }

    /// Execute one plan-reconcile-apply-record cycle.
    fn run_cycle(&mut self) {
        let state = self.vehicle.current_state();
        let plan_start = std::time::Instant::now();
        let plan = self.optimizer.plan(
            state,
            &self.catalog,
            &self.weights,
            &self.requirements,
            self.resources.as_ref(),
        );
        let plan_time_us = plan_start.elapsed().as_micros() as f64;

        let diff = self.reconciler.plan_diff(&plan);
        let applied = self.deploy.apply(&diff);
        for failure in &applied.failures {
            warn!(app = %failure.app_name, reason = %failure.reason, "start failed");
        }
        self.reconciler.commit(&diff, &applied.failed_names());

        self.collector.record_cycle(&plan, &applied, plan_time_us);
        // A sink write failure never blocks the next cycle.
        if let Err(e) = self.metrics_sink.record_cycle(self.cycle, &plan, &applied) {
            warn!(error = %e, "metrics sink write failed");
        }

        info!(
            cycle = self.cycle,
            state = %state,
            placed = plan.placed().count(),
            rejected = plan.rejected().count(),
            bandwidth_mbps = plan.total_bandwidth,
            ux = plan.total_ux,
            "cycle complete"
        );
        self.cycle += 1;
    }

    /// Collect final run results
    pub fn collect_results(&self) -> OrchestratorResults {
        self.collector.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::FixedResourceProvider;
    use crate::vehicle::VehicleState;

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.output.enabled = false;
        config
    }

    #[tokio::test]
    async fn test_orchestrator_creation() {
        let orchestrator = Orchestrator::new(quiet_config(), 42);
        assert!(orchestrator.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = quiet_config();
        config.orchestrator.cycle_period_secs = 0;
        assert!(Orchestrator::new(config, 42).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_executes_cycles() {
        let mut orchestrator = Orchestrator::new(quiet_config(), 42).unwrap();
        orchestrator.set_resource_provider(Box::new(FixedResourceProvider::always_ok()));

        orchestrator.run(Duration::from_secs(20)).await.unwrap();

        let results = orchestrator.collect_results();
        // Cycle period 8s: cycles at t=0, 8, 16.
        assert!(results.cycles >= 2);
        assert!(results.decisions_total > 0);
        assert!(!orchestrator.handle().is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_run() {
        let mut orchestrator = Orchestrator::new(quiet_config(), 42).unwrap();
        let handle = orchestrator.handle();
        handle.shutdown();

        orchestrator.run(Duration::from_secs(3600)).await.unwrap();
        assert!(!handle.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_emergency_state_drops_infotainment() {
        let mut orchestrator = Orchestrator::new(quiet_config(), 42).unwrap();
        orchestrator.set_resource_provider(Box::new(FixedResourceProvider::always_ok()));
        orchestrator
            .vehicle()
            .request_transition(Some(VehicleState::Emergency));

        // Single cycle; the state timer (10s) never fires within 1s.
        orchestrator.run(Duration::from_secs(1)).await.unwrap();

        let results = orchestrator.collect_results();
        assert!(results.cycles >= 1);
        // Emergency requires the three safety applications only.
        assert_eq!(results.decisions_total / results.cycles, 3);
    }
}
