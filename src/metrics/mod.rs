//! Metrics collection and reporting
//!
//! Per-cycle CSV records for offline analysis plus an in-memory collector
//! that aggregates run-level results. A sink write failure is surfaced to
//! the caller but must never block the next cycle.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::deploy::AppliedResult;
use crate::optimizer::{CyclePlan, Outcome};

/// Boundary through which per-cycle records leave the process.
pub trait MetricsSink {
    /// Persist one cycle: the plan summary and what the deployment sink did.
    fn record_cycle(
        &self,
        cycle: u64,
        plan: &CyclePlan,
        applied: &AppliedResult,
    ) -> anyhow::Result<()>;
}

/// Sink writing two CSV files: a per-cycle summary and a per-application
/// decision trace.
pub struct CsvMetricsSink {
    metrics: Mutex<BufWriter<File>>,
    trace: Mutex<BufWriter<File>>,
}

impl CsvMetricsSink {
    /// Create the sink, truncating both files and writing headers.
    pub fn new<P: AsRef<Path>>(metrics_path: P, trace_path: P) -> anyhow::Result<Self> {
        let mut metrics = BufWriter::new(File::create(metrics_path)?);
        writeln!(
            metrics,
            "timestamp,vehicle_state,apps_deployed,failed_apps,\
             total_cpu_millis,total_memory_mib,total_bandwidth_mbps,global_ux,mode"
        )?;

        let mut trace = BufWriter::new(File::create(trace_path)?);
        writeln!(
            trace,
            "cycle,vehicle_state,app_name,category,score,deployed,reason,mode"
        )?;

        Ok(Self {
            metrics: Mutex::new(metrics),
            trace: Mutex::new(trace),
        })
    }
}

impl MetricsSink for CsvMetricsSink {
    fn record_cycle(
        &self,
        cycle: u64,
        plan: &CyclePlan,
        applied: &AppliedResult,
    ) -> anyhow::Result<()> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let mode = if plan.baseline { "baseline" } else { "optimized" };
        let deployed = plan.placed().count() - applied.failures.len();

        {
            let mut w = self.metrics.lock();
            writeln!(
                w,
                "{:.3},{},{},{},{},{},{:.3},{:.3},{}",
                timestamp,
                plan.vehicle_state,
                deployed,
                applied.failures.len(),
                plan.total_cpu,
                plan.total_memory,
                plan.total_bandwidth,
                plan.total_ux,
                mode
            )?;
            w.flush()?;
        }

        {
            let mut w = self.trace.lock();
            for decision in &plan.decisions {
                let mode = decision
                    .chosen_mode
                    .map(|r| r.to_string())
                    .unwrap_or_default();
                writeln!(
                    w,
                    "{},{},{},{},{:.3},{},{},{}",
                    cycle,
                    plan.vehicle_state,
                    decision.app_name,
                    decision.category,
                    decision.score,
                    decision.is_placed(),
                    decision.reason,
                    mode
                )?;
            }
            w.flush()?;
        }

        Ok(())
    }
}

/// Sink that discards every record. Used in dry runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMetricsSink;

impl MetricsSink for NullMetricsSink {
    fn record_cycle(
        &self,
        _cycle: u64,
        _plan: &CyclePlan,
        _applied: &AppliedResult,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Final run results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorResults {
    /// Control cycles executed
    pub cycles: u64,
    /// Allocation decisions across all cycles
    pub decisions_total: u64,
    /// Decisions placed at the preferred mode
    pub selected: u64,
    /// Decisions placed at a degraded mode
    pub downgraded: u64,
    /// Decisions rejected
    pub rejected: u64,
    /// Starts the deployment sink failed on
    pub deploy_failures: u64,
    /// Vehicle state changes observed
    pub state_changes: u64,
    /// Mean per-cycle global UX value
    pub ux_mean: f64,
    /// Lowest per-cycle global UX value
    pub ux_min: f64,
    /// Highest per-cycle global UX value
    pub ux_max: f64,
    /// Mean committed bandwidth per cycle, Mbps
    pub bandwidth_mean_mbps: f64,
    /// Peak committed bandwidth, Mbps
    pub bandwidth_peak_mbps: f64,
    /// Mean time spent computing a plan, microseconds
    pub plan_time_mean_us: f64,
    /// Wall-clock duration of the run, seconds
    pub elapsed_secs: f64,
}

impl OrchestratorResults {
    /// Write results to JSON file
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// In-memory aggregator updated once per cycle.
pub struct MetricsCollector {
    start_time: Instant,
    cycles: AtomicU64,
    selected: AtomicU64,
    downgraded: AtomicU64,
    rejected: AtomicU64,
    deploy_failures: AtomicU64,
    state_changes: AtomicU64,
    ux_values: RwLock<Vec<f64>>,
    bandwidth_values: RwLock<Vec<f64>>,
    plan_times_us: RwLock<Vec<f64>>,
}

impl MetricsCollector {
    /// Create an empty collector; the run clock starts now.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: AtomicU64::new(0),
            selected: AtomicU64::new(0),
            downgraded: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            deploy_failures: AtomicU64::new(0),
            state_changes: AtomicU64::new(0),
            ux_values: RwLock::new(Vec::new()),
            bandwidth_values: RwLock::new(Vec::new()),
            plan_times_us: RwLock::new(Vec::new()),
        }
    }

    /// Fold one cycle into the aggregates. `plan_time_us` is the time the
    /// optimizer spent computing the plan.
    pub fn record_cycle(&self, plan: &CyclePlan, applied: &AppliedResult, plan_time_us: f64) {
        self.cycles.fetch_add(1, Ordering::SeqCst);
        for decision in &plan.decisions {
            match decision.outcome {
                Outcome::Selected => self.selected.fetch_add(1, Ordering::SeqCst),
                Outcome::Downgraded => self.downgraded.fetch_add(1, Ordering::SeqCst),
                Outcome::Rejected => self.rejected.fetch_add(1, Ordering::SeqCst),
            };
        }
        self.deploy_failures
            .fetch_add(applied.failures.len() as u64, Ordering::SeqCst);
        self.ux_values.write().push(plan.total_ux);
        self.bandwidth_values.write().push(plan.total_bandwidth);
        self.plan_times_us.write().push(plan_time_us);
    }

    /// Count one vehicle state change.
    pub fn record_state_change(&self) {
        self.state_changes.fetch_add(1, Ordering::SeqCst);
    }

    /// Cycles recorded so far.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    /// Produce the final run results.
    pub fn finalize(&self) -> OrchestratorResults {
        let selected = self.selected.load(Ordering::SeqCst);
        let downgraded = self.downgraded.load(Ordering::SeqCst);
        let rejected = self.rejected.load(Ordering::SeqCst);

        let ux = self.ux_values.read();
        let bandwidth = self.bandwidth_values.read();

        OrchestratorResults {
            cycles: self.cycles.load(Ordering::SeqCst),
            decisions_total: selected + downgraded + rejected,
            selected,
            downgraded,
            rejected,
            deploy_failures: self.deploy_failures.load(Ordering::SeqCst),
            state_changes: self.state_changes.load(Ordering::SeqCst),
            ux_mean: mean(&ux),
            ux_min: if ux.is_empty() {
                0.0
            } else {
                ux.iter().cloned().fold(f64::INFINITY, f64::min)
            },
            ux_max: ux.iter().cloned().fold(0.0f64, f64::max),
            bandwidth_mean_mbps: mean(&bandwidth),
            bandwidth_peak_mbps: bandwidth.iter().cloned().fold(0.0f64, f64::max),
            plan_time_mean_us: mean(&self.plan_times_us.read()),
            elapsed_secs: self.start_time.elapsed().as_secs_f64(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
