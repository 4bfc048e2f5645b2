//! Deployment sink
//!
//! Boundary through which reconciliation diffs are realized. The built-in
//! sink logs the start/stop actions it would perform; a real backend would
//! talk to the in-vehicle runtime instead.

use tracing::info;

use crate::reconciler::ReconcileDiff;

/// One start that the sink could not perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployFailure {
    /// Application the failure concerns
    pub app_name: String,
    /// Sink-reported reason
    pub reason: String,
}

/// What actually happened when a diff was applied. Partial failure is
/// reported per item, never as an all-or-nothing error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedResult {
    /// Applications started, in apply order
    pub started: Vec<String>,
    /// Applications stopped, in apply order
    pub stopped: Vec<String>,
    /// Starts that failed
    pub failures: Vec<DeployFailure>,
}

impl AppliedResult {
    /// Names of the failed starts, for feeding back into the reconciler.
    pub fn failed_names(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.app_name.clone()).collect()
    }
}

/// External capability that realizes start/stop actions.
///
/// Stops are applied before starts so a mode change never has two instances
/// of the same application live at once.
pub trait DeploymentSink {
    /// Apply the diff, reporting per-item outcomes.
    fn apply(&self, diff: &ReconcileDiff) -> AppliedResult;
}

/// Sink that records the actions in the structured log and always succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDeploymentSink;

impl DeploymentSink for LoggingDeploymentSink {
    fn apply(&self, diff: &ReconcileDiff) -> AppliedResult {
        let mut result = AppliedResult::default();
        for name in &diff.to_stop {
            info!(app = %name, "stopping application");
            result.stopped.push(name.clone());
        }
        for item in &diff.to_start {
            info!(app = %item.app_name, mode = item.mode_rank, "starting application");
            result.started.push(item.app_name.clone());
        }
        result
    }
}
