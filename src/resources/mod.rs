//! Resource availability
//!
//! Boundary trait answering "can the node serving this category satisfy a
//! requirement right now", plus the simulated provider used by the testbench.
//! The optimizer treats the provider as a boolean oracle with a snapshot;
//! retry policy, if any, belongs to the provider itself.

use parking_lot::Mutex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::NodeResourceConfig;
use crate::Category;

/// Resource requirement of a single application mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceRequest {
    /// CPU in millicores
    pub cpu: u32,
    /// Memory in MiB
    pub memory: u32,
    /// Network bandwidth in Mbps
    pub bandwidth: f64,
}

/// Node resource availability observed at check time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Available CPU in millicores
    pub cpu_available: f64,
    /// Available memory in MiB
    pub memory_available: f64,
    /// Available link bandwidth in Mbps
    pub bandwidth_available: f64,
}

/// Result of a single availability check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceCheck {
    /// Whether the requirement can be satisfied right now
    pub ok: bool,
    /// The availability snapshot the answer was based on
    pub snapshot: ResourceSnapshot,
}

/// External capability answering per-node availability questions.
///
/// Each call is synchronous and blocking for its duration; the optimizer
/// never retries a failed check within a cycle.
pub trait ResourceProvider {
    /// Check whether the node serving `category` can satisfy `request`.
    fn check(&self, category: Category, request: &ResourceRequest) -> ResourceCheck;
}

/// Simulated provider sampling node utilization each call, in place of a
/// real telemetry source.
///
/// CPU utilization is drawn from U(20%, 80%), memory from U(30%, 70%), and
/// the per-node link from U(5, 10) Mbps, against the configured node
/// capacities. Seeded for reproducible runs.
pub struct SimulatedResourceProvider {
    node: NodeResourceConfig,
    rng: Mutex<ChaCha8Rng>,
}

impl SimulatedResourceProvider {
    /// Create a provider for the given node capacities with a fixed seed.
    pub fn new(node: NodeResourceConfig, seed: u64) -> Self {
        Self {
            node,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    fn sample(&self) -> ResourceSnapshot {
        let mut rng = self.rng.lock();
        let cpu_used = rng.gen_range(0.20..0.80);
        let mem_used = rng.gen_range(0.30..0.70);
        let link = rng.gen_range(5.0..10.0);
        ResourceSnapshot {
            cpu_available: self.node.cpu_capacity_millis as f64 * (1.0 - cpu_used),
            memory_available: self.node.memory_capacity_mib as f64 * (1.0 - mem_used),
            bandwidth_available: link,
        }
    }
}

impl ResourceProvider for SimulatedResourceProvider {
    fn check(&self, _category: Category, request: &ResourceRequest) -> ResourceCheck {
        let snapshot = self.sample();
        let ok = snapshot.cpu_available >= request.cpu as f64
            && snapshot.memory_available >= request.memory as f64
            && snapshot.bandwidth_available >= request.bandwidth;
        ResourceCheck { ok, snapshot }
    }
}

/// Provider answering every check with a fixed verdict. Used in tests and
/// dry runs where node telemetry is out of scope.
#[derive(Debug, Clone, Copy)]
pub struct FixedResourceProvider {
    ok: bool,
}

impl FixedResourceProvider {
    /// A provider that always admits.
    pub fn always_ok() -> Self {
        Self { ok: true }
    }

    /// A provider that always refuses.
    pub fn always_fail() -> Self {
        Self { ok: false }
    }
}

impl ResourceProvider for FixedResourceProvider {
    fn check(&self, _category: Category, _request: &ResourceRequest) -> ResourceCheck {
        ResourceCheck {
            ok: self.ok,
            snapshot: ResourceSnapshot {
                cpu_available: f64::MAX,
                memory_available: f64::MAX,
                bandwidth_available: f64::MAX,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(cpu: u32, memory: u32, bandwidth: f64) -> ResourceRequest {
        ResourceRequest {
            cpu,
            memory,
            bandwidth,
        }
    }

    #[test]
    fn test_simulated_provider_bounds() {
        let provider = SimulatedResourceProvider::new(NodeResourceConfig::default(), 42);
        for _ in 0..100 {
            let check = provider.check(Category::Safety, &request(100, 64, 1.0));
            let snap = check.snapshot;
            assert!(snap.cpu_available > 0.0);
            assert!(snap.memory_available > 0.0);
            assert!((5.0..10.0).contains(&snap.bandwidth_available));
        }
    }

    #[test]
    fn test_simulated_provider_is_seeded() {
        let a = SimulatedResourceProvider::new(NodeResourceConfig::default(), 7);
        let b = SimulatedResourceProvider::new(NodeResourceConfig::default(), 7);
        for _ in 0..20 {
            let req = request(200, 128, 2.0);
            assert_eq!(
                a.check(Category::Comfort, &req).snapshot,
                b.check(Category::Comfort, &req).snapshot
            );
        }
    }

    #[test]
    fn test_oversized_request_refused() {
        let provider = SimulatedResourceProvider::new(NodeResourceConfig::default(), 42);
        let huge = request(u32::MAX, u32::MAX, 1000.0);
        assert!(!provider.check(Category::Safety, &huge).ok);
    }

    #[test]
    fn test_fixed_provider() {
        let ok = FixedResourceProvider::always_ok();
        let fail = FixedResourceProvider::always_fail();
        let req = request(1, 1, 0.1);
        assert!(ok.check(Category::Safety, &req).ok);
        assert!(!fail.check(Category::Safety, &req).ok);
    }
}
