//! Observability - stats snapshots and optional metrics for the scheduler.
//!
//! [`SchedulerStats`] is always available and feeds external consumers such
//! as a debug overlay. The [`MetricsCollector`] is feature-gated: with
//! `metrics` disabled every call compiles to nothing.

mod metrics;

pub use metrics::MetricsCollector;

use std::sync::atomic::Ordering;

use serde::{Deserialize, Serialize};

use crate::scheduler::queue::Priority;
use crate::scheduler::state::SchedulerState;

/// Upper bound on workers reported in a stats snapshot.
pub const MAX_TRACKED_WORKERS: usize = 64;

/// Point-in-time snapshot of scheduler health.
///
/// Queue depths are instantaneous; utilization percentages cover the window
/// since the previous snapshot (taking a snapshot resets the accumulators).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Size of the worker pool.
    pub worker_count: u32,
    /// Jobs waiting in the High tier.
    pub pending_high: u32,
    /// Jobs waiting in the Normal tier.
    pub pending_normal: u32,
    /// Jobs waiting in the Low tier.
    pub pending_low: u32,
    /// Jobs whose execution exceeded the stall threshold, since init.
    pub stall_warnings: u32,
    /// Per-worker busy percentage over the snapshot window, one entry per
    /// worker, at most [`MAX_TRACKED_WORKERS`].
    pub worker_utilization: Vec<f32>,
}

impl SchedulerStats {
    pub(crate) fn capture(state: &SchedulerState) -> Self {
        let tracked = state.worker_counters.len().min(MAX_TRACKED_WORKERS);
        let worker_utilization = state.worker_counters[..tracked]
            .iter()
            .map(|counters| {
                let busy = counters.busy_ns.swap(0, Ordering::Relaxed);
                let total = counters.total_ns.swap(0, Ordering::Relaxed);
                if total == 0 {
                    0.0
                } else {
                    (busy as f64 * 100.0 / total as f64) as f32
                }
            })
            .collect();

        Self {
            worker_count: state.worker_counters.len() as u32,
            pending_high: state.pending_count(Priority::High),
            pending_normal: state.pending_count(Priority::Normal),
            pending_low: state.pending_count(Priority::Low),
            stall_warnings: state.stall_warnings.load(Ordering::Relaxed),
            worker_utilization,
        }
    }
}
