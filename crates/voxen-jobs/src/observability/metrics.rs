//! Zero-overhead metrics collection for scheduler instrumentation.
//!
//! With the `metrics` feature enabled the collector accumulates execution
//! counts and timings with relaxed atomics. Disabled, every method is an
//! empty `#[inline(always)]` stub the compiler removes entirely - the no-op
//! profiling hook the scheduler promises external collaborators.

// ============================================================================
// METRICS ENABLED
// ============================================================================
#[cfg(feature = "metrics")]
mod enabled {
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts and timings accumulated across the scheduler's lifetime.
    #[derive(Debug, Default)]
    pub struct MetricsCollector {
        /// Jobs executed to completion.
        pub jobs_executed: AtomicUsize,
        /// Jobs parked as continuations on an unmet dependency.
        pub jobs_deferred: AtomicUsize,
        /// Total job execution time in nanoseconds.
        pub execution_time_ns: AtomicU64,
        /// Longest single job execution in nanoseconds.
        pub max_execution_ns: AtomicU64,
    }

    impl MetricsCollector {
        pub fn new() -> Self {
            Self::default()
        }

        #[inline]
        pub fn record_execution(&self, duration: Duration) {
            let ns = duration.as_nanos() as u64;
            self.jobs_executed.fetch_add(1, Ordering::Relaxed);
            self.execution_time_ns.fetch_add(ns, Ordering::Relaxed);
            self.max_execution_ns.fetch_max(ns, Ordering::Relaxed);
        }

        #[inline]
        pub fn record_deferred(&self) {
            self.jobs_deferred.fetch_add(1, Ordering::Relaxed);
        }

        pub fn jobs_executed(&self) -> usize {
            self.jobs_executed.load(Ordering::Relaxed)
        }

        /// Mean execution time per job in microseconds.
        pub fn mean_execution_us(&self) -> f64 {
            let executed = self.jobs_executed.load(Ordering::Relaxed).max(1) as f64;
            self.execution_time_ns.load(Ordering::Relaxed) as f64 / 1000.0 / executed
        }

        /// Export metrics as a JSON value.
        pub fn to_json(&self) -> serde_json::Value {
            serde_json::json!({
                "jobs_executed": self.jobs_executed.load(Ordering::Relaxed),
                "jobs_deferred": self.jobs_deferred.load(Ordering::Relaxed),
                "mean_execution_us": self.mean_execution_us(),
                "max_execution_us": self.max_execution_ns.load(Ordering::Relaxed) as f64 / 1000.0,
            })
        }
    }
}

// ============================================================================
// METRICS DISABLED: empty stub that compiles to nothing
// ============================================================================
#[cfg(not(feature = "metrics"))]
mod disabled {
    use std::time::Duration;

    /// No-op metrics collector.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct MetricsCollector;

    impl MetricsCollector {
        #[inline(always)]
        pub fn new() -> Self {
            Self
        }

        #[inline(always)]
        pub fn record_execution(&self, _: Duration) {}

        #[inline(always)]
        pub fn record_deferred(&self) {}

        #[inline(always)]
        pub fn jobs_executed(&self) -> usize {
            0
        }

        #[inline(always)]
        pub fn mean_execution_us(&self) -> f64 {
            0.0
        }

        pub fn to_json(&self) -> serde_json::Value {
            serde_json::json!({})
        }
    }
}

#[cfg(feature = "metrics")]
pub use enabled::MetricsCollector;

#[cfg(not(feature = "metrics"))]
pub use disabled::MetricsCollector;
