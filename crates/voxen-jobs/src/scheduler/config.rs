//! Scheduler configuration.
//!
//! Read once at [`JobScheduler::init`](crate::JobScheduler::init) and
//! immutable for the scheduler's lifetime.

use serde::{Deserialize, Serialize};

/// Most worker threads a pool will ever run.
pub const MAX_WORKER_THREADS: usize = 64;

/// Smallest per-tier queue capacity; lower requests are raised to this.
pub const MIN_QUEUE_CAPACITY: u32 = 64;

/// Configuration for the job scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Worker thread count.
    ///
    /// `None` resolves to hardware concurrency minus two (leaving headroom
    /// for the main and render threads), clamped to `[1, 64]`.
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// Capacity of each priority queue.
    ///
    /// Rounded down to a power of two; values below 64 are raised to 64.
    ///
    /// Default: 4096
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: u32,

    /// Execution time in milliseconds beyond which a completed job is
    /// reported as stalled. Diagnostic only; jobs are never interrupted.
    ///
    /// Default: 100ms
    #[serde(default = "default_stall_warn_ms")]
    pub stall_warn_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            queue_capacity: default_queue_capacity(),
            stall_warn_ms: default_stall_warn_ms(),
        }
    }
}

impl SchedulerConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an explicit worker thread count.
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = Some(worker_threads);
        self
    }

    /// Set the per-tier queue capacity.
    pub fn with_queue_capacity(mut self, queue_capacity: u32) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Set the stall warning threshold.
    pub fn with_stall_warn_ms(mut self, stall_warn_ms: u64) -> Self {
        self.stall_warn_ms = stall_warn_ms;
        self
    }

    /// Validate the configuration.
    ///
    /// Returns an error if a value cannot be made usable by clamping.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_threads == Some(0) {
            return Err("worker_threads must be > 0".to_string());
        }
        Ok(())
    }

    /// Worker count after applying the default and the `[1, 64]` clamp.
    pub fn resolved_worker_threads(&self) -> usize {
        let requested = self.worker_threads.unwrap_or_else(|| {
            let hc = num_cpus::get().max(1);
            hc.saturating_sub(2).max(1)
        });
        requested.clamp(1, MAX_WORKER_THREADS)
    }

    /// Queue capacity after applying the minimum floor.
    ///
    /// Power-of-two rounding happens at queue construction.
    pub fn effective_queue_capacity(&self) -> u32 {
        self.queue_capacity.max(MIN_QUEUE_CAPACITY)
    }
}

// Default functions for serde
fn default_queue_capacity() -> u32 {
    4096
}

fn default_stall_warn_ms() -> u64 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.queue_capacity, 4096);
        assert_eq!(config.stall_warn_ms, 100);
        assert!(config.validate().is_ok());
        let workers = config.resolved_worker_threads();
        assert!((1..=MAX_WORKER_THREADS).contains(&workers));
    }

    #[test]
    fn test_builder_pattern() {
        let config = SchedulerConfig::new()
            .with_worker_threads(8)
            .with_queue_capacity(1024)
            .with_stall_warn_ms(250);

        assert_eq!(config.worker_threads, Some(8));
        assert_eq!(config.queue_capacity, 1024);
        assert_eq!(config.stall_warn_ms, 250);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_zero_workers() {
        let config = SchedulerConfig::new().with_worker_threads(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_worker_clamp() {
        let config = SchedulerConfig::new().with_worker_threads(10_000);
        assert_eq!(config.resolved_worker_threads(), MAX_WORKER_THREADS);
    }

    #[test]
    fn test_capacity_floor() {
        let config = SchedulerConfig::new().with_queue_capacity(3);
        assert_eq!(config.effective_queue_capacity(), MIN_QUEUE_CAPACITY);
    }
}
