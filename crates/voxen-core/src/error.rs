//! Scheduler errors.
//!
//! Jobs themselves have no error channel: a job is fire-and-forget, and any
//! failure inside one is the job's own responsibility to surface through
//! shared state. The only fallible operation is bringing the scheduler up.

use thiserror::Error;

/// Errors that occur while starting the job scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Configuration rejected by validation.
    #[error("Invalid scheduler config: {message}")]
    InvalidConfig {
        /// What the validation pass objected to.
        message: String,
    },

    /// Queue capacity unusable after power-of-two rounding.
    #[error("Queue capacity {requested} rounds down below the supported minimum")]
    QueueCapacity {
        /// The capacity the caller asked for.
        requested: u32,
    },

    /// A worker thread could not be spawned.
    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}
