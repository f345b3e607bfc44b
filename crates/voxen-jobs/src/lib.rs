//! Voxen Jobs - Concurrent job scheduler for per-frame engine work.
//!
//! The scheduler dispatches type-erased closures across a fixed pool of OS
//! worker threads through three bounded lock-free queues (one per priority
//! tier), with completion counters and dependency continuations for fan-out
//! and fan-in:
//!
//! - **Submission**: any thread may call [`JobScheduler::submit`] or
//!   [`JobScheduler::submit_batch`]; producers never block.
//! - **Dependencies**: a job gated on an unfinished [`Counter`] is parked as
//!   a continuation and released automatically when the counter hits zero.
//! - **Waiting**: [`JobScheduler::wait`] executes pending jobs on the calling
//!   thread instead of idling, so waiting never starves the pool.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use voxen_jobs::{Job, JobScheduler, Priority, SchedulerConfig};
//!
//! let scheduler = JobScheduler::new();
//! scheduler.init(SchedulerConfig::default())?;
//!
//! let meshed = Arc::new(AtomicU32::new(0));
//! let gate = scheduler.counter(0);
//! for _ in 0..64 {
//!     let meshed = Arc::clone(&meshed);
//!     scheduler.submit(
//!         Job::new("mesh_chunk", move || {
//!             meshed.fetch_add(1, Ordering::Relaxed);
//!         })
//!         .with_counter(&gate),
//!         Priority::Normal,
//!     );
//! }
//! scheduler.wait(&gate);
//! scheduler.shutdown();
//! # Ok::<(), voxen_jobs::SchedulerError>(())
//! ```

pub mod observability;
pub mod scheduler;

pub use observability::{MetricsCollector, SchedulerStats, MAX_TRACKED_WORKERS};
pub use scheduler::{
    config::SchedulerConfig,
    core::JobScheduler,
    counter::Counter,
    job::Job,
    queue::{MpmcQueue, Priority},
    worker::is_worker_thread,
};

// Re-export the shared error type so callers need only this crate.
pub use voxen_core::SchedulerError;
