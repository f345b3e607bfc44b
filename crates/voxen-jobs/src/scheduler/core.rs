//! The public scheduler facade: lifecycle, submission, waiting, stats.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use voxen_core::{vox_sched, SchedulerError};

use crate::observability::SchedulerStats;
use crate::scheduler::config::SchedulerConfig;
use crate::scheduler::counter::Counter;
use crate::scheduler::job::Job;
use crate::scheduler::queue::Priority;
use crate::scheduler::state::SchedulerState;
use crate::scheduler::worker;

/// The concurrent job scheduler.
///
/// Created stopped; [`init`](JobScheduler::init) spawns the worker pool and
/// [`shutdown`](JobScheduler::shutdown) joins it. Re-`init` after `shutdown`
/// is supported. All submission and wait entry points take `&self` and are
/// safe to call from any thread.
///
/// Jobs still queued, or parked as continuations on incomplete counters,
/// when `shutdown` runs are silently discarded; shutdown makes no
/// drain-to-completion guarantee.
pub struct JobScheduler {
    /// Current epoch state; `None` while stopped. Read on the hot paths,
    /// written only by init/shutdown.
    state: RwLock<Option<Arc<SchedulerState>>>,
    /// Worker join handles; touched only by init/shutdown.
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobScheduler {
    /// Create a scheduler in the stopped state.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(None),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Whether the pool is currently running.
    pub fn is_running(&self) -> bool {
        self.state.read().is_some()
    }

    /// Validate the configuration, allocate the priority queues, and spawn
    /// the worker pool. A no-op returning `Ok` if already running.
    pub fn init(&self, cfg: SchedulerConfig) -> Result<(), SchedulerError> {
        let mut workers = self.workers.lock();
        let mut slot = self.state.write();
        if slot.is_some() {
            return Ok(());
        }

        cfg.validate()
            .map_err(|message| SchedulerError::InvalidConfig { message })?;

        let state = Arc::new(SchedulerState::new(cfg)?);
        let count = state.worker_counters.len();
        for worker_id in 0..count {
            let worker_state = Arc::clone(&state);
            let handle = thread::Builder::new()
                .name(format!("voxen-worker-{worker_id}"))
                .spawn(move || worker::worker_loop(worker_id, worker_state));
            match handle {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    // Roll back the partially spawned pool before reporting.
                    state.stop.store(true, Ordering::Release);
                    state.wake_all();
                    for handle in workers.drain(..) {
                        let _ = handle.join();
                    }
                    return Err(SchedulerError::WorkerSpawn(err));
                }
            }
        }

        vox_sched!(
            info,
            workers = count,
            queue_capacity = state.queue_capacity(),
            stall_warn_ms = state.cfg.stall_warn_ms,
            "Job scheduler started"
        );
        *slot = Some(state);
        Ok(())
    }

    /// Stop the pool: set the stop flag, wake and join every worker, drop
    /// the queues (discarding any still-pending jobs). Idempotent.
    pub fn shutdown(&self) {
        let mut workers = self.workers.lock();
        let state = self.state.write().take();
        let Some(state) = state else {
            return;
        };
        state.stop.store(true, Ordering::Release);
        state.wake_all();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
        vox_sched!(info, "Job scheduler stopped");
        // `state` drops here; undelivered jobs go with the queues.
    }

    /// Create a completion counter starting at `initial`.
    ///
    /// Counters are tied to the running pool: one created while the
    /// scheduler is stopped (or kept across a shutdown/init cycle) still
    /// counts, but can no longer release continuations.
    pub fn counter(&self, initial: i32) -> Arc<Counter> {
        let scheduler = self
            .state
            .read()
            .as_ref()
            .map(Arc::downgrade)
            .unwrap_or_else(Weak::new);
        Counter::new(scheduler, initial)
    }

    /// Submit one job.
    ///
    /// If the job carries a counter it is incremented before anything else,
    /// so a waiter can never observe a false completion between submission
    /// and execution. A job gated on an unmet dependency is parked as a
    /// continuation instead of enqueued. Never blocks the producer; a full
    /// queue is absorbed by yield-and-retry.
    ///
    /// Submitting to a stopped scheduler drops the job with a warning.
    pub fn submit(&self, job: Job, priority: Priority) {
        let state = self.state.read();
        match state.as_ref() {
            Some(state) => state.submit(job, priority),
            None => {
                vox_sched!(warn, job = job.name(), "Submit on a stopped scheduler; job dropped");
            }
        }
    }

    /// Submit a batch of jobs sharing one counter/dependency pair.
    ///
    /// The shared counter is incremented by the batch size once, up front.
    /// A [`Job::completed`] placeholder in the batch marks the counter done
    /// immediately and is skipped. The shared attachments replace whatever
    /// the individual jobs carried.
    pub fn submit_batch(
        &self,
        jobs: Vec<Job>,
        priority: Priority,
        counter: Option<&Arc<Counter>>,
        dependency: Option<&Arc<Counter>>,
    ) {
        let state = self.state.read();
        match state.as_ref() {
            Some(state) => state.submit_batch(jobs, priority, counter, dependency),
            None => {
                vox_sched!(warn, batch = jobs.len(), "Batch submit on a stopped scheduler; jobs dropped");
            }
        }
    }

    /// Block until `counter` reaches zero, executing pending jobs on the
    /// calling thread while waiting.
    ///
    /// Safe to call from a worker: the helping loop keeps the pool from
    /// deadlocking on its own threads.
    pub fn wait(&self, counter: &Counter) {
        // Clone the state out rather than holding the read guard across a
        // potentially long wait, so shutdown is never blocked behind us.
        let state = self.state.read().as_ref().map(Arc::clone);
        match state {
            Some(state) => state.wait(counter),
            None => {
                while !counter.is_done() {
                    counter.park_waiter(Duration::from_millis(1));
                }
            }
        }
    }

    /// Point-in-time snapshot of queue depths and worker utilization.
    ///
    /// Utilization is measured since the previous snapshot; taking one
    /// resets the per-worker accumulators.
    pub fn snapshot_stats(&self) -> SchedulerStats {
        let state = self.state.read();
        match state.as_ref() {
            Some(state) => SchedulerStats::capture(state),
            None => SchedulerStats::default(),
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
