//! Shared scheduler state.
//!
//! One `SchedulerState` is built per `init` and shared by `Arc` with every
//! worker thread; counters hold a `Weak` back-reference for continuation
//! release. All hot-path mutation goes through atomics - the only mutexes
//! here guard the worker wake condvar.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_utils::CachePadded;
use parking_lot::{Condvar, Mutex};

use voxen_core::{vox_job, vox_sched, SchedulerError};

use crate::observability::MetricsCollector;
use crate::scheduler::config::SchedulerConfig;
use crate::scheduler::counter::Counter;
use crate::scheduler::job::{Job, JobTask};
use crate::scheduler::queue::{MpmcQueue, Priority};

/// Per-worker busy/idle accumulators, padded to their own cache line.
pub(crate) struct WorkerCounters {
    pub(crate) busy_ns: AtomicU64,
    pub(crate) total_ns: AtomicU64,
}

impl WorkerCounters {
    fn new() -> Self {
        Self {
            busy_ns: AtomicU64::new(0),
            total_ns: AtomicU64::new(0),
        }
    }
}

pub(crate) struct SchedulerState {
    pub(crate) cfg: SchedulerConfig,
    pub(crate) stop: AtomicBool,

    /// One queue per tier, indexed by `Priority::as_index`.
    queues: [MpmcQueue<Job>; Priority::COUNT],
    pending: [CachePadded<AtomicU32>; Priority::COUNT],

    pub(crate) stall_warnings: AtomicU32,
    pub(crate) worker_counters: Vec<CachePadded<WorkerCounters>>,
    pub(crate) metrics: MetricsCollector,

    wake_lock: Mutex<()>,
    wake_cv: Condvar,
}

impl SchedulerState {
    pub(crate) fn new(cfg: SchedulerConfig) -> Result<Self, SchedulerError> {
        let capacity = cfg.effective_queue_capacity();
        let queues = [
            MpmcQueue::with_capacity(capacity)?,
            MpmcQueue::with_capacity(capacity)?,
            MpmcQueue::with_capacity(capacity)?,
        ];
        let workers = cfg.resolved_worker_threads();
        Ok(Self {
            cfg,
            stop: AtomicBool::new(false),
            queues,
            pending: std::array::from_fn(|_| CachePadded::new(AtomicU32::new(0))),
            stall_warnings: AtomicU32::new(0),
            worker_counters: (0..workers)
                .map(|_| CachePadded::new(WorkerCounters::new()))
                .collect(),
            metrics: MetricsCollector::new(),
            wake_lock: Mutex::new(()),
            wake_cv: Condvar::new(),
        })
    }

    /// Submit one job: bump its counter first, then route past any unmet
    /// dependency or straight into the queues.
    pub(crate) fn submit(&self, job: Job, priority: Priority) {
        if matches!(job.task, JobTask::Completed) {
            return;
        }
        if let Some(counter) = &job.counter {
            counter.add(1);
        }
        self.dispatch(job, priority);
    }

    /// Submit a batch under one shared counter/dependency pair.
    ///
    /// The shared attachments replace whatever the individual jobs carried.
    /// The counter is incremented by the batch size up front so a concurrent
    /// waiter can never observe a false completion mid-submission.
    pub(crate) fn submit_batch(
        &self,
        jobs: Vec<Job>,
        priority: Priority,
        counter: Option<&Arc<Counter>>,
        dependency: Option<&Arc<Counter>>,
    ) {
        if jobs.is_empty() {
            return;
        }
        if let Some(counter) = counter {
            counter.add(jobs.len() as i32);
        }
        for mut job in jobs {
            job.counter = counter.cloned();
            job.dependency = dependency.cloned();
            if matches!(job.task, JobTask::Completed) {
                if let Some(counter) = counter {
                    counter.done();
                }
                continue;
            }
            self.dispatch(job, priority);
        }
    }

    fn dispatch(&self, mut job: Job, priority: Priority) {
        if let Some(dependency) = job.dependency.take() {
            if !dependency.is_done() {
                self.metrics.record_deferred();
                dependency.push_continuation(job, priority);
                return;
            }
        }
        self.enqueue_job(job, priority);
    }

    /// Enqueue into the tier queue and wake one worker.
    ///
    /// A full ring is handled by yield-and-retry: submission never fails
    /// observably, at the cost of the producer busy-retrying under sustained
    /// overload.
    pub(crate) fn enqueue_job(&self, job: Job, priority: Priority) {
        let idx = priority.as_index();
        let mut job = job;
        loop {
            match self.queues[idx].push(job) {
                Ok(()) => {
                    self.pending[idx].fetch_add(1, Ordering::Relaxed);
                    self.wake_one();
                    return;
                }
                Err(returned) => {
                    job = returned;
                    std::thread::yield_now();
                }
            }
        }
    }

    /// Poll the tiers in strict precedence order.
    pub(crate) fn try_dequeue(&self) -> Option<Job> {
        for priority in Priority::DESCENDING {
            let idx = priority.as_index();
            if let Some(job) = self.queues[idx].pop() {
                self.pending[idx].fetch_sub(1, Ordering::Relaxed);
                return Some(job);
            }
        }
        None
    }

    /// Execute one pending job on the calling thread, if any is available.
    pub(crate) fn try_run_one(&self) -> bool {
        match self.try_dequeue() {
            Some(job) => {
                self.execute_job(job);
                true
            }
            None => false,
        }
    }

    /// Run a job to completion, record stalls, and signal its counter.
    ///
    /// Returns the busy duration for the caller's accounting.
    pub(crate) fn execute_job(&self, job: Job) -> Duration {
        let Job {
            task,
            name,
            counter,
            dependency: _,
        } = job;
        let started = Instant::now();
        if let JobTask::Run(f) = task {
            f();
        }
        let busy = started.elapsed();
        self.metrics.record_execution(busy);
        if busy.as_millis() as u64 > self.cfg.stall_warn_ms {
            self.stall_warnings.fetch_add(1, Ordering::Relaxed);
            vox_job!(
                warn,
                job = name,
                elapsed_ms = busy.as_millis() as u64,
                threshold_ms = self.cfg.stall_warn_ms,
                "Job exceeded stall threshold"
            );
        }
        if let Some(counter) = counter {
            counter.done();
        }
        busy
    }

    /// Help drain the queues until `counter` completes.
    ///
    /// The caller executes pending jobs instead of idling, which keeps the
    /// pool making progress even when the waiter is itself a worker. After
    /// ~250ms with nothing pending anywhere a single heuristic deadlock
    /// warning is logged; the wait itself continues.
    pub(crate) fn wait(&self, counter: &Counter) {
        let started = Instant::now();
        let mut warned = false;
        while !counter.is_done() {
            if self.try_run_one() {
                continue;
            }
            if !warned
                && self.pending_total() == 0
                && started.elapsed() >= Duration::from_millis(250)
            {
                warned = true;
                vox_sched!(
                    warn,
                    waited_ms = started.elapsed().as_millis() as u64,
                    remaining = counter.remaining(),
                    "Possible deadlock: waiting on a counter with no pending jobs"
                );
            }
            counter.park_waiter(Duration::from_millis(1));
        }
    }

    /// Effective per-tier capacity after power-of-two rounding.
    pub(crate) fn queue_capacity(&self) -> usize {
        self.queues[Priority::High.as_index()].capacity()
    }

    #[inline]
    pub(crate) fn pending_count(&self, priority: Priority) -> u32 {
        self.pending[priority.as_index()].load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn pending_total(&self) -> u32 {
        self.pending.iter().map(|p| p.load(Ordering::Relaxed)).sum()
    }

    #[inline]
    pub(crate) fn wake_one(&self) {
        self.wake_cv.notify_one();
    }

    pub(crate) fn wake_all(&self) {
        // Pairing the notify with the lock closes the window against a
        // worker that checked its predicate and is about to park.
        drop(self.wake_lock.lock());
        self.wake_cv.notify_all();
    }

    /// Park an idle worker until woken or the timeout lapses.
    ///
    /// The stop flag and pending counts are re-checked under the lock; a
    /// wake lost to the unlocked `wake_one` fast path costs at most one
    /// timeout period.
    pub(crate) fn park_worker(&self, timeout: Duration) {
        let mut guard = self.wake_lock.lock();
        if self.stop.load(Ordering::Relaxed) || self.pending_total() > 0 {
            return;
        }
        self.wake_cv.wait_for(&mut guard, timeout);
    }
}
