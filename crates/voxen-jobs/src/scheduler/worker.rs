//! Worker loop for the job scheduler.
//!
//! Each pool thread runs [`worker_loop`] until the stop flag is set:
//! dequeue-or-park, execute, account busy/idle time, signal the job's
//! counter. Other subsystems can ask [`is_worker_thread`] to detect
//! reentrant scheduling calls.

use std::cell::Cell;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use voxen_core::vox_sched;

use crate::scheduler::state::SchedulerState;

thread_local! {
    static IS_WORKER: Cell<bool> = const { Cell::new(false) };
}

/// True when called from a scheduler worker thread.
pub fn is_worker_thread() -> bool {
    IS_WORKER.with(|flag| flag.get())
}

const PARK_TIMEOUT: Duration = Duration::from_millis(2);

pub(crate) fn worker_loop(worker_id: usize, state: Arc<SchedulerState>) {
    IS_WORKER.with(|flag| flag.set(true));
    vox_sched!(debug, worker = worker_id, "Worker started");

    let counters = &state.worker_counters[worker_id];
    let mut last = Instant::now();

    loop {
        if state.stop.load(Ordering::Acquire) {
            break;
        }

        let Some(job) = state.try_dequeue() else {
            // Idle: fold the time since the last checkpoint into total and
            // park until a producer wakes us or the timeout lapses.
            let now = Instant::now();
            counters
                .total_ns
                .fetch_add((now - last).as_nanos() as u64, Ordering::Relaxed);
            last = now;
            state.park_worker(PARK_TIMEOUT);
            continue;
        };

        let now = Instant::now();
        counters
            .total_ns
            .fetch_add((now - last).as_nanos() as u64, Ordering::Relaxed);
        last = now;

        // Execution time lands in busy_ns now and reaches total_ns at the
        // next checkpoint, since `last` stays at the pre-execution instant.
        let busy = state.execute_job(job);
        counters
            .busy_ns
            .fetch_add(busy.as_nanos() as u64, Ordering::Relaxed);
    }

    IS_WORKER.with(|flag| flag.set(false));
    vox_sched!(debug, worker = worker_id, "Worker stopped");
}
