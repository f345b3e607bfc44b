//! Completion counters and dependency continuations.
//!
//! A [`Counter`] is an atomic countdown of outstanding jobs plus a lock-free
//! list of continuations released when the countdown reaches zero. Counters
//! are shared by `Arc`; the scheduler back-reference is weak, so a counter
//! that outlives its scheduler drops deferred jobs instead of dangling.

use std::ptr;
use std::sync::atomic::{AtomicI32, AtomicPtr, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::scheduler::job::Job;
use crate::scheduler::queue::Priority;
use crate::scheduler::state::SchedulerState;

/// A job deferred until its dependency counter reaches zero.
///
/// Nodes live on a singly linked lock-free stack owned by the counter. The
/// releasing thread takes the whole list with one exchange, re-enqueues each
/// job at its recorded priority, and frees the node.
pub(crate) struct Continuation {
    pub(crate) job: Job,
    pub(crate) priority: Priority,
    pub(crate) next: *mut Continuation,
}

/// An atomic completion gate.
///
/// Multiple jobs may share one counter (fan-out): [`Counter::add`] runs at
/// submission before any of them can execute, and each completed job calls
/// [`Counter::done`] exactly once. The unique `1 -> 0` transition releases
/// attached continuations and wakes threads blocked in
/// [`JobScheduler::wait`](crate::JobScheduler::wait).
pub struct Counter {
    remaining: AtomicI32,
    continuations: AtomicPtr<Continuation>,
    wait_lock: Mutex<()>,
    wait_cv: Condvar,
    scheduler: Weak<SchedulerState>,
}

impl Counter {
    pub(crate) fn new(scheduler: Weak<SchedulerState>, initial: i32) -> Arc<Self> {
        Arc::new(Self {
            remaining: AtomicI32::new(initial),
            continuations: AtomicPtr::new(ptr::null_mut()),
            wait_lock: Mutex::new(()),
            wait_cv: Condvar::new(),
            scheduler,
        })
    }

    /// Add `n` outstanding jobs. No-op for `n <= 0`.
    ///
    /// Relaxed ordering: nothing is read-dependent on the increment beyond
    /// the count itself; `done` carries the acquire/release publication.
    pub fn add(&self, n: i32) {
        if n <= 0 {
            return;
        }
        self.remaining.fetch_add(n, Ordering::Relaxed);
    }

    /// Mark one job complete.
    ///
    /// The caller whose decrement observes the `1 -> 0` transition releases
    /// the continuation list and notifies waiters; every other caller only
    /// decrements. Calling `done` more times than `add`ed breaks the
    /// never-negative invariant and is a caller bug.
    pub fn done(&self) {
        let prev = self.remaining.fetch_sub(1, Ordering::AcqRel);
        if prev != 1 {
            return;
        }
        self.release_continuations();
        // Taking the lock orders this notify after any waiter that checked
        // is_done and is about to park.
        drop(self.wait_lock.lock());
        self.wait_cv.notify_all();
    }

    /// Whether the countdown has reached zero.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.remaining.load(Ordering::Acquire) <= 0
    }

    /// Outstanding job count at this instant.
    #[inline]
    pub fn remaining(&self) -> i32 {
        self.remaining.load(Ordering::Acquire)
    }

    /// Park a continuation to be released when this counter reaches zero.
    pub(crate) fn push_continuation(&self, job: Job, priority: Priority) {
        let node = Box::into_raw(Box::new(Continuation {
            job,
            priority,
            next: ptr::null_mut(),
        }));
        let mut head = self.continuations.load(Ordering::Relaxed);
        loop {
            unsafe { (*node).next = head };
            match self.continuations.compare_exchange_weak(
                head,
                node,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => head = actual,
            }
        }
        // The counter may have hit zero while the node was in flight; the
        // releasing exchange takes the whole list, so performing the release
        // here as well still fires each continuation at most once.
        if self.is_done() {
            self.release_continuations();
        }
    }

    /// Take the whole continuation list and re-enqueue every entry.
    ///
    /// The single exchange grants exclusive ownership of the list to one
    /// caller; nodes are freed right after their job is re-submitted. If the
    /// scheduler is gone the deferred jobs are dropped.
    fn release_continuations(&self) {
        let mut node = self.continuations.swap(ptr::null_mut(), Ordering::AcqRel);
        if node.is_null() {
            return;
        }
        let scheduler = self.scheduler.upgrade();
        while !node.is_null() {
            let boxed = unsafe { Box::from_raw(node) };
            node = boxed.next;
            if let Some(state) = &scheduler {
                state.enqueue_job(boxed.job, boxed.priority);
            }
        }
    }

    /// Block until notified or the timeout lapses, re-checking completion
    /// under the lock to close the gap against a concurrent final `done`.
    pub(crate) fn park_waiter(&self, timeout: Duration) {
        let mut guard = self.wait_lock.lock();
        if self.is_done() {
            return;
        }
        self.wait_cv.wait_for(&mut guard, timeout);
    }
}

impl Drop for Counter {
    fn drop(&mut self) {
        // Continuations never released (counter abandoned above zero, or
        // scheduler shut down first) are freed here, dropping their jobs.
        let mut node = self.continuations.swap(ptr::null_mut(), Ordering::AcqRel);
        while !node.is_null() {
            let boxed = unsafe { Box::from_raw(node) };
            node = boxed.next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::thread;

    fn detached(initial: i32) -> Arc<Counter> {
        Counter::new(Weak::new(), initial)
    }

    #[test]
    fn test_add_ignores_non_positive() {
        let c = detached(0);
        c.add(0);
        c.add(-5);
        assert!(c.is_done());
        c.add(2);
        assert_eq!(c.remaining(), 2);
    }

    #[test]
    fn test_done_fires_on_exact_zero() {
        let c = detached(0);
        c.add(3);
        c.done();
        c.done();
        assert!(!c.is_done());
        c.done();
        assert!(c.is_done());
    }

    #[test]
    fn test_concurrent_done_reaches_zero_once() {
        const N: i32 = 1000;
        let c = detached(0);
        c.add(N);
        let mut handles = Vec::new();
        for _ in 0..4 {
            let c = Arc::clone(&c);
            handles.push(thread::spawn(move || {
                for _ in 0..(N / 4) {
                    c.done();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(c.remaining(), 0);
    }

    #[test]
    fn test_drop_frees_unreleased_continuations() {
        let gate = detached(1);
        let ran = Arc::new(AtomicU32::new(0));
        {
            let ran = Arc::clone(&ran);
            gate.push_continuation(
                Job::new("never", move || {
                    ran.fetch_add(1, Ordering::Relaxed);
                }),
                Priority::Normal,
            );
        }
        drop(gate);
        assert_eq!(ran.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_push_after_completion_drops_without_scheduler() {
        // The re-check path: the gate is already done when the continuation
        // lands, so the pushing thread performs the release itself. With no
        // live scheduler the job is dropped rather than leaked.
        let gate = detached(0);
        let payload = Arc::new(());
        let held = Arc::clone(&payload);
        gate.push_continuation(Job::new("late", move || drop(held)), Priority::Low);
        assert_eq!(Arc::strong_count(&payload), 1);
    }
}
