//! Priority tiers and the bounded MPMC queue backing them.
//!
//! The queue is the classic bounded multi-producer/multi-consumer ring: each
//! cell carries a sequence counter that producers and consumers use to agree
//! on slot ownership without locks. The acquire load of the sequence before
//! the claim CAS, paired with the release store after the payload is written
//! or taken, is what gives the producer-to-consumer happens-before edge.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use voxen_core::SchedulerError;

/// Priority tiers for submitted jobs.
///
/// Tiers are drained in strict precedence: High fully ahead of Normal, Normal
/// fully ahead of Low. This is not weighted fairness - sustained High-priority
/// load can starve the lower tiers indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Priority {
    /// Lowest tier; runs only when High and Normal are empty.
    Low = 0,
    /// Default tier for frame work.
    Normal = 1,
    /// Drained ahead of everything else.
    High = 2,
}

impl Priority {
    /// Get the priority as a usize index (for array indexing).
    #[inline]
    pub fn as_index(self) -> usize {
        self as usize
    }

    /// Number of priority tiers.
    pub const COUNT: usize = 3;

    /// Tiers in dequeue (precedence) order.
    pub const DESCENDING: [Priority; Priority::COUNT] =
        [Priority::High, Priority::Normal, Priority::Low];
}

struct Slot<T> {
    seq: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Fixed-capacity lock-free multi-producer/multi-consumer queue.
///
/// Capacity is a power of two; requests are rounded down, and anything that
/// rounds below 2 is rejected at construction. `push` and `pop` never block:
/// a full queue hands the value back, an empty queue returns `None`.
pub struct MpmcQueue<T> {
    buf: Box<[Slot<T>]>,
    mask: usize,
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
}

// The UnsafeCell slots are handed off between threads through the sequence
// protocol; a slot is only ever touched by the thread that claimed it.
unsafe impl<T: Send> Send for MpmcQueue<T> {}
unsafe impl<T: Send> Sync for MpmcQueue<T> {}

/// Largest power of two less than or equal to `v`, or 0 below 2.
pub(crate) fn round_down_pow2(v: u32) -> u32 {
    if v < 2 {
        return 0;
    }
    1 << (31 - v.leading_zeros())
}

impl<T> MpmcQueue<T> {
    /// Allocate a queue with `capacity` rounded down to a power of two.
    pub fn with_capacity(capacity: u32) -> Result<Self, SchedulerError> {
        let cap = round_down_pow2(capacity);
        if cap == 0 {
            return Err(SchedulerError::QueueCapacity {
                requested: capacity,
            });
        }
        let buf: Box<[Slot<T>]> = (0..cap as usize)
            .map(|i| Slot {
                seq: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();
        Ok(Self {
            buf,
            mask: cap as usize - 1,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        })
    }

    /// Effective (power-of-two) capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Attempt to enqueue without blocking.
    ///
    /// Returns the value back when the queue is full so the caller decides
    /// the backpressure policy.
    pub fn push(&self, value: T) -> Result<(), T> {
        let mut pos = self.tail.load(Ordering::Relaxed);
        loop {
            let slot = &self.buf[pos & self.mask];
            let seq = slot.seq.load(Ordering::Acquire);
            let dif = seq as isize - pos as isize;
            if dif == 0 {
                match self.tail.compare_exchange_weak(
                    pos,
                    pos + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        unsafe { (*slot.value.get()).write(value) };
                        slot.seq.store(pos + 1, Ordering::Release);
                        return Ok(());
                    }
                    Err(actual) => pos = actual,
                }
            } else if dif < 0 {
                // Sequence lags the claim position: the consumer side has not
                // freed this slot yet, the ring is full.
                return Err(value);
            } else {
                pos = self.tail.load(Ordering::Relaxed);
            }
        }
    }

    /// Attempt to dequeue without blocking.
    pub fn pop(&self) -> Option<T> {
        let mut pos = self.head.load(Ordering::Relaxed);
        loop {
            let slot = &self.buf[pos & self.mask];
            let seq = slot.seq.load(Ordering::Acquire);
            let dif = seq as isize - (pos + 1) as isize;
            if dif == 0 {
                match self.head.compare_exchange_weak(
                    pos,
                    pos + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        let value = unsafe { (*slot.value.get()).assume_init_read() };
                        slot.seq.store(pos + self.mask + 1, Ordering::Release);
                        return Some(value);
                    }
                    Err(actual) => pos = actual,
                }
            } else if dif < 0 {
                return None;
            } else {
                pos = self.head.load(Ordering::Relaxed);
            }
        }
    }

    /// Approximate number of queued items.
    ///
    /// Racy under concurrent use; diagnostics only.
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        tail.saturating_sub(head)
    }

    /// Whether the queue looks empty. Same caveat as [`MpmcQueue::len`].
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Drop for MpmcQueue<T> {
    fn drop(&mut self) {
        // Undelivered payloads are dropped with the queue.
        while self.pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU64;
    use std::thread;

    #[test]
    fn test_priority_as_index() {
        assert_eq!(Priority::Low.as_index(), 0);
        assert_eq!(Priority::Normal.as_index(), 1);
        assert_eq!(Priority::High.as_index(), 2);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
        assert_eq!(Priority::DESCENDING[0], Priority::High);
    }

    #[test]
    fn test_capacity_rounds_down() {
        assert_eq!(round_down_pow2(100), 64);
        assert_eq!(round_down_pow2(64), 64);
        assert_eq!(round_down_pow2(2), 2);
        assert_eq!(round_down_pow2(1), 0);
        assert_eq!(round_down_pow2(0), 0);

        let q = MpmcQueue::<u32>::with_capacity(100).unwrap();
        assert_eq!(q.capacity(), 64);
    }

    #[test]
    fn test_capacity_below_two_fails() {
        assert!(MpmcQueue::<u32>::with_capacity(0).is_err());
        assert!(MpmcQueue::<u32>::with_capacity(1).is_err());
    }

    #[test]
    fn test_fifo_single_thread() {
        let q = MpmcQueue::with_capacity(8).unwrap();
        for i in 0..8 {
            q.push(i).unwrap();
        }
        assert!(q.push(99).is_err(), "ninth push must report full");
        for i in 0..8 {
            assert_eq!(q.pop(), Some(i));
        }
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_wraparound() {
        let q = MpmcQueue::with_capacity(4).unwrap();
        for round in 0..10 {
            for i in 0..4 {
                q.push(round * 4 + i).unwrap();
            }
            for i in 0..4 {
                assert_eq!(q.pop(), Some(round * 4 + i));
            }
        }
    }

    #[test]
    fn test_concurrent_producers_consumers() {
        const PRODUCERS: u64 = 4;
        const PER: u64 = 10_000;

        let q = Arc::new(MpmcQueue::with_capacity(1024).unwrap());
        let sum = Arc::new(AtomicU64::new(0));
        let taken = Arc::new(AtomicU64::new(0));

        let mut handles = Vec::new();
        for p in 0..PRODUCERS {
            let q = Arc::clone(&q);
            handles.push(thread::spawn(move || {
                for i in 0..PER {
                    let mut v = p * PER + i + 1;
                    loop {
                        match q.push(v) {
                            Ok(()) => break,
                            Err(back) => {
                                v = back;
                                thread::yield_now();
                            }
                        }
                    }
                }
            }));
        }
        for _ in 0..PRODUCERS {
            let q = Arc::clone(&q);
            let sum = Arc::clone(&sum);
            let taken = Arc::clone(&taken);
            handles.push(thread::spawn(move || {
                while taken.load(Ordering::Relaxed) < PRODUCERS * PER {
                    if let Some(v) = q.pop() {
                        sum.fetch_add(v, Ordering::Relaxed);
                        taken.fetch_add(1, Ordering::Relaxed);
                    } else {
                        thread::yield_now();
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let n = PRODUCERS * PER;
        assert_eq!(sum.load(Ordering::Relaxed), n * (n + 1) / 2);
    }

    #[test]
    fn test_drop_releases_pending_items() {
        let q = MpmcQueue::with_capacity(8).unwrap();
        let payload = Arc::new(());
        for _ in 0..4 {
            q.push(Arc::clone(&payload)).unwrap();
        }
        assert_eq!(Arc::strong_count(&payload), 5);
        drop(q);
        assert_eq!(Arc::strong_count(&payload), 1);
    }
}
