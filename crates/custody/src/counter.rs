//! Atomic reference counter.
//!
//! Both counts of a [`ControlBlock`](crate::ControlBlock) are `RefCounter`s.
//! Every mutation is a single atomic read-modify-write, and the decrement
//! that crosses to zero is the only signal used to trigger destruction.

use std::hint;
use std::sync::atomic::{fence, AtomicUsize, Ordering};

/// Counts above this abort the process instead of risking wrap-around.
const MAX_REFCOUNT: usize = isize::MAX as usize;

/// Sentinel stored in a weak counter while a sole owner checks uniqueness.
pub(crate) const LOCKED: usize = usize::MAX;

#[derive(Debug)]
pub(crate) struct RefCounter(AtomicUsize);

impl RefCounter {
    #[inline]
    pub(crate) const fn new(initial: usize) -> Self {
        Self(AtomicUsize::new(initial))
    }

    #[inline]
    pub(crate) fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    /// Increment a count the caller already holds a share of.
    ///
    /// Returns the new count.
    #[inline]
    pub(crate) fn increment(&self) -> usize {
        let prev = self.0.fetch_add(1, Ordering::Relaxed);
        if prev > MAX_REFCOUNT {
            std::process::abort();
        }
        prev + 1
    }

    /// Decrement and return the new count.
    ///
    /// A return of 0 means this call was the single winner of the race to
    /// zero; all writes made through other references happen-before it.
    #[inline]
    pub(crate) fn decrement(&self) -> usize {
        let prev = self.0.fetch_sub(1, Ordering::Release);
        debug_assert!(prev > 0, "Decrementing zero reference count");
        if prev == 1 {
            fence(Ordering::Acquire);
        }
        prev - 1
    }

    /// Increment only if the count is currently non-zero.
    ///
    /// The check and the increment are one compare-and-swap, so a count
    /// that has reached zero can never be brought back.
    pub(crate) fn increment_if_nonzero(&self) -> Option<usize> {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return None;
            }
            if current > MAX_REFCOUNT {
                std::process::abort();
            }
            match self.0.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(current + 1),
                Err(actual) => current = actual,
            }
        }
    }

    /// Increment, spinning while another handle holds the uniqueness lock.
    pub(crate) fn increment_unless_locked(&self) -> usize {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            if current == LOCKED {
                hint::spin_loop();
                current = self.0.load(Ordering::Relaxed);
                continue;
            }
            if current > MAX_REFCOUNT {
                std::process::abort();
            }
            match self.0.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return current + 1,
                Err(actual) => current = actual,
            }
        }
    }

    /// Atomically replace `expected` with `new`. Returns false if the count
    /// was anything else.
    #[inline]
    pub(crate) fn transition(&self, expected: usize, new: usize) -> bool {
        self.0
            .compare_exchange(expected, new, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Park the count at [`LOCKED`] if it currently equals `expected`.
    #[inline]
    pub(crate) fn try_lock(&self, expected: usize) -> bool {
        self.transition(expected, LOCKED)
    }

    /// Undo a successful [`try_lock`](Self::try_lock).
    #[inline]
    pub(crate) fn unlock(&self, restore: usize) {
        self.0.store(restore, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_atomic_counter() {
        let counter = RefCounter::new(1);
        assert_eq!(counter.get(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(counter.increment(), 3);
        assert_eq!(counter.decrement(), 2);
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn test_decrement_reports_zero_crossing() {
        let counter = RefCounter::new(2);
        assert_eq!(counter.decrement(), 1);
        assert_eq!(counter.decrement(), 0);
    }

    #[test]
    fn test_increment_if_nonzero() {
        let counter = RefCounter::new(1);
        assert_eq!(counter.increment_if_nonzero(), Some(2));

        let dead = RefCounter::new(0);
        assert_eq!(dead.increment_if_nonzero(), None);
        assert_eq!(dead.get(), 0);
    }

    #[test]
    fn test_lock_and_unlock() {
        let counter = RefCounter::new(1);
        assert!(!counter.try_lock(2));
        assert!(counter.try_lock(1));
        assert_eq!(counter.get(), LOCKED);
        counter.unlock(1);
        assert_eq!(counter.increment_unless_locked(), 2);
    }

    #[test]
    fn test_increment_waits_while_locked() {
        let counter = RefCounter::new(1);
        assert!(counter.try_lock(1));

        thread::scope(|s| {
            let waiter = s.spawn(|| counter.increment_unless_locked());
            thread::sleep(Duration::from_millis(20));
            assert_eq!(counter.get(), LOCKED);

            counter.unlock(1);
            assert_eq!(waiter.join().unwrap(), 2);
        });

        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn test_transition_requires_expected_value() {
        let counter = RefCounter::new(2);
        assert!(!counter.transition(1, 0));
        assert_eq!(counter.get(), 2);
        assert!(counter.transition(2, 0));
        assert_eq!(counter.get(), 0);
    }
}
