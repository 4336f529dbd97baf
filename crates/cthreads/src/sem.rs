//! Counting semaphore adapter.
//!
//! A thin veneer over the host's waitable pair (exclusive lock + condition
//! variable): the count lives behind the lock, waiters park on the condvar
//! while the count is zero. The count never exceeds the maximum fixed at
//! construction; a post that would overflow is rejected as an error, never
//! clamped.

use std::time::Instant;

use parking_lot::{Condvar as HostCondvar, Mutex as HostMutex};

use crate::error::{Error, Result, TimedOutcome, TryOutcome};
use crate::time::Timespec;

/// A counting semaphore bounded by `[0, max]`.
///
/// Host resources are released on drop.
pub struct Semaphore {
    max: u32,
    count: HostMutex<u32>,
    available: HostCondvar,
}

impl Semaphore {
    /// Creates a semaphore with the given maximum and initial count.
    ///
    /// Fails with a precondition violation when `max` is zero or `initial`
    /// exceeds `max`.
    pub fn new(max: u32, initial: u32) -> Result<Semaphore> {
        if max == 0 {
            return Err(Error::Precondition("semaphore maximum must be non-zero"));
        }
        if initial > max {
            return Err(Error::Precondition(
                "semaphore initial count exceeds maximum",
            ));
        }
        Ok(Semaphore {
            max,
            count: HostMutex::new(initial),
            available: HostCondvar::new(),
        })
    }

    /// Blocks until the count is positive, then takes one.
    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.available.wait(&mut count);
        }
        *count -= 1;
    }

    /// Like [`Semaphore::wait`], giving up at `deadline`.
    pub fn timed_wait(&self, deadline: Timespec) -> TimedOutcome {
        let until = Instant::now() + deadline.budget_from_now();
        let mut count = self.count.lock();
        while *count == 0 {
            if self.available.wait_until(&mut count, until).timed_out() {
                // A post may have slipped in alongside the timeout.
                if *count > 0 {
                    break;
                }
                return TimedOutcome::TimedOut;
            }
        }
        *count -= 1;
        TimedOutcome::Completed
    }

    /// Takes one from the count if immediately available.
    pub fn try_wait(&self) -> TryOutcome {
        let mut count = self.count.lock();
        if *count == 0 {
            TryOutcome::Busy
        } else {
            *count -= 1;
            TryOutcome::Acquired
        }
    }

    /// Adds one to the count. Equivalent to `multi_post(1)`.
    pub fn post(&self) -> Result<()> {
        self.multi_post(1)
    }

    /// Atomically adds `n` to the count.
    ///
    /// Fails — leaving the count untouched — when the result would exceed
    /// the maximum.
    pub fn multi_post(&self, n: u32) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        let mut count = self.count.lock();
        let raised = count
            .checked_add(n)
            .filter(|&raised| raised <= self.max)
            .ok_or(Error::Precondition(
                "post would raise the count above the maximum",
            ))?;
        *count = raised;
        if n == 1 {
            self.available.notify_one();
        } else {
            self.available.notify_all();
        }
        Ok(())
    }

    /// Best-effort snapshot of the current count. Advisory only: the value
    /// may change before the caller acts on it.
    #[must_use]
    pub fn count(&self) -> u32 {
        *self.count.lock()
    }

    /// The maximum count fixed at construction.
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn new_validates_bounds() {
        assert!(matches!(Semaphore::new(0, 0), Err(Error::Precondition(_))));
        assert!(matches!(Semaphore::new(2, 3), Err(Error::Precondition(_))));
        assert!(Semaphore::new(2, 2).is_ok());
    }

    #[test]
    fn wait_consumes_and_post_replenishes() {
        let sem = Semaphore::new(4, 2).unwrap();
        sem.wait();
        sem.wait();
        assert_eq!(sem.count(), 0);
        sem.post().unwrap();
        assert_eq!(sem.count(), 1);
    }

    #[test]
    fn try_wait_is_busy_at_zero() {
        let sem = Semaphore::new(1, 0).unwrap();
        assert_eq!(sem.try_wait(), TryOutcome::Busy);
        sem.post().unwrap();
        assert_eq!(sem.try_wait(), TryOutcome::Acquired);
    }

    #[test]
    fn timed_wait_times_out_at_zero() {
        let sem = Semaphore::new(1, 0).unwrap();
        let outcome = sem.timed_wait(Timespec::after(Duration::from_millis(20)));
        assert_eq!(outcome, TimedOutcome::TimedOut);
    }

    #[test]
    fn timed_wait_completes_after_post() {
        let sem = Arc::new(Semaphore::new(1, 0).unwrap());
        let poster = {
            let sem = Arc::clone(&sem);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                sem.post().unwrap();
            })
        };
        let outcome = sem.timed_wait(Timespec::after(Duration::from_millis(500)));
        assert_eq!(outcome, TimedOutcome::Completed);
        poster.join().unwrap();
    }

    #[test]
    fn multi_post_beyond_max_is_an_error_not_a_clamp() {
        let sem = Semaphore::new(3, 1).unwrap();
        assert!(matches!(sem.multi_post(3), Err(Error::Precondition(_))));
        // The failed post must not have changed the count.
        assert_eq!(sem.count(), 1);
        sem.multi_post(2).unwrap();
        assert_eq!(sem.count(), 3);
    }

    #[test]
    fn multi_post_zero_is_a_noop() {
        let sem = Semaphore::new(1, 1).unwrap();
        sem.multi_post(0).unwrap();
        assert_eq!(sem.count(), 1);
    }

    #[test]
    fn multi_post_overflow_checked() {
        let sem = Semaphore::new(u32::MAX, u32::MAX - 1).unwrap();
        assert!(sem.multi_post(2).is_err());
        assert_eq!(sem.count(), u32::MAX - 1);
    }

    #[test]
    fn multi_post_releases_several_waiters() {
        let sem = Arc::new(Semaphore::new(8, 0).unwrap());
        let mut waiters = Vec::new();
        for _ in 0..3 {
            let sem = Arc::clone(&sem);
            waiters.push(std::thread::spawn(move || {
                sem.timed_wait(Timespec::after(Duration::from_millis(500)))
            }));
        }
        std::thread::sleep(Duration::from_millis(30));
        sem.multi_post(3).unwrap();
        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), TimedOutcome::Completed);
        }
        assert_eq!(sem.count(), 0);
    }
}
