//! Condition variable adapter.
//!
//! The host condition variable can only suspend against its own paired
//! lock, while callers wait with any [`Mutex`] kind — including kinds whose
//! backing primitive the host condvar cannot use. The adapter therefore
//! carries a private exclusive lock: a waiter takes the private lock,
//! releases the caller's mutex, parks on the host condvar against the
//! private lock, and reacquires the caller's mutex after waking.
//!
//! `signal` and `broadcast` briefly take the private lock before notifying,
//! so a waiter that has released its mutex but not yet parked cannot miss a
//! wakeup — the release/park pair is atomic with respect to signalers.
//! Standard condition variable looseness still applies: a signal races
//! freely with threads that have not begun waiting, and spurious wakeups
//! are possible, so callers use predicate loops.

use parking_lot::{Condvar as HostCondvar, Mutex as HostMutex};

use crate::error::{Result, TimedOutcome};
use crate::mutex::Mutex;
use crate::time::Timespec;

/// A condition variable usable with any [`Mutex`] kind.
///
/// Host resources are released on drop.
pub struct Condvar {
    waiters: HostCondvar,
    /// Serializes release-and-park against signal/broadcast.
    parked: HostMutex<()>,
}

impl Condvar {
    /// Creates a condition variable with no waiters.
    #[must_use]
    pub const fn new() -> Condvar {
        Condvar {
            waiters: HostCondvar::new(),
            parked: HostMutex::new(()),
        }
    }

    /// Wakes one thread waiting on this condition variable, if any is
    /// waiting at the moment of the call.
    pub fn signal(&self) {
        let _serial = self.parked.lock();
        self.waiters.notify_one();
    }

    /// Wakes every thread waiting on this condition variable at the moment
    /// of the call.
    pub fn broadcast(&self) {
        let _serial = self.parked.lock();
        self.waiters.notify_all();
    }

    /// Atomically releases `mutex`, blocks until signaled, and reacquires
    /// `mutex` before returning.
    ///
    /// # Safety
    ///
    /// The calling thread must hold `mutex` exclusively.
    pub unsafe fn wait(&self, mutex: &Mutex) {
        let mut guard = self.parked.lock();
        // SAFETY: caller holds `mutex` exclusively, per this function's
        // contract.
        unsafe { mutex.unlock() };
        self.waiters.wait(&mut guard);
        drop(guard);
        mutex.lock();
    }

    /// Like [`Condvar::wait`] with an absolute deadline. The mutex is
    /// reacquired before returning regardless of the outcome, so the
    /// caller's lock-holding invariant survives a timeout.
    ///
    /// # Safety
    ///
    /// The calling thread must hold `mutex` exclusively.
    pub unsafe fn timed_wait(&self, mutex: &Mutex, deadline: Timespec) -> TimedOutcome {
        let budget = deadline.budget_from_now();
        let mut guard = self.parked.lock();
        // SAFETY: caller holds `mutex` exclusively, per this function's
        // contract.
        unsafe { mutex.unlock() };
        let status = self.waiters.wait_for(&mut guard, budget);
        drop(guard);
        mutex.lock();
        if status.timed_out() {
            TimedOutcome::TimedOut
        } else {
            TimedOutcome::Completed
        }
    }

    /// Shared-mode wait: releases a *shared* hold on a `Shared`-kind mutex
    /// and reacquires it in shared mode after waking, so multiple readers
    /// may wait concurrently and be woken together.
    ///
    /// Fails with a precondition violation on any other kind, before the
    /// caller's hold is disturbed.
    ///
    /// # Safety
    ///
    /// The calling thread must hold `mutex` in shared mode.
    pub unsafe fn wait_shared(&self, mutex: &Mutex) -> Result<()> {
        let mut guard = self.parked.lock();
        // Kind mismatch surfaces here, while the caller's hold is intact.
        // SAFETY: caller holds `mutex` in shared mode, per this function's
        // contract.
        unsafe { mutex.unlock_shared()? };
        self.waiters.wait(&mut guard);
        drop(guard);
        mutex.lock_shared()
    }

    /// Shared-mode wait with an absolute deadline.
    ///
    /// # Safety
    ///
    /// The calling thread must hold `mutex` in shared mode.
    pub unsafe fn timed_wait_shared(
        &self,
        mutex: &Mutex,
        deadline: Timespec,
    ) -> Result<TimedOutcome> {
        let budget = deadline.budget_from_now();
        let mut guard = self.parked.lock();
        // SAFETY: caller holds `mutex` in shared mode, per this function's
        // contract.
        unsafe { mutex.unlock_shared()? };
        let status = self.waiters.wait_for(&mut guard, budget);
        drop(guard);
        mutex.lock_shared()?;
        Ok(if status.timed_out() {
            TimedOutcome::TimedOut
        } else {
            TimedOutcome::Completed
        })
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
