//! Mutex adapter.
//!
//! One type unifies four lock behaviors over the host's mismatched
//! primitive set. The kind selects the backing primitive:
//!
//! - `Plain` / `Recursive` → a reentrant raw section (the host's exclusive
//!   section is natively reentrant from the owning thread).
//! - `Timed` → a raw mutex supporting deadline acquisition (the host's
//!   sections cannot be waited on with a deadline; this models the kernel
//!   waitable mutex).
//! - `Shared` → a raw reader/writer lock.
//!
//! ## The `held` flag
//!
//! A `Plain` mutex must block forever when its owner relocks it, but the
//! backing section happily re-enters. The `held` flag restores the faithful
//! non-recursive contract: after acquiring the backing primitive, a
//! non-recursive lock sleep-spins until `held` reads false, then sets it.
//! `unlock` clears the flag *before* releasing the backing primitive so a
//! freshly woken waiter can never observe the primitive free while `held`
//! still reads true. The flag is only ever written while the backing
//! primitive is held, so no separate lock guards it.

use core::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::trace;
use parking_lot::lock_api::{RawMutex as _, RawMutexTimed as _, RawReentrantMutex, RawRwLock as _};
use parking_lot::{RawMutex, RawRwLock, RawThreadId};

use crate::error::{Error, Result, TimedOutcome, TryOutcome};
use crate::time::Timespec;

/// Reentrant exclusive section, the analog of the host's critical section.
type RawSection = RawReentrantMutex<RawMutex, RawThreadId>;

/// Retry interval for the non-recursive `held` spin. A fixed short sleep
/// trades latency for CPU; the interval is deliberately a named constant so
/// the trade-off has exactly one home.
const NONRECURSIVE_RETRY: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// Kind and backing
// ---------------------------------------------------------------------------

/// Behavioral kind of a [`Mutex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutexKind {
    /// Exclusive, non-recursive. Same-thread relock blocks forever.
    Plain,
    /// Exclusive, non-recursive, supports [`Mutex::timed_lock`].
    Timed,
    /// Exclusive, reentrant by its owner; N locks require N unlocks.
    Recursive,
    /// Reader/writer: many shared holders or one exclusive holder.
    Shared,
}

/// Backing primitive, selected once at construction.
enum Backing {
    Section(RawSection),
    Waitable(RawMutex),
    Shared(RawRwLock),
}

// ---------------------------------------------------------------------------
// Mutex
// ---------------------------------------------------------------------------

/// A mutex whose behavior is chosen by [`MutexKind`] at construction.
///
/// Lock and unlock are deliberately separate calls (no RAII guard): this
/// type exists to carry the C-shaped contract, so releasing is the caller's
/// obligation and [`Mutex::unlock`] is `unsafe` with exactly that contract.
/// Host resources are released on drop.
pub struct Mutex {
    kind: MutexKind,
    backing: Backing,
    recursive: bool,
    /// True iff some thread currently holds this mutex exclusively.
    /// Irrelevant for shared-mode holds and for the `Recursive` kind.
    held: AtomicBool,
}

impl Mutex {
    /// Creates a mutex of the given kind.
    ///
    /// Construction is infallible on this host: every backing primitive is
    /// const-constructible, so the allocation-failure arm lives only where
    /// the host can actually fail (thread spawn, semaphore validation).
    #[must_use]
    pub const fn new(kind: MutexKind) -> Mutex {
        let backing = match kind {
            MutexKind::Plain | MutexKind::Recursive => Backing::Section(RawSection::INIT),
            MutexKind::Timed => Backing::Waitable(RawMutex::INIT),
            MutexKind::Shared => Backing::Shared(RawRwLock::INIT),
        };
        Mutex {
            kind,
            backing,
            recursive: matches!(kind, MutexKind::Recursive),
            held: AtomicBool::new(false),
        }
    }

    /// The kind selected at construction.
    #[must_use]
    pub const fn kind(&self) -> MutexKind {
        self.kind
    }

    /// Acquires the mutex exclusively, blocking until available.
    ///
    /// For non-recursive kinds a second lock from the owning thread blocks
    /// forever — the same deadlock a native non-recursive mutex produces.
    pub fn lock(&self) {
        match &self.backing {
            Backing::Section(section) => section.lock(),
            Backing::Waitable(waitable) => waitable.lock(),
            Backing::Shared(rw) => rw.lock_exclusive(),
        }
        if !self.recursive {
            self.mark_held();
        }
    }

    /// Attempts to acquire the mutex exclusively without blocking.
    pub fn try_lock(&self) -> TryOutcome {
        match &self.backing {
            Backing::Section(section) => {
                if !section.try_lock() {
                    return TryOutcome::Busy;
                }
                if self.recursive {
                    return TryOutcome::Acquired;
                }
                if self.held.load(Ordering::Acquire) {
                    // The owner re-entered its own section: undo the extra
                    // entry and report the mutex as busy.
                    // SAFETY: the try_lock above succeeded on this thread.
                    unsafe { section.unlock() };
                    return TryOutcome::Busy;
                }
                self.held.store(true, Ordering::Release);
                TryOutcome::Acquired
            }
            Backing::Waitable(waitable) => {
                if waitable.try_lock() {
                    self.held.store(true, Ordering::Release);
                    TryOutcome::Acquired
                } else {
                    TryOutcome::Busy
                }
            }
            Backing::Shared(rw) => {
                if rw.try_lock_exclusive() {
                    self.held.store(true, Ordering::Release);
                    TryOutcome::Acquired
                } else {
                    TryOutcome::Busy
                }
            }
        }
    }

    /// Acquires the mutex exclusively, giving up at `deadline`.
    ///
    /// Legal only on the `Timed` kind; other kinds report a precondition
    /// violation. A timeout is an ordinary outcome, distinct from errors.
    pub fn timed_lock(&self, deadline: Timespec) -> Result<TimedOutcome> {
        let Backing::Waitable(waitable) = &self.backing else {
            return Err(Error::Precondition("timed lock requires the timed kind"));
        };
        if waitable.try_lock_for(deadline.budget_from_now()) {
            self.held.store(true, Ordering::Release);
            Ok(TimedOutcome::Completed)
        } else {
            Ok(TimedOutcome::TimedOut)
        }
    }

    /// Releases an exclusive hold.
    ///
    /// # Safety
    ///
    /// The calling thread must currently hold this mutex exclusively
    /// (the `mtx_unlock` contract).
    pub unsafe fn unlock(&self) {
        if !self.recursive {
            // Clear before releasing the backing primitive; see module docs.
            self.held.store(false, Ordering::Release);
        }
        match &self.backing {
            // SAFETY: caller holds the lock, per this function's contract.
            Backing::Section(section) => unsafe { section.unlock() },
            Backing::Waitable(waitable) => unsafe { waitable.unlock() },
            Backing::Shared(rw) => unsafe { rw.unlock_exclusive() },
        }
    }

    /// Acquires the mutex in shared (read) mode. `Shared` kind only.
    pub fn lock_shared(&self) -> Result<()> {
        match &self.backing {
            Backing::Shared(rw) => {
                rw.lock_shared();
                Ok(())
            }
            _ => Err(Error::Precondition("shared lock requires the shared kind")),
        }
    }

    /// Attempts a shared (read) acquisition without blocking. `Shared` kind only.
    pub fn try_lock_shared(&self) -> Result<TryOutcome> {
        match &self.backing {
            Backing::Shared(rw) => Ok(if rw.try_lock_shared() {
                TryOutcome::Acquired
            } else {
                TryOutcome::Busy
            }),
            _ => Err(Error::Precondition("shared lock requires the shared kind")),
        }
    }

    /// Releases a shared hold. `Shared` kind only.
    ///
    /// # Safety
    ///
    /// The calling thread must currently hold this mutex in shared mode.
    pub unsafe fn unlock_shared(&self) -> Result<()> {
        match &self.backing {
            Backing::Shared(rw) => {
                // SAFETY: caller holds a shared lock, per this function's
                // contract.
                unsafe { rw.unlock_shared() };
                Ok(())
            }
            _ => Err(Error::Precondition("shared lock requires the shared kind")),
        }
    }

    /// Sleep-spin until `held` clears, then claim it. Only reachable with
    /// the backing primitive already acquired, so the sole way to observe
    /// `held == true` here is an owner re-entering a reentrant section —
    /// the spin then blocks forever, which is the contract.
    fn mark_held(&self) {
        let mut reported = false;
        while self.held.load(Ordering::Acquire) {
            if !reported {
                reported = true;
                trace!("non-recursive mutex relocked by its owner; blocking");
            }
            thread::sleep(NONRECURSIVE_RETRY);
        }
        self.held.store(true, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
