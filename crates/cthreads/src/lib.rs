//! # cthreads
//!
//! A C11-`threads.h`-shaped threading layer built on host primitives that
//! do not match it one-for-one.
//!
//! The host offers a natively reentrant critical section, a kernel-waitable
//! timed lock, a slim reader/writer lock, a condition variable bound to its
//! own paired lock, a run-once cell, and destructor-less thread-local
//! slots. The C11 surface wants non-recursive mutexes, condvars usable with
//! any mutex kind, counting semaphores, and thread-local storage with
//! exit-time destructors. Each module here closes one of those gaps:
//!
//! - [`mutex`] — one mutex type over three backings, with a held-flag
//!   emulation restoring non-recursive semantics on the reentrant section;
//! - [`cond`] — the private-lock protocol making release-and-park atomic
//!   against signalers for any mutex kind;
//! - [`sem`] — a counting semaphore over the host lock/condvar pair;
//! - [`once`] — one-time initialization;
//! - [`tss`] — the key registry, generation scheme, and bounded exit-time
//!   destructor drain;
//! - [`thread`] — the lifecycle trampoline routing every exit path through
//!   the drain;
//! - [`time`] — the absolute-deadline type and deadline-to-budget
//!   conversion;
//! - [`error`] — the error taxonomy and expected-outcome types.
//!
//! Blocking calls that cannot fail return `()` or an outcome enum; calls
//! with real failure modes return [`error::Result`].

pub mod cond;
pub mod error;
pub mod mutex;
pub mod once;
pub mod sem;
pub mod thread;
pub mod time;
pub mod tss;

pub use cond::Condvar;
pub use error::{Error, Result, SleepOutcome, TimedOutcome, TryOutcome};
pub use mutex::{Mutex, MutexKind};
pub use once::OnceFlag;
pub use sem::Semaphore;
pub use thread::{Thread, ThreadStart, exit_thread, spawn};
pub use time::Timespec;
pub use tss::{TSS_DTOR_ITERATIONS, TSS_KEYS_MAX, TssKey};
