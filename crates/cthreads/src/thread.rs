//! Thread lifecycle wrapper.
//!
//! Threads run a C-shaped entry point (`fn(usize) -> i32`) inside a
//! trampoline that owns every path out of user code:
//!
//! - normal return carries the entry's value as the exit code;
//! - [`exit_thread`] unwinds to the trampoline with an explicit code, so
//!   any function on the call stack can terminate the thread;
//! - a foreign panic is caught, drained, and re-raised so the host's usual
//!   propagation (a join error) still happens.
//!
//! On *all three* paths the trampoline runs the thread-specific storage
//! drain before the thread disappears, so destructors registered through
//! [`crate::tss::create_key`] are never skipped.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self as host, JoinHandle};
use std::time::Duration;

use log::trace;

use crate::error::{Error, Result, SleepOutcome};
use crate::tss;

/// Entry point signature for spawned threads: one word in, exit code out.
pub type ThreadStart = fn(usize) -> i32;

/// Unwind payload used by [`exit_thread`]. Recognized only by the
/// trampoline; anything else unwinding past it is a foreign panic.
struct ExitRequest(i32);

/// Handle to a spawned thread.
///
/// The handle must be consumed exactly once, by [`Thread::join`] or
/// [`Thread::detach`]; ownership enforces this.
pub struct Thread {
    handle: JoinHandle<i32>,
}

/// Spawns a thread running `entry(arg)` under the lifecycle trampoline.
///
/// Fails with [`Error::OutOfMemory`] when the host cannot allocate the
/// thread's resources.
pub fn spawn(entry: ThreadStart, arg: usize) -> Result<Thread> {
    let handle = host::Builder::new()
        .spawn(move || trampoline(entry, arg))
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::OutOfMemory => Error::OutOfMemory,
            _ => Error::Host("thread creation failed"),
        })?;
    Ok(Thread { handle })
}

fn trampoline(entry: ThreadStart, arg: usize) -> i32 {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| entry(arg)));
    match outcome {
        Ok(code) => {
            tss::drain_current_thread();
            code
        }
        Err(payload) => match payload.downcast::<ExitRequest>() {
            Ok(request) => {
                trace!("thread: explicit exit with code {}", request.0);
                tss::drain_current_thread();
                request.0
            }
            Err(payload) => {
                // Foreign panic: drain first, then let the host's panic
                // machinery report it to the joiner.
                tss::drain_current_thread();
                panic::resume_unwind(payload)
            }
        },
    }
}

/// Terminates the calling thread with `code`, unwinding the stack back to
/// the lifecycle trampoline. Destructors of in-scope values run during the
/// unwind; the thread-specific storage drain runs afterward.
///
/// Must only be called on threads created through [`spawn`]; on any other
/// thread there is no trampoline to catch the request and it surfaces as an
/// ordinary panic.
pub fn exit_thread(code: i32) -> ! {
    panic::panic_any(ExitRequest(code))
}

impl Thread {
    /// Blocks until the thread finishes and returns its exit code.
    ///
    /// A thread terminated by a foreign panic yields an error rather than
    /// a fabricated code.
    pub fn join(self) -> Result<i32> {
        self.handle
            .join()
            .map_err(|_| Error::Host("thread terminated by foreign panic"))
    }

    /// Releases the handle without waiting. The thread keeps running; its
    /// exit code is discarded when it finishes.
    pub fn detach(self) {
        drop(self.handle);
    }
}

/// An opaque identifier for the calling thread, unique among live threads.
#[must_use]
pub fn current_id() -> host::ThreadId {
    host::current().id()
}

/// Yields the remainder of the calling thread's timeslice.
pub fn yield_now() {
    host::yield_now();
}

/// Suspends the calling thread for at least `duration`.
///
/// The host sleep is uninterruptible, so this always reports
/// [`SleepOutcome::Completed`]; the interrupted variant exists for hosts
/// whose sleep can be cut short.
pub fn sleep(duration: Duration) -> SleepOutcome {
    host::sleep(duration);
    SleepOutcome::Completed
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
