//! Result taxonomy for the threading adapter.
//!
//! Two families of outcomes exist and are deliberately kept apart:
//! genuine failures (`Error`) and expected non-success results
//! (`TryOutcome::Busy`, `TimedOutcome::TimedOut`). A timed wait that
//! elapses or a try-lock that finds the resource held is a normal,
//! checkable value — callers must never have to fish a timeout out of
//! an error enum.

use thiserror::Error;

/// Failures reported by the adapter layer.
///
/// Timeouts and busy results are *not* represented here; they are carried
/// by [`TimedOutcome`] and [`TryOutcome`] respectively.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The host failed to allocate a kernel object or heap record.
    #[error("host allocation failed")]
    OutOfMemory,

    /// The fixed-capacity thread-local key table is full.
    #[error("thread-local key capacity ({0}) exhausted")]
    SlotsExhausted(usize),

    /// An underlying host primitive reported a failure the adapter
    /// cannot interpret further.
    #[error("host primitive failure: {0}")]
    Host(&'static str),

    /// The caller invoked an operation on the wrong primitive kind or
    /// with arguments that violate the operation's contract.
    #[error("precondition violated: {0}")]
    Precondition(&'static str),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Outcome of a non-blocking acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum TryOutcome {
    /// The resource was acquired.
    Acquired,
    /// The resource is currently unavailable. Expected outcome, not an error.
    Busy,
}

impl TryOutcome {
    /// Returns true when the attempt acquired the resource.
    pub const fn acquired(self) -> bool {
        matches!(self, TryOutcome::Acquired)
    }
}

/// Outcome of a deadline-bounded blocking operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum TimedOutcome {
    /// The operation completed (lock acquired, wakeup consumed, count taken).
    Completed,
    /// The absolute deadline elapsed first. Expected outcome, not an error.
    TimedOut,
}

impl TimedOutcome {
    /// Returns true when the operation completed before the deadline.
    pub const fn completed(self) -> bool {
        matches!(self, TimedOutcome::Completed)
    }
}

/// Outcome of a bounded sleep.
///
/// This host's sleep primitive always runs to completion; `Interrupted`
/// exists for hosts whose sleep can be cut short, so callers written
/// against this API stay portable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum SleepOutcome {
    /// The full duration elapsed.
    Completed,
    /// The sleep was interrupted by the host before the duration elapsed.
    Interrupted,
}
