//! One-time initialization.
//!
//! Delegates entirely to the host's interlocked run-once primitive: the
//! "two callers enter simultaneously" race converges to a single execution
//! inside the host, not through ad hoc locking here.

use parking_lot::Once as HostOnce;

/// A flag enforcing "run this initializer exactly once across all callers".
///
/// The flag starts out not-run and transitions permanently once the
/// initializer completes. There is no reset.
pub struct OnceFlag {
    inner: HostOnce,
}

impl OnceFlag {
    /// A flag in the not-yet-run state. Const, so flags can live in statics.
    #[must_use]
    pub const fn new() -> OnceFlag {
        OnceFlag {
            inner: HostOnce::new(),
        }
    }

    /// Runs `init` if no caller has run it yet. Among any number of racing
    /// callers exactly one executes `init` to completion; every caller
    /// returns only after that one execution has completed.
    pub fn call_once<F: FnOnce()>(&self, init: F) {
        self.inner.call_once(init);
    }

    /// True once the initializer has run to completion.
    #[must_use]
    pub fn has_run(&self) -> bool {
        self.inner.state().done()
    }
}

impl Default for OnceFlag {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_exactly_once_sequentially() {
        let flag = OnceFlag::new();
        let runs = AtomicUsize::new(0);
        assert!(!flag.has_run());
        flag.call_once(|| {
            runs.fetch_add(1, Ordering::SeqCst);
        });
        flag.call_once(|| {
            runs.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(flag.has_run());
    }

    #[test]
    fn racing_callers_converge_to_one_execution() {
        let flag = Arc::new(OnceFlag::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let mut callers = Vec::new();
        for _ in 0..8 {
            let flag = Arc::clone(&flag);
            let runs = Arc::clone(&runs);
            callers.push(std::thread::spawn(move || {
                flag.call_once(|| {
                    // Widen the race window so losers really do overlap.
                    std::thread::sleep(std::time::Duration::from_millis(10));
                    runs.fetch_add(1, Ordering::SeqCst);
                });
                // Every caller observes the initializer as completed.
                assert_eq!(runs.load(Ordering::SeqCst), 1);
            }));
        }
        for caller in callers {
            caller.join().unwrap();
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
