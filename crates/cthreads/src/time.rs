//! Deadline conversion.
//!
//! The public API takes absolute deadlines as [`Timespec`] values while the
//! host wait primitives take relative budgets. This module owns that
//! conversion: normalize nanosecond overflow/underflow, clamp deadlines in
//! the past to a zero budget, and round the budget up to whole milliseconds
//! so a wait never expires before its absolute deadline.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Nanoseconds per second.
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

const NANOS_PER_MILLI: i64 = 1_000_000;

/// An absolute point in time: seconds and nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timespec {
    /// Seconds.
    pub tv_sec: i64,
    /// Nanoseconds. A normalized value lies in `[0, 999_999_999]`.
    pub tv_nsec: i64,
}

/// Returns true if `tv_nsec` is within the normalized range.
#[must_use]
pub const fn valid_timespec_nsec(tv_nsec: i64) -> bool {
    tv_nsec >= 0 && tv_nsec < NANOS_PER_SEC
}

impl Timespec {
    /// The current wall-clock time.
    pub fn now() -> Self {
        // Pre-epoch system clocks are not a supported host configuration.
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        Timespec {
            tv_sec: since_epoch.as_secs() as i64,
            tv_nsec: i64::from(since_epoch.subsec_nanos()),
        }
    }

    /// An absolute deadline `ahead` from now.
    pub fn after(ahead: Duration) -> Self {
        let now = Self::now();
        Timespec {
            tv_sec: now.tv_sec + ahead.as_secs() as i64,
            tv_nsec: now.tv_nsec + i64::from(ahead.subsec_nanos()),
        }
        .normalized()
    }

    /// Folds nanosecond overflow/underflow into the seconds field.
    #[must_use]
    pub const fn normalized(self) -> Self {
        Timespec {
            tv_sec: self.tv_sec + self.tv_nsec.div_euclid(NANOS_PER_SEC),
            tv_nsec: self.tv_nsec.rem_euclid(NANOS_PER_SEC),
        }
    }

    /// Relative wait budget from `now` to this deadline, in whole
    /// milliseconds rounded up. Deadlines at or before `now` yield zero;
    /// spans too wide for nanosecond arithmetic saturate to the maximum
    /// budget rather than wrapping, so a far-future deadline waits long,
    /// never returns instantly.
    #[must_use]
    pub const fn budget_from(self, now: Timespec) -> Duration {
        let this = self.normalized();
        let now = now.normalized();
        let sec_span = this.tv_sec.saturating_sub(now.tv_sec);
        let nsec_span = this.tv_nsec - now.tv_nsec;
        let total_nanos = sec_span
            .saturating_mul(NANOS_PER_SEC)
            .saturating_add(nsec_span);
        if total_nanos <= 0 {
            return Duration::ZERO;
        }
        // Round up: waking a millisecond late is fine, waking early is not.
        // The remainder form cannot overflow where the add-then-divide
        // form would, at spans near the saturation point.
        let millis = (total_nanos / NANOS_PER_MILLI)
            .saturating_add((total_nanos % NANOS_PER_MILLI != 0) as i64);
        Duration::from_millis(millis as u64)
    }

    /// Relative wait budget from the current wall-clock time.
    pub fn budget_from_now(self) -> Duration {
        self.budget_from(Self::now())
    }
}
