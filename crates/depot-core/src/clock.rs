//! Wall-clock abstraction.
//!
//! Everything time-sensitive in Depot (capability expiry, session expiry, rate
//! limit windows) takes the current time as a plain number of seconds so that
//! it can be tested deterministically. [`Clock`] is the seam the HTTP layer
//! reads "now" through.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Seconds since the Unix epoch.
pub type EpochSeconds = i64;

/// Source of the current time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time in seconds since the Unix epoch.
    fn now(&self) -> EpochSeconds;

    /// Current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64 {
        self.now().saturating_mul(1000)
    }
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> EpochSeconds {
        Utc::now().timestamp()
    }

    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A manually driven clock for tests.
///
/// # Examples
///
/// ```
/// use depot_core::{Clock, FixedClock};
///
/// let clock = FixedClock::new(1000);
/// clock.advance(5);
/// assert_eq!(clock.now(), 1005);
/// ```
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    /// Create a clock frozen at `now`.
    #[must_use]
    pub fn new(now: EpochSeconds) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Move the clock to `now`.
    pub fn set(&self, now: EpochSeconds) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move the clock forward by `secs`.
    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> EpochSeconds {
        self.now.load(Ordering::SeqCst)
    }
}
