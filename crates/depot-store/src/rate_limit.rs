//! Fixed-window request rate limiting.
//!
//! Counters are keyed by `(client, class)`. A window opens on the first
//! request and resets once it has passed. Expired windows are swept every
//! [`SWEEP_EVERY`] checks.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::{debug, trace};

/// Sweep expired windows after this many checks.
const SWEEP_EVERY: u64 = 1024;

/// Endpoint class with its own budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateClass {
    /// Login, logout, and identity lookups.
    Auth,
    /// File uploads.
    Upload,
    /// File downloads and capability issuance.
    Download,
    /// Administrative actions.
    Admin,
}

impl RateClass {
    /// Requests allowed per window.
    #[must_use]
    pub fn limit(self) -> u32 {
        match self {
            Self::Auth => 1000,
            Self::Upload | Self::Download => 10_000,
            Self::Admin => 500,
        }
    }

    /// Window length in milliseconds.
    #[must_use]
    pub fn window_ms(self) -> i64 {
        match self {
            Self::Upload => 60 * 60 * 1000,
            Self::Auth | Self::Download | Self::Admin => 60 * 1000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at_ms: i64,
}

/// Shared fixed-window limiter.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: DashMap<(String, RateClass), Window>,
    checks: AtomicU64,
}

impl RateLimiter {
    /// Create an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request from `client` in `class` at `now_ms`.
    ///
    /// Returns `Err(retry_after_secs)` once the window's budget is spent.
    pub fn check(&self, client: &str, class: RateClass, now_ms: i64) -> Result<(), u64> {
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep(now_ms);
        }

        let mut window = self
            .windows
            .entry((client.to_owned(), class))
            .or_insert(Window {
                count: 0,
                reset_at_ms: now_ms + class.window_ms(),
            });

        if now_ms > window.reset_at_ms {
            window.count = 0;
            window.reset_at_ms = now_ms + class.window_ms();
        }
        window.count = window.count.saturating_add(1);

        if window.count > class.limit() {
            let remaining_ms = (window.reset_at_ms - now_ms).max(0);
            let retry_after = u64::try_from((remaining_ms + 999) / 1000).unwrap_or(0);
            debug!(client, ?class, retry_after, "rate limit exceeded");
            return Err(retry_after);
        }
        Ok(())
    }

    /// Drop every window that has expired at `now_ms`.
    pub fn sweep(&self, now_ms: i64) {
        let before = self.windows.len();
        self.windows.retain(|_, w| now_ms <= w.reset_at_ms);
        trace!(removed = before - self.windows.len(), "swept rate limit windows");
    }

    /// Number of tracked windows.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}
