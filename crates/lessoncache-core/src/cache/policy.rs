//! Staleness and retry policy for cached queries.
//!
//! Windows follow how often each resource actually changes: categories are
//! near static, the dashboard moves with every action, most lists sit in
//! between.

use std::time::Duration;

const MINUTE: u64 = 60;

pub const CATEGORIES_STALE_TIME: Duration = Duration::from_secs(10 * MINUTE);
pub const LESSONS_STALE_TIME: Duration = Duration::from_secs(5 * MINUTE);
pub const LESSON_STALE_TIME: Duration = Duration::from_secs(5 * MINUTE);
pub const DASHBOARD_STALE_TIME: Duration = Duration::from_secs(2 * MINUTE);
pub const ROADMAP_STALE_TIME: Duration = Duration::from_secs(5 * MINUTE);
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5 * MINUTE);

/// Entries nobody has asked for in this long are dropped by garbage collection.
pub const GC_TIME: Duration = Duration::from_secs(10 * MINUTE);

/// Failed fetches are retried this many times before the error is reported.
pub const DEFAULT_RETRY: u32 = 1;

/// Delay before the first retry; doubles for each further attempt.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Backoff before retry number `attempt` (0-based).
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
        .min(MAX_RETRY_DELAY)
}

/// Client-wide defaults.
#[derive(Debug, Clone)]
pub struct QueryClientOptions {
    pub default_stale_time: Duration,
    pub gc_time: Duration,
    pub retry: u32,
    pub retry_delay: Duration,
    /// Refetch stale entries when the window regains focus. Off: backend
    /// scoring calls are expensive, so fewer calls beat fresher data.
    pub refetch_on_window_focus: bool,
    pub refetch_on_reconnect: bool,
}

impl Default for QueryClientOptions {
    fn default() -> Self {
        Self {
            default_stale_time: DEFAULT_STALE_TIME,
            gc_time: GC_TIME,
            retry: DEFAULT_RETRY,
            retry_delay: RETRY_DELAY,
            refetch_on_window_focus: false,
            refetch_on_reconnect: false,
        }
    }
}

/// Per-query options.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub stale_time: Duration,
    /// Disabled queries never fetch (e.g. a lesson id that is not known yet).
    pub enabled: bool,
    /// Overrides the client's retry count.
    pub retry: Option<u32>,
}

impl QueryOptions {
    pub fn stale_after(stale_time: Duration) -> Self {
        Self {
            stale_time,
            enabled: true,
            retry: None,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = Some(retry);
        self
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::stale_after(DEFAULT_STALE_TIME)
    }
}
