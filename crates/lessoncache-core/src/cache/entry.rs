use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// A stored query result.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: Instant,
    /// Wall-clock time of the fetch, for display.
    pub cached_at: DateTime<Utc>,
    pub stale_time: Duration,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, stale_time: Duration) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
            cached_at: Utc::now(),
            stale_time,
        }
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn is_stale(&self) -> bool {
        self.age() >= self.stale_time
    }

    pub fn map<U>(&self, f: impl FnOnce(&V) -> U) -> CacheEntry<U> {
        CacheEntry {
            value: f(&self.value),
            fetched_at: self.fetched_at,
            cached_at: self.cached_at,
            stale_time: self.stale_time,
        }
    }

    /// Age for a freshness label: "just now" under a minute, otherwise the
    /// largest whole unit, rounded to nearest ("2h ago", "3d ago").
    pub fn age_display(&self) -> String {
        const UNITS: [(u64, &str); 3] = [(86_400, "d"), (3_600, "h"), (60, "m")];
        let secs = self.age().as_secs();
        UNITS
            .iter()
            .find(|(size, _)| secs >= *size)
            .map(|(size, suffix)| format!("{}{} ago", (secs + size / 2) / size, suffix))
            .unwrap_or_else(|| "just now".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_staleness_boundary() {
        let entry = CacheEntry::new(1, Duration::from_secs(60));
        assert!(!entry.is_stale());
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!entry.is_stale());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(entry.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn test_age_display() {
        let entry = CacheEntry::new((), Duration::from_secs(60));
        assert_eq!(entry.age_display(), "just now");
        tokio::time::advance(Duration::from_secs(5 * 60)).await;
        assert_eq!(entry.age_display(), "5m ago");
        tokio::time::advance(Duration::from_secs(90 * 60)).await;
        assert_eq!(entry.age_display(), "2h ago");
        tokio::time::advance(Duration::from_secs(2 * 24 * 3600)).await;
        assert_eq!(entry.age_display(), "2d ago");
    }

    #[tokio::test(start_paused = true)]
    async fn test_age_display_rounds_to_nearest_unit() {
        let entry = CacheEntry::new((), Duration::from_secs(60));
        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(entry.age_display(), "just now");
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(entry.age_display(), "1m ago");
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(entry.age_display(), "2m ago");
        // 1h 29m rounds down, 1h 30m rounds up
        tokio::time::advance(Duration::from_secs(3600 + 29 * 60 - 149)).await;
        assert_eq!(entry.age_display(), "1h ago");
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(entry.age_display(), "2h ago");
    }
}
