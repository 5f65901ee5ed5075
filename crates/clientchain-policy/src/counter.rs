//! Keyed counter with TTL — backs the rate limiter.
//!
//! Modeled as an external service behind a trait (the production deployment
//! can point this at Redis INCR/EXPIRE); the bundled implementation keeps
//! counts in memory and expires them against the injected clock.

use crate::clock::Clock;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Increment-and-read counter keyed by string, entries expiring after `ttl`.
pub trait RateCounter: Send + Sync {
    /// Increment `key` and return the post-increment count. The first
    /// increment of a key starts its TTL window.
    fn incr(&self, key: &str, ttl: chrono::Duration) -> u64;
}

/// In-memory counter with per-key expiry.
pub struct InMemoryCounter {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CounterEntry>>,
}

struct CounterEntry {
    count: u64,
    expires_at: DateTime<Utc>,
}

impl InMemoryCounter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Current count for a key without incrementing (0 if absent/expired).
    pub fn peek(&self, key: &str) -> u64 {
        let now = self.clock.now();
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.count)
            .unwrap_or(0)
    }
}

impl RateCounter for InMemoryCounter {
    fn incr(&self, key: &str, ttl: chrono::Duration) -> u64 {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap();

        // Drop the expired entry so the window restarts.
        if entries.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(key);
        }

        let entry = entries.entry(key.to_string()).or_insert(CounterEntry {
            count: 0,
            expires_at: now + ttl,
        });
        entry.count += 1;
        entry.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::at(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_incr_counts_up() {
        let counter = InMemoryCounter::new(clock());
        let day = chrono::Duration::hours(24);
        assert_eq!(counter.incr("k", day), 1);
        assert_eq!(counter.incr("k", day), 2);
        assert_eq!(counter.incr("other", day), 1);
        assert_eq!(counter.peek("k"), 2);
    }

    #[test]
    fn test_expiry_restarts_window() {
        let clock = clock();
        let counter = InMemoryCounter::new(clock.clone());
        let day = chrono::Duration::hours(24);

        counter.incr("k", day);
        counter.incr("k", day);
        clock.advance(chrono::Duration::hours(25));

        assert_eq!(counter.peek("k"), 0);
        assert_eq!(counter.incr("k", day), 1);
    }
}
