//! Touch and expiry bookkeeping.

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::time::{Duration, Instant};

/// Recency stamp of a conversation.
///
/// Orders most recently touched first, so a sorted list ends with the best
/// eviction candidates. Ties are broken by conversation number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recency {
    /// Last activity.
    pub last_touched: Instant,
    /// Conversation number.
    pub number: u32,
}

impl Ord for Recency {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .last_touched
            .cmp(&self.last_touched)
            .then(self.number.cmp(&other.number))
    }
}

impl PartialOrd for Recency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Last-activity clock of one conversation.
#[derive(Debug)]
pub(crate) struct TouchClock {
    last_touched: Mutex<Instant>,
    timeout: Duration,
}

impl TouchClock {
    pub(crate) fn new(now: Instant, timeout: Duration) -> Self {
        Self {
            last_touched: Mutex::new(now),
            timeout,
        }
    }

    pub(crate) fn touch_at(&self, now: Instant) {
        *self.last_touched.lock() = now;
    }

    pub(crate) fn last_touched(&self) -> Instant {
        *self.last_touched.lock()
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Expired once the idle time strictly exceeds the timeout.
    pub(crate) fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_touched()) > self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_boundary() {
        let t = Instant::now();
        let clock = TouchClock::new(t, Duration::from_secs(120));
        let eps = Duration::from_millis(1);

        assert!(!clock.is_expired_at(t + Duration::from_secs(120) - eps));
        assert!(!clock.is_expired_at(t + Duration::from_secs(120)));
        assert!(clock.is_expired_at(t + Duration::from_secs(120) + eps));
    }

    #[test]
    fn touch_resets_idle_time() {
        let t = Instant::now();
        let clock = TouchClock::new(t, Duration::from_secs(10));
        clock.touch_at(t + Duration::from_secs(8));

        assert!(!clock.is_expired_at(t + Duration::from_secs(15)));
        assert_eq!(clock.last_touched(), t + Duration::from_secs(8));
    }

    #[test]
    fn clock_before_touch_is_not_expired() {
        let t = Instant::now() + Duration::from_secs(60);
        let clock = TouchClock::new(t, Duration::from_secs(1));
        assert!(!clock.is_expired_at(Instant::now()));
    }

    #[test]
    fn recency_orders_most_recent_first() {
        let t = Instant::now();
        let old = Recency {
            last_touched: t,
            number: 1,
        };
        let new = Recency {
            last_touched: t + Duration::from_secs(1),
            number: 2,
        };
        let tie = Recency {
            last_touched: t + Duration::from_secs(1),
            number: 3,
        };

        let mut stamps = vec![old, tie, new];
        stamps.sort();
        assert_eq!(stamps, vec![new, tie, old]);
    }
}
