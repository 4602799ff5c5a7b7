//! Speed dispatch throttle
//!
//! Slider drags produce a burst of values. With a minimum interval set, at
//! most one speed command goes out per interval; the latest value in between
//! is held by the dispatcher and flushed once the window reopens (trailing
//! edge). A zero interval disables throttling and every value is sent.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct DispatchThrottle {
    min_interval: Duration,
    last_sent: Option<Instant>,
}

impl DispatchThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_sent: None,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn is_unlimited(&self) -> bool {
        self.min_interval.is_zero()
    }

    /// Claim a send slot at `now`. Returns false while the window is closed.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if !self.is_unlimited() {
            if let Some(last) = self.last_sent {
                if now.saturating_duration_since(last) < self.min_interval {
                    return false;
                }
            }
        }
        self.last_sent = Some(now);
        true
    }
}

impl Default for DispatchThrottle {
    fn default() -> Self {
        Self::unlimited()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_always_acquires() {
        let mut throttle = DispatchThrottle::unlimited();
        let now = Instant::now();
        assert!(throttle.try_acquire(now));
        assert!(throttle.try_acquire(now));
    }

    #[test]
    fn test_window() {
        let mut throttle = DispatchThrottle::new(Duration::from_millis(100));
        let start = Instant::now();

        assert!(throttle.try_acquire(start));
        assert!(!throttle.try_acquire(start + Duration::from_millis(99)));
        assert!(throttle.try_acquire(start + Duration::from_millis(100)));
        assert!(!throttle.try_acquire(start + Duration::from_millis(150)));
    }
}
