//! # Fibonacci Backoff
//!
//! Progressive backoff for failed reconciles. It grows more slowly than
//! exponential backoff, so a SecurityConfig whose Application is briefly
//! missing is retried often without hammering the API server.
//!
//! With the default bounds the sequence is 60s, 60s, 120s, 180s, 300s, 480s,
//! 600s and then stays at 600s.
//!
//! ```rust
//! use accesserator::controller::backoff::FibonacciBackoff;
//!
//! let mut backoff = FibonacciBackoff::new(60, 600);
//! assert_eq!(backoff.next_backoff_seconds(), 60);
//! assert_eq!(backoff.next_backoff_seconds(), 60);
//! assert_eq!(backoff.next_backoff_seconds(), 120);
//! ```

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_secs: u64,
    prev_secs: u64,
    current_secs: u64,
    max_secs: u64,
}

impl FibonacciBackoff {
    /// `min_secs` is used for the first two values, `max_secs` caps the sequence
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs,
            prev_secs: 0,
            current_secs: min_secs.min(max_secs),
            max_secs,
        }
    }

    /// Return the current backoff and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result = self.current_secs;
        let next = self.prev_secs.saturating_add(self.current_secs);
        self.prev_secs = self.current_secs;
        self.current_secs = next.min(self.max_secs);
        result
    }

    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Restart from the minimum after a successful reconcile
    pub fn reset(&mut self) {
        self.prev_secs = 0;
        self.current_secs = self.min_secs.min(self.max_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fibonacci_backoff_sequence_caps_at_max() {
        let mut backoff = FibonacciBackoff::new(60, 600);
        let seq: Vec<u64> = (0..9).map(|_| backoff.next_backoff_seconds()).collect();
        assert_eq!(seq, vec![60, 60, 120, 180, 300, 480, 600, 600, 600]);
    }

    #[test]
    fn test_fibonacci_backoff_reset() {
        let mut backoff = FibonacciBackoff::new(60, 600);
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.reset();
        assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
    }

    #[test]
    fn test_min_above_max_is_clamped() {
        let mut backoff = FibonacciBackoff::new(900, 600);
        assert_eq!(backoff.next_backoff_seconds(), 600);
    }
}
