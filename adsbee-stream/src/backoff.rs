//! Exponential reconnect backoff.

use std::time::Duration;

/// Reconnect delay that doubles after every failed attempt.
///
/// The delay starts at `min`, is capped at `max`, and returns to `min` on
/// [`reset`](Backoff::reset).
///
/// ```rust
/// use std::time::Duration;
/// use adsbee_stream::Backoff;
///
/// let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));
/// let delays: Vec<u64> = (0..7).map(|_| backoff.next_delay().as_secs()).collect();
/// assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// Create a backoff. A `max` below `min` is raised to `min`.
    pub fn new(min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self {
            min,
            max,
            current: min,
        }
    }

    /// The delay the next call to [`next_delay`](Backoff::next_delay) returns.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Take the delay for this failure and double it for the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self
            .current
            .checked_mul(2)
            .map_or(self.max, |doubled| doubled.min(self.max));
        delay
    }

    /// Return to the minimum delay after a successful connection.
    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_doubles_until_capped() {
        let mut backoff = Backoff::new(secs(1), secs(30));
        let delays: Vec<_> = (0..9).map(|_| backoff.next_delay()).collect();

        assert_eq!(
            delays,
            vec![secs(1), secs(2), secs(4), secs(8), secs(16), secs(30), secs(30), secs(30), secs(30)]
        );
    }

    #[test]
    fn test_reset_returns_to_min() {
        let mut backoff = Backoff::new(secs(1), secs(30));
        for _ in 0..4 {
            backoff.next_delay();
        }
        assert_eq!(backoff.current(), secs(16));

        backoff.reset();
        assert_eq!(backoff.next_delay(), secs(1));
        assert_eq!(backoff.next_delay(), secs(2));
    }

    #[test]
    fn test_fractional_bounds() {
        let mut backoff = Backoff::new(Duration::from_millis(250), Duration::from_millis(900));
        let delays: Vec<_> = (0..4).map(|_| backoff.next_delay().as_millis()).collect();

        assert_eq!(delays, vec![250, 500, 900, 900]);
    }

    #[test]
    fn test_max_below_min_is_raised() {
        let mut backoff = Backoff::new(secs(5), secs(1));
        assert_eq!(backoff.next_delay(), secs(5));
        assert_eq!(backoff.next_delay(), secs(5));
    }

    #[test]
    fn test_huge_max_does_not_overflow() {
        let mut backoff = Backoff::new(secs(1), Duration::MAX);
        for _ in 0..200 {
            assert!(backoff.next_delay() >= secs(1));
        }
        assert_eq!(backoff.current(), Duration::MAX);
    }
}
