//! Backoff policy for reconnect attempts.
//!
//! [`ReconnectPolicy`] controls how retry delays grow after repeated
//! connector failures and when the supervisor stops retrying. It is
//! parameterized by:
//! - [`ReconnectPolicy::step`] the linear growth increment;
//! - [`ReconnectPolicy::max_delay`] the delay ceiling;
//! - [`ReconnectPolicy::max_attempts`] the terminal attempt cap.
//!
//! The delay for attempt `n` is `step × max(n, 1)`, clamped to `max_delay`.
//! The function is pure and deterministic, and never decreases for a higher
//! attempt count.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use linkvisor::ReconnectPolicy;
//!
//! let policy = ReconnectPolicy {
//!     step: Duration::from_secs(1),
//!     max_delay: Duration::from_secs(10),
//!     max_attempts: 5,
//! };
//!
//! assert_eq!(policy.next(1), Duration::from_secs(1));
//! assert_eq!(policy.next(4), Duration::from_secs(4));
//! // attempt 30 computes 30s, capped at max_delay=10s
//! assert_eq!(policy.next(30), Duration::from_secs(10));
//! assert!(policy.is_exhausted(5));
//! ```

use std::time::Duration;

/// Reconnect backoff policy.
///
/// Encapsulates the parameters that determine how retry delays grow and when
/// the session transitions to its terminal `Failed` state.
#[derive(Clone, Copy, Debug)]
pub struct ReconnectPolicy {
    /// Linear increment: attempt `n` waits `step × n`.
    pub step: Duration,
    /// Ceiling for the computed delay.
    pub max_delay: Duration,
    /// Attempt count at which the session is considered exhausted.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    /// Returns a policy with:
    /// - `step = 1s`;
    /// - `max_delay = 10s`;
    /// - `max_attempts = 5`.
    fn default() -> Self {
        Self {
            step: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Computes the delay for the given attempt number.
    ///
    /// The base delay is `step × max(attempt, 1)`, clamped to
    /// [`ReconnectPolicy::max_delay`]. Attempt `0` is treated as `1` so the
    /// first retry never fires immediately.
    pub fn next(&self, attempt: u32) -> Duration {
        let n = attempt.max(1);
        self.step
            .checked_mul(n)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Returns `true` once `attempt` reaches [`ReconnectPolicy::max_attempts`].
    ///
    /// Once exhausted, the supervisor must not arm further retry timers and
    /// instead broadcasts a terminal `max-reconnect` event.
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_zero_treated_as_one() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.next(0), policy.next(1));
        assert_eq!(policy.next(0), Duration::from_secs(1));
    }

    #[test]
    fn test_linear_growth() {
        let policy = ReconnectPolicy {
            step: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            max_attempts: 5,
        };
        assert_eq!(policy.next(1), Duration::from_millis(500));
        assert_eq!(policy.next(2), Duration::from_millis(1000));
        assert_eq!(policy.next(3), Duration::from_millis(1500));
        assert_eq!(policy.next(4), Duration::from_millis(2000));
    }

    #[test]
    fn test_clamped_to_max_delay() {
        let policy = ReconnectPolicy {
            step: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_attempts: 100,
        };
        assert_eq!(policy.next(10), Duration::from_secs(10));
        assert_eq!(policy.next(99), Duration::from_secs(10));
    }

    #[test]
    fn test_monotone_non_decreasing() {
        let policy = ReconnectPolicy::default();
        let mut prev = Duration::ZERO;
        for attempt in 0..50 {
            let d = policy.next(attempt);
            assert!(d >= prev, "attempt {attempt}: {d:?} < {prev:?}");
            prev = d;
        }
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let policy = ReconnectPolicy {
            step: Duration::from_secs(u64::MAX / 2),
            max_delay: Duration::from_secs(10),
            max_attempts: 3,
        };
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_exhaustion_boundary() {
        let policy = ReconnectPolicy {
            step: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_attempts: 3,
        };
        assert!(!policy.is_exhausted(0));
        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
        assert!(policy.is_exhausted(4));
    }
}
