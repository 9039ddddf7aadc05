//! Bounded retry with fixed escalating backoff.
//!
//! Pure accounting over consecutive failures. The supervisor loop asks this
//! tracker what to do after each failed segment; the tracker never sleeps and
//! never touches the playlist.

use std::time::Duration;

/// Default first-retry delay; the ladder doubles from here
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(5);

/// Consecutive failures that end the stream. The third failure is terminal,
/// so at most two backoff waits happen per streak.
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// What to do after a failed segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then relaunch the same segment
    RetryAfter(Duration),
    /// The failure ceiling is reached; terminate the stream
    GiveUp,
}

/// Tracks consecutive failures for one stream.
///
/// Any successful segment resets the counter, so the ceiling only trips on
/// uninterrupted runs of failures.
#[derive(Debug)]
pub struct RetryTracker {
    consecutive_failures: u32,
    delays: [Duration; 2],
}

impl Default for RetryTracker {
    fn default() -> Self {
        Self::with_base_delay(DEFAULT_RETRY_BASE_DELAY)
    }
}

impl RetryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker whose ladder starts at `base` and doubles once
    pub fn with_base_delay(base: Duration) -> Self {
        Self {
            consecutive_failures: 0,
            delays: [base, base * 2],
        }
    }

    /// Record a failed segment and decide whether to retry
    pub fn record_failure(&mut self) -> RetryDecision {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
            return RetryDecision::GiveUp;
        }
        let index = ((self.consecutive_failures - 1) as usize).min(self.delays.len() - 1);
        RetryDecision::RetryAfter(self.delays[index])
    }

    /// Record a clean segment, resetting the failure streak
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The third consecutive failure is terminal.
    #[test]
    fn test_delays_escalate_then_give_up() {
        let mut tracker = RetryTracker::new();

        assert_eq!(
            tracker.record_failure(),
            RetryDecision::RetryAfter(Duration::from_secs(5))
        );
        assert_eq!(
            tracker.record_failure(),
            RetryDecision::RetryAfter(Duration::from_secs(10))
        );
        assert_eq!(tracker.record_failure(), RetryDecision::GiveUp);
    }

    #[test]
    fn test_base_delay_scales_the_ladder() {
        let mut tracker = RetryTracker::with_base_delay(Duration::from_millis(10));

        assert_eq!(
            tracker.record_failure(),
            RetryDecision::RetryAfter(Duration::from_millis(10))
        );
        assert_eq!(
            tracker.record_failure(),
            RetryDecision::RetryAfter(Duration::from_millis(20))
        );
        assert_eq!(tracker.record_failure(), RetryDecision::GiveUp);
    }

    // fail, fail, success resets the streak: the next failure starts over.
    #[test]
    fn test_success_resets_streak() {
        let mut tracker = RetryTracker::new();

        tracker.record_failure();
        tracker.record_failure();
        assert_eq!(tracker.consecutive_failures(), 2);

        tracker.record_success();
        assert_eq!(tracker.consecutive_failures(), 0);

        assert_eq!(
            tracker.record_failure(),
            RetryDecision::RetryAfter(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_give_up_is_sticky_until_success() {
        let mut tracker = RetryTracker::new();
        for _ in 0..3 {
            tracker.record_failure();
        }
        assert_eq!(tracker.record_failure(), RetryDecision::GiveUp);

        tracker.record_success();
        assert_eq!(
            tracker.record_failure(),
            RetryDecision::RetryAfter(Duration::from_secs(5))
        );
    }
}
