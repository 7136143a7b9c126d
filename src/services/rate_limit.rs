//! Client-side spacing between detection calls
//!
//! The inference endpoint free tier throttles aggressively, so the detector
//! keeps a minimum spacing between calls and widens it while the upstream
//! keeps returning quota errors. State is an owned value on the client, not
//! a global, so independent clients (and tests) don't share counters.

use std::time::{Duration, Instant};

/// Backoff state for one detector client.
#[derive(Debug, Clone)]
pub struct CallGate {
    baseline: Duration,
    backoff_window: Duration,
    consecutive_failures: u32,
    failure_doubling_threshold: u32,
    last_call: Option<Instant>,
}

impl CallGate {
    pub fn new(baseline: Duration, failure_doubling_threshold: u32) -> Self {
        Self {
            baseline,
            backoff_window: baseline,
            consecutive_failures: 0,
            failure_doubling_threshold,
            last_call: None,
        }
    }

    /// Check whether a call may proceed at `now`. Returns the remaining wait
    /// when the current backoff window has not elapsed since the last call.
    /// Spacing is only enforced while the previous call(s) failed; a clean
    /// history never blocks.
    pub fn check_ready(&self, now: Instant) -> Result<(), Duration> {
        if self.consecutive_failures == 0 {
            return Ok(());
        }
        match self.last_call {
            Some(last) => {
                let elapsed = now.saturating_duration_since(last);
                if elapsed < self.backoff_window {
                    Err(self.backoff_window - elapsed)
                } else {
                    Ok(())
                }
            }
            None => Ok(()),
        }
    }

    /// Record that a call is being attempted at `now`.
    pub fn mark_attempt(&mut self, now: Instant) {
        self.last_call = Some(now);
    }

    /// A successful call resets the window to baseline.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.backoff_window = self.baseline;
    }

    /// A quota-signature failure counts toward the doubling threshold; once
    /// reached, every further failure doubles the window.
    pub fn record_quota_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.failure_doubling_threshold {
            self.backoff_window *= 2;
        }
    }

    /// Current window, for advisory "please wait N seconds" messages.
    pub fn backoff_window(&self) -> Duration {
        self.backoff_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> CallGate {
        CallGate::new(Duration::from_secs(1), 5)
    }

    #[test]
    fn clean_history_never_blocks() {
        let mut gate = gate();
        let t0 = Instant::now();
        assert!(gate.check_ready(t0).is_ok());
        gate.mark_attempt(t0);
        gate.record_success();
        // Immediately again, well inside the baseline window
        assert!(gate.check_ready(t0 + Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn failure_enforces_remaining_wait() {
        let mut gate = gate();
        let t0 = Instant::now();
        gate.mark_attempt(t0);
        gate.record_quota_failure();

        let wait = gate
            .check_ready(t0 + Duration::from_millis(400))
            .unwrap_err();
        assert_eq!(wait, Duration::from_millis(600));

        assert!(gate.check_ready(t0 + Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn window_doubles_after_threshold() {
        let mut gate = gate();
        let t0 = Instant::now();
        gate.mark_attempt(t0);

        for _ in 0..4 {
            gate.record_quota_failure();
        }
        assert_eq!(gate.backoff_window(), Duration::from_secs(1));

        gate.record_quota_failure();
        assert_eq!(gate.backoff_window(), Duration::from_secs(2));

        gate.record_quota_failure();
        assert_eq!(gate.backoff_window(), Duration::from_secs(4));
    }

    #[test]
    fn success_resets_to_baseline() {
        let mut gate = gate();
        let t0 = Instant::now();
        gate.mark_attempt(t0);
        for _ in 0..6 {
            gate.record_quota_failure();
        }
        assert!(gate.backoff_window() > Duration::from_secs(1));

        gate.record_success();
        assert_eq!(gate.backoff_window(), Duration::from_secs(1));
        assert!(gate.check_ready(t0).is_ok());
    }
}
