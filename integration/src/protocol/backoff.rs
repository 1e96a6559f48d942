use rand::Rng;
use std::time::Duration;

/// Exponential backoff-with-jitter iterator for WebSocket reconnect loops.
///
/// Every broker adapter's streaming reconnect logic (`spec.md` §4.B) needs the same base/cap/
/// jitter backoff, so this gateway's adapters share one implementation: the behaviour (base
/// 500ms, cap 30s, jitter +/-20%) is defined and tested exactly once.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectBackoff {
    base: Duration,
    cap: Duration,
    jitter: f64,
    attempt: u32,
}

impl ReconnectBackoff {
    pub const DEFAULT_BASE: Duration = Duration::from_millis(500);
    pub const DEFAULT_CAP: Duration = Duration::from_secs(30);
    pub const DEFAULT_JITTER: f64 = 0.2;

    pub fn new(base: Duration, cap: Duration, jitter: f64) -> Self {
        Self {
            base,
            cap,
            jitter,
            attempt: 0,
        }
    }

    /// Next delay to sleep before reconnecting, then advances the attempt counter.
    ///
    /// Delay grows as `base * 2^attempt`, capped at `cap`, then jittered by `+-jitter` of the
    /// capped value.
    pub fn next_delay(&mut self) -> Duration {
        let exponent = self.attempt.min(32);
        self.attempt = self.attempt.saturating_add(1);

        let exponential = self
            .base
            .checked_mul(1u32.checked_shl(exponent).unwrap_or(u32::MAX))
            .unwrap_or(self.cap);
        let capped = exponential.min(self.cap);

        let jitter_fraction = rand::rng().random_range(-self.jitter..=self.jitter);
        let jittered_millis = ((capped.as_millis() as f64) * (1.0 + jitter_fraction)).max(0.0);

        Duration::from_millis(jittered_millis as u64)
    }

    /// Reset the attempt counter, eg/ after a successful reconnect.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE, Self::DEFAULT_CAP, Self::DEFAULT_JITTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_delay_is_around_base() {
        let mut backoff = ReconnectBackoff::default();
        let delay = backoff.next_delay();
        assert!(delay.as_millis() >= 400 && delay.as_millis() <= 600);
    }

    #[test]
    fn delay_never_exceeds_jittered_cap() {
        let mut backoff = ReconnectBackoff::default();
        for _ in 0..20 {
            let delay = backoff.next_delay();
            assert!(delay.as_millis() <= (30_000.0 * 1.2) as u128);
        }
    }

    #[test]
    fn reset_returns_attempt_to_zero() {
        let mut backoff = ReconnectBackoff::default();
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempt(), 2);
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
    }
}
