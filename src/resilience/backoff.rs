//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Backoff schedule for delivery retries.
///
/// Attempt `n` (1-based) waits `base * 2^(n-1)`, capped at `max`, plus up to
/// `jitter_ratio` of that delay drawn uniformly at random.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    jitter_ratio: f64,
}

impl Backoff {
    /// Create a schedule with the default 25% jitter.
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms: max_ms.max(base_ms),
            jitter_ratio: 0.25,
        }
    }

    /// Override the jitter fraction (clamped to `[0, 1]`).
    pub fn with_jitter(mut self, ratio: f64) -> Self {
        self.jitter_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Delay without jitter for the given attempt.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u64.saturating_pow(attempt - 1);
        Duration::from_millis(self.base_ms.saturating_mul(factor).min(self.max_ms))
    }

    /// Delay to sleep before retrying after the given failed attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter_range = (base.as_millis() as f64 * self.jitter_ratio) as u64;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..=jitter_range)
        } else {
            0
        };
        base + Duration::from_millis(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_until_cap() {
        let backoff = Backoff::new(100, 1000);
        assert_eq!(backoff.base_delay(0), Duration::ZERO);
        assert_eq!(backoff.base_delay(1), Duration::from_millis(100));
        assert_eq!(backoff.base_delay(2), Duration::from_millis(200));
        assert_eq!(backoff.base_delay(4), Duration::from_millis(800));
        assert_eq!(backoff.base_delay(5), Duration::from_millis(1000));
        assert_eq!(backoff.base_delay(40), Duration::from_millis(1000));
    }

    #[test]
    fn test_jitter_stays_within_ratio() {
        let backoff = Backoff::new(100, 2000).with_jitter(0.5);
        for _ in 0..100 {
            let d = backoff.delay(2).as_millis();
            assert!((200..=300).contains(&d), "delay {} out of range", d);
        }
    }

    #[test]
    fn test_zero_jitter_is_deterministic() {
        let backoff = Backoff::new(50, 500).with_jitter(0.0);
        assert_eq!(backoff.delay(3), Duration::from_millis(200));
    }
}
