//! Bounded exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// How often and how patiently to retry an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub attempts: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based). Zero for `retry == 0`.
    pub fn delay(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let factor = 2u32.saturating_pow(retry - 1);
        let delay = self.base.saturating_mul(factor).min(self.max);

        // Up to 10% extra so rebinders started together drift apart.
        let spread = delay.as_millis() as u64 / 10;
        let jitter = if spread > 0 {
            rand::thread_rng().gen_range(0..spread)
        } else {
            0
        };
        delay + Duration::from_millis(jitter)
    }

    /// `true` while another attempt may follow attempt number `attempt`.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.attempts
    }

    /// Longest total time spent sleeping if every attempt fails.
    pub fn worst_case(&self) -> Duration {
        (1..self.attempts)
            .map(|retry| {
                let delay = self.base.saturating_mul(2u32.saturating_pow(retry - 1)).min(self.max);
                delay + delay / 10
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: RetryPolicy = RetryPolicy {
        attempts: 4,
        base: Duration::from_millis(50),
        max: Duration::from_millis(1000),
    };

    #[test]
    fn test_delay_grows_and_caps() {
        assert_eq!(POLICY.delay(0), Duration::ZERO);

        let first = POLICY.delay(1);
        assert!(first >= Duration::from_millis(50) && first < Duration::from_millis(55));

        assert!(POLICY.delay(3) >= Duration::from_millis(200));

        let capped = POLICY.delay(20);
        assert!(capped >= Duration::from_millis(1000) && capped < Duration::from_millis(1100));
    }

    #[test]
    fn test_attempt_budget() {
        assert!(POLICY.allows_retry(3));
        assert!(!POLICY.allows_retry(4));
        // 50 + 100 + 200 ms, plus jitter allowance.
        assert_eq!(POLICY.worst_case(), Duration::from_millis(385));
    }
}
