use std::time::Duration;

use rand::Rng;

/// Governs how a supervisor restarts a crashed or exited plugin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestartPolicy {
    /// Maximum number of restarts attempted after the first run. Total
    /// runs across the supervisor's lifetime is therefore `max_retries + 1`.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the uniform random jitter added to every delay.
    pub jitter: Duration,
}

impl RestartPolicy {
    /// A plugin that is never restarted: any exit moves straight to `Stopped`.
    pub const NEVER: RestartPolicy = RestartPolicy {
        max_retries: 0,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        jitter: Duration::ZERO,
    };

    pub fn allows_attempt(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// `delay = min(maxDelay, baseDelay * 2^attempt) + uniform(0, jitter)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        let capped = base.min(self.max_delay);
        let jitter = if self.jitter.is_zero() {
            Duration::ZERO
        } else {
            Duration::from_nanos(rand::thread_rng().gen_range(0..=self.jitter.as_nanos() as u64))
        };
        capped + jitter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_until_the_cap() {
        let policy = RestartPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            jitter: Duration::ZERO,
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn delay_is_capped_at_max_delay() {
        let policy = RestartPolicy {
            max_retries: 20,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            jitter: Duration::ZERO,
        };
        assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(500));
    }

    #[test]
    fn jitter_keeps_delay_within_the_documented_bound() {
        let policy = RestartPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            jitter: Duration::from_millis(50),
        };
        for _ in 0..100 {
            let delay = policy.delay_for_attempt(1);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(250));
        }
    }

    #[test]
    fn allows_attempt_respects_max_retries() {
        let policy = RestartPolicy { max_retries: 2, ..RestartPolicy::NEVER };
        assert!(policy.allows_attempt(0));
        assert!(policy.allows_attempt(1));
        assert!(!policy.allows_attempt(2));
    }
}
