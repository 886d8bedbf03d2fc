use std::time::Duration;

use playscout_core::config::RetryProfile;

/// Exponential backoff with a ceiling: `delay(n) = min(base * 2^n, max_delay)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_delay: Duration,
    max_retries: u32,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_retries: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_retries,
        }
    }

    pub fn from_profile(profile: &RetryProfile) -> Self {
        Self::new(
            Duration::from_secs(profile.base_delay_seconds),
            Duration::from_secs(profile.max_delay_seconds),
            profile.max_retries,
        )
    }

    /// Backoff before the retry numbered `retry_count`. Saturates at `max_delay`.
    pub fn delay(&self, retry_count: u32) -> Duration {
        2u32.checked_pow(retry_count)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Budget written into newly created analysis records.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_profile(&RetryProfile::default())
    }
}
