//! Exponential backoff between resubmissions of the same request

use log::debug;
use rand::Rng;
use std::time::Duration;

/// Backoff settings applied between retries of a failed request
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor applied per retry
    pub backoff_multiplier: f64,
    /// Randomize each delay between 50% and 100% of its computed value
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Slower, gentler backoff for shared production tenants
    pub fn conservative() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    /// Short delays for development and testing
    pub fn aggressive() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 1.5,
            jitter: true,
        }
    }

    /// Retry immediately
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }
}

/// Computes and waits out retry delays for a [`RetryConfig`]
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        if retry == 0 || self.config.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let exponent = (retry - 1).min(31) as i32;
        let base_ms = self.config.base_delay.as_millis() as f64;
        let max_ms = self.config.max_delay.as_millis() as f64;
        let mut delay_ms = (base_ms * self.config.backoff_multiplier.powi(exponent)).min(max_ms);

        if self.config.jitter {
            delay_ms *= rand::rng().random_range(0.5..=1.0);
        }

        Duration::from_millis(delay_ms as u64)
    }

    /// Sleep before retry number `retry`
    pub async fn wait(&self, retry: u32) {
        let delay = self.delay_for_attempt(retry);
        if delay.is_zero() {
            return;
        }
        debug!("Retry {}: backing off for {}ms", retry, delay.as_millis());
        tokio::time::sleep(delay).await;
    }
}
