use crate::config::Polling;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    pub retry_delay: Duration,
    pub max_retry_delay: Duration,
    pub multiplier: f64,
    pub max_consecutive_errors: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_config(&Polling::default())
    }
}

impl PollPolicy {
    pub fn from_config(cfg: &Polling) -> Self {
        Self {
            interval: cfg.interval(),
            retry_delay: cfg.retry_delay(),
            max_retry_delay: cfg.max_retry_delay().max(cfg.retry_delay()),
            multiplier: if cfg.backoff_multiplier.is_finite() && cfg.backoff_multiplier >= 1.0 {
                cfg.backoff_multiplier
            } else {
                1.0
            },
            max_consecutive_errors: cfg.max_consecutive_errors,
        }
    }

    // `failures` is 1-based.
    pub fn error_delay(&self, failures: u32) -> Duration {
        let mut delay = self.retry_delay;
        for _ in 1..failures {
            delay = next_delay(delay, self);
            if delay >= self.max_retry_delay {
                break;
            }
        }
        delay.min(self.max_retry_delay)
    }

    pub fn exhausted(&self, failures: u32) -> bool {
        self.max_consecutive_errors > 0 && failures >= self.max_consecutive_errors
    }
}

pub fn next_delay(current: Duration, policy: &PollPolicy) -> Duration {
    let next_ms = (current.as_millis() as f64 * policy.multiplier) as u64;
    Duration::from_millis(next_ms).min(policy.max_retry_delay)
}
