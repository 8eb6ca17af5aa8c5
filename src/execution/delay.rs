//! Anti-front-running delay.
//!
//! A uniformly random pause between quoting and building the transaction so
//! that submission time is less predictable. This only adds latency; it does
//! not stop a determined front-runner and should not be presented as if it did.

use rand::Rng;
use std::time::Duration;
use tracing::debug;

use crate::config::DelayConfig;

#[derive(Debug, Clone)]
pub struct AntiFrontRunDelay {
    enabled: bool,
    min: Duration,
    max: Duration,
}

impl AntiFrontRunDelay {
    pub fn new(min: Duration, max: Duration) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            enabled: true,
            min,
            max,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn from_config(config: &DelayConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self::new(
            Duration::from_millis(config.min_ms),
            Duration::from_millis(config.max_ms),
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn range(&self) -> (Duration, Duration) {
        (self.min, self.max)
    }

    /// Draw a delay uniformly from `[min, max]` at microsecond resolution.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if !self.enabled {
            return Duration::ZERO;
        }
        let min_us = u64::try_from(self.min.as_micros()).unwrap_or(u64::MAX);
        let max_us = u64::try_from(self.max.as_micros()).unwrap_or(u64::MAX);
        Duration::from_micros(rng.gen_range(min_us..=max_us))
    }

    /// Sleep for a freshly sampled delay, yielding to the runtime meanwhile.
    pub async fn apply(&self) -> Duration {
        let delay = self.sample(&mut rand::thread_rng());
        if !delay.is_zero() {
            debug!("Applying anti-front-running delay of {} ms", delay.as_millis());
            tokio::time::sleep(delay).await;
        }
        delay
    }
}
