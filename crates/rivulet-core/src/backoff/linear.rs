//! Linear delay growth with a hard ceiling.

use std::time::Duration;

use super::{BackoffError, DelayPolicy, TimeoutBackoff};
use crate::config::BackoffConfig;

/// Grows the delay by `step` on every retry: `step`, `2*step`, `3*step`, ...
///
/// When the next delay would reach `max_delay` the policy fails with
/// [`BackoffError::Exhausted`] instead of producing it. The counter is not
/// rolled back, so every later call fails too until [`reset`](DelayPolicy::reset).
#[derive(Debug, Clone)]
pub struct LinearDelay {
    step: Duration,
    max_delay: Duration,
    current: Duration,
}

impl LinearDelay {
    pub fn new(step: Duration, max_delay: Duration) -> Result<Self, BackoffError> {
        if step.is_zero() {
            return Err(BackoffError::InvalidArgument("retry step must be greater than zero"));
        }
        if max_delay.is_zero() {
            return Err(BackoffError::InvalidArgument(
                "maximum retry delay must be greater than zero",
            ));
        }
        Ok(Self {
            step,
            max_delay,
            current: Duration::ZERO,
        })
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Delay handed out by the last successful `next_delay` (zero after reset).
    pub fn current(&self) -> Duration {
        self.current
    }
}

impl DelayPolicy for LinearDelay {
    fn next_delay(&mut self) -> Result<Duration, BackoffError> {
        self.current = self.current.saturating_add(self.step);
        if self.current >= self.max_delay {
            return Err(BackoffError::Exhausted {
                delay: self.current,
                max_delay: self.max_delay,
            });
        }
        Ok(self.current)
    }

    fn reset(&mut self) {
        self.current = Duration::ZERO;
    }
}

/// Timer-backed strategy with linear delay growth.
pub type LinearTimeoutBackoff = TimeoutBackoff<LinearDelay>;

impl TimeoutBackoff<LinearDelay> {
    /// Linear backoff waiting `step`, `2*step`, ... and giving up at `max_delay`.
    pub fn linear(step: Duration, max_delay: Duration) -> Result<Self, BackoffError> {
        Ok(Self::with_name(
            "linear timeout backoff",
            LinearDelay::new(step, max_delay)?,
        ))
    }

    pub fn from_config(cfg: &BackoffConfig) -> Result<Self, BackoffError> {
        Self::linear(cfg.step(), cfg.max_delay())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn delays_grow_by_step_until_cap() {
        let mut p = LinearDelay::new(ms(100), ms(450)).unwrap();
        assert_eq!(p.next_delay(), Ok(ms(100)));
        assert_eq!(p.next_delay(), Ok(ms(200)));
        assert_eq!(p.next_delay(), Ok(ms(300)));
        assert_eq!(p.next_delay(), Ok(ms(400)));
        assert_eq!(
            p.next_delay(),
            Err(BackoffError::Exhausted {
                delay: ms(500),
                max_delay: ms(450)
            })
        );
    }

    #[test]
    fn reaching_cap_exactly_is_exhausted() {
        let mut p = LinearDelay::new(ms(250), ms(500)).unwrap();
        assert_eq!(p.next_delay(), Ok(ms(250)));
        assert!(p.next_delay().unwrap_err().is_exhausted());
    }

    #[test]
    fn stays_exhausted_until_reset() {
        let mut p = LinearDelay::new(ms(10), ms(15)).unwrap();
        assert_eq!(p.next_delay(), Ok(ms(10)));
        assert!(p.next_delay().is_err());
        assert!(p.next_delay().is_err());
        p.reset();
        assert_eq!(p.current(), Duration::ZERO);
        assert_eq!(p.next_delay(), Ok(ms(10)));
    }

    #[test]
    fn reset_returns_to_first_step() {
        let mut p = LinearDelay::new(ms(5), ms(1000)).unwrap();
        for _ in 0..7 {
            p.next_delay().unwrap();
        }
        p.reset();
        assert_eq!(p.next_delay(), Ok(ms(5)));
    }

    #[test]
    fn rejects_zero_arguments() {
        assert!(matches!(
            LinearDelay::new(Duration::ZERO, ms(10)),
            Err(BackoffError::InvalidArgument(_))
        ));
        assert!(matches!(
            LinearDelay::new(ms(10), Duration::ZERO),
            Err(BackoffError::InvalidArgument(_))
        ));
    }

    #[test]
    fn from_config_uses_millis() {
        let cfg = BackoffConfig {
            step_ms: 250,
            max_delay_ms: 16_000,
        };
        let backoff = LinearTimeoutBackoff::from_config(&cfg).unwrap();
        let policy = crate::lock(&backoff.policy);
        assert_eq!(policy.step(), ms(250));
        assert_eq!(policy.max_delay(), ms(16_000));
    }
}
