//! Retry policy: decides whether a failed task is re-queued and how long it waits.

use std::time::Duration;

use rand::Rng;

use crate::config::QueueConfig;

/// Multiplicative jitter applied to the exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Jitter {
    /// Factor drawn uniformly from `[1 - spread, 1 + spread]`.
    Uniform { spread: f64 },
    /// Constant factor. Used by tests to make delays deterministic.
    Fixed(f64),
}

impl Jitter {
    /// ±20%.
    pub const DEFAULT: Jitter = Jitter::Uniform { spread: 0.2 };

    pub fn factor(&self) -> f64 {
        match *self {
            Jitter::Uniform { spread } => {
                let spread = if spread.is_finite() {
                    spread.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                if spread == 0.0 {
                    return 1.0;
                }
                rand::thread_rng().gen_range((1.0 - spread)..=(1.0 + spread))
            }
            Jitter::Fixed(f) if f.is_finite() && f >= 0.0 => f,
            Jitter::Fixed(_) => 1.0,
        }
    }
}

impl Default for Jitter {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Outcome of consulting the policy after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-queue as `next_attempt` once `delay` has elapsed.
    Retry { delay: Duration, next_attempt: u32 },
    /// Retries exhausted: drop the task.
    GiveUp,
}

/// Exponential backoff with jitter, bounded by `max_retries`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
    pub jitter: Jitter,
}

impl RetryPolicy {
    pub fn from_config(config: &QueueConfig, jitter: Jitter) -> Self {
        Self {
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
            max_retries: config.max_retries,
            jitter,
        }
    }

    /// Backoff before jitter: `min(max_delay, base_delay * 2^attempt)`.
    ///
    /// `attempt` is the attempt that just failed (0 for the first run).
    /// With base=100ms, max=1s: 100ms, 200ms, 400ms, 800ms, 1s, 1s, ...
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base_ms = duration_ms(self.base_delay);
        let max_ms = duration_ms(self.max_delay);
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
    }

    /// Backoff with jitter applied, still capped at `max_delay` and never below 1ms.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let backoff_ms = duration_ms(self.backoff(attempt)) as f64;
        let max_ms = duration_ms(self.max_delay);
        let jittered = (backoff_ms * self.jitter.factor()).round() as u64;
        Duration::from_millis(jittered.clamp(1, max_ms.max(1)))
    }

    /// Decide what happens to a task whose attempt `attempt` just failed.
    pub fn decide(&self, attempt: u32) -> RetryDecision {
        if attempt < self.max_retries {
            RetryDecision::Retry {
                delay: self.next_delay(attempt),
                next_attempt: attempt + 1,
            }
        } else {
            RetryDecision::GiveUp
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn policy(base_ms: u64, max_ms: u64, retries: u32, jitter: Jitter) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
            max_retries: retries,
            jitter,
        }
    }

    #[rstest]
    #[case(0, 100)]
    #[case(1, 200)]
    #[case(2, 400)]
    #[case(3, 800)]
    #[case(4, 1000)]
    #[case(63, 1000)]
    #[case(200, 1000)]
    fn backoff_doubles_until_capped(#[case] attempt: u32, #[case] expected_ms: u64) {
        let p = policy(100, 1000, 3, Jitter::Fixed(1.0));
        assert_eq!(p.backoff(attempt), Duration::from_millis(expected_ms));
    }

    #[test]
    fn uniform_jitter_stays_within_bounds() {
        let p = policy(1000, 10_000, 3, Jitter::Uniform { spread: 0.2 });
        for _ in 0..200 {
            let d = p.next_delay(0);
            assert!(d >= Duration::from_millis(800), "{d:?}");
            assert!(d <= Duration::from_millis(1200), "{d:?}");
        }
    }

    #[test]
    fn jitter_never_exceeds_max_delay() {
        let p = policy(1000, 1000, 3, Jitter::Fixed(1.5));
        assert_eq!(p.next_delay(5), Duration::from_millis(1000));
    }

    #[test]
    fn jitter_never_goes_below_one_ms() {
        let p = policy(1, 2, 3, Jitter::Fixed(0.0));
        assert_eq!(p.next_delay(0), Duration::from_millis(1));
    }

    #[test]
    fn invalid_fixed_factor_falls_back_to_one() {
        assert_eq!(Jitter::Fixed(f64::NAN).factor(), 1.0);
        assert_eq!(Jitter::Fixed(-2.0).factor(), 1.0);
        assert_eq!(Jitter::Uniform { spread: 0.0 }.factor(), 1.0);
    }

    #[test]
    fn decide_retries_until_max_then_gives_up() {
        let p = policy(1, 2, 2, Jitter::Fixed(1.0));
        assert_eq!(
            p.decide(0),
            RetryDecision::Retry {
                delay: Duration::from_millis(1),
                next_attempt: 1
            }
        );
        assert_eq!(
            p.decide(1),
            RetryDecision::Retry {
                delay: Duration::from_millis(2),
                next_attempt: 2
            }
        );
        assert_eq!(p.decide(2), RetryDecision::GiveUp);
        assert_eq!(p.decide(7), RetryDecision::GiveUp);
    }

    #[test]
    fn from_config_copies_bounds() {
        let config = QueueConfig {
            base_delay_ms: 10,
            max_delay_ms: 40,
            max_retries: 4,
            ..QueueConfig::default()
        };
        let p = RetryPolicy::from_config(&config, Jitter::DEFAULT);
        assert_eq!(p.base_delay, Duration::from_millis(10));
        assert_eq!(p.max_delay, Duration::from_millis(40));
        assert_eq!(p.max_retries, 4);
    }
}
