use std::time::Duration;

use async_trait::async_trait;

/// Bounded wait schedule for identifier resolution after a create.
///
/// The first attempt happens after `initial_delay`; up to `attempts` more
/// follow, separated by `interval` (multiplied by `multiplier` on each step).
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub attempts: u32,
    pub interval: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            attempts: 3,
            interval: Duration::from_secs(1),
            multiplier: 1,
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps, for tests and dry runs.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            attempts,
            interval: Duration::ZERO,
            multiplier: 1,
        }
    }

    /// Total number of lookups, the first one included.
    pub fn total_attempts(&self) -> u32 {
        self.attempts + 1
    }

    /// Wait before lookup `attempt` (0-based).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }
        let factor = self.multiplier.max(1).saturating_pow(attempt - 1);
        self.interval.saturating_mul(factor)
    }

    /// The full schedule, one entry per lookup.
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.total_attempts()).map(|attempt| self.delay_before(attempt))
    }
}

/// How the resolver waits between lookups.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn wait(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn wait(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Returns immediately.
pub struct NoDelay;

#[async_trait]
impl Delay for NoDelay {
    async fn wait(&self, _duration: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        let schedule: Vec<_> = policy.schedule().collect();
        assert_eq!(
            schedule,
            vec![
                Duration::from_secs(2),
                Duration::from_secs(1),
                Duration::from_secs(1),
                Duration::from_secs(1),
            ]
        );
    }

    #[test]
    fn test_exponential_schedule() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(500),
            attempts: 3,
            interval: Duration::from_millis(100),
            multiplier: 2,
        };
        let schedule: Vec<_> = policy.schedule().map(|d| d.as_millis()).collect();
        assert_eq!(schedule, vec![500, 100, 200, 400]);
    }

    #[test]
    fn test_immediate_policy() {
        let policy = RetryPolicy::immediate(2);
        assert_eq!(policy.total_attempts(), 3);
        assert!(policy.schedule().all(|d| d.is_zero()));
    }

    #[tokio::test]
    async fn test_no_delay_returns() {
        NoDelay.wait(Duration::from_secs(60)).await;
    }
}
