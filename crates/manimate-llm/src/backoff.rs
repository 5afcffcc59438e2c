//! Injectable retry backoff policies.

use std::time::Duration;

/// Delay policy between retry attempts.
#[derive(Debug, Clone)]
pub enum BackoffPolicy {
    /// Same delay every attempt.
    Constant(Duration),
    /// Base delay doubled each attempt, capped at `max`.
    Exponential { base: Duration, max: Duration },
    /// Exponential with up to 50% random jitter added.
    Jittered { base: Duration, max: Duration },
}

impl BackoffPolicy {
    /// Default delay between structured-output parse retries.
    pub fn parse_default() -> Self {
        Self::Constant(Duration::from_millis(800))
    }

    /// Default delay between render repair attempts.
    pub fn render_default() -> Self {
        Self::Constant(Duration::from_millis(1000))
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::Constant(delay) => *delay,
            Self::Exponential { base, max } => exponential(*base, *max, attempt),
            Self::Jittered { base, max } => {
                let delay = exponential(*base, *max, attempt);
                let jitter = delay.mul_f64(rand::random::<f64>() * 0.5);
                (delay + jitter).min(*max)
            }
        }
    }
}

fn exponential(base: Duration, max: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
        .min(max)
}
