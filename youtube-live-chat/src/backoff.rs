//! Retry and reconnect delay computation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Source of uniformly distributed values in `[0, 1)` used for jitter.
pub trait RandomSource: Send + Sync {
    fn next_unit(&self) -> f64;
}

/// Draws from the thread-local generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_unit(&self) -> f64 {
        rand::random::<f64>()
    }
}

/// Always returns the same draw. Values are clamped into `[0, 1)`.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_unit(&self) -> f64 {
        self.0.clamp(0.0, 1.0 - f64::EPSILON)
    }
}

/// Exponential backoff with jitter.
///
/// `delay(attempt) = base * multiplier^attempt * (1 ± jitter)` while below `max`, and exactly
/// `max` from the first attempt whose unjittered delay reaches it. A draw of `0.5` from the
/// random source yields no jitter at all.
#[derive(Clone)]
pub struct BackoffPolicy {
    base: Duration,
    multiplier: f64,
    max: Duration,
    jitter: f64,
    random: Arc<dyn RandomSource>,
}

impl fmt::Debug for BackoffPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackoffPolicy")
            .field("base", &self.base)
            .field("multiplier", &self.multiplier)
            .field("max", &self.max)
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            multiplier: 2.0,
            max: Duration::from_secs(60),
            jitter: 0.2,
            random: Arc::new(ThreadRandom),
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, multiplier: f64, max: Duration) -> Self {
        Self {
            base,
            multiplier: multiplier.max(1.0),
            max: max.max(base),
            ..Self::default()
        }
    }

    /// Sets the jitter fraction, clamped to `[0, 1]`.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn with_random_source(mut self, random: impl RandomSource + 'static) -> Self {
        self.random = Arc::new(random);
        self
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// The delay to wait before retry number `attempt` (0-indexed).
    ///
    /// Once the exponential delay reaches `max`, the result is exactly `max` without jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        if self.base.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let growth = self.multiplier.powi(exponent);
        let raw =
            Duration::try_from_secs_f64(self.base.as_secs_f64() * growth).unwrap_or(self.max);
        if raw >= self.max {
            return self.max;
        }

        let factor = 1.0 + self.jitter * (2.0 * self.random.next_unit() - 1.0);
        Duration::try_from_secs_f64(raw.as_secs_f64() * factor)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

/// Attempt counter driving a [`BackoffPolicy`].
///
/// The counter grows on every failure and resets on success. A server-advised delay (such as an
/// SSE `retry:` directive) replaces the computed delay for the next wait only.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
    advised: Option<Duration>,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            advised: None,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next retry; records one more failure.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self
            .advised
            .take()
            .unwrap_or_else(|| self.policy.delay(self.attempt));
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Overrides the next delay and restarts exponential growth after it.
    pub fn advise(&mut self, delay: Duration) {
        self.advised = Some(delay);
        self.attempt = 0;
    }
}
