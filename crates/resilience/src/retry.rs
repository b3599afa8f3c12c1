// crates/resilience/src/retry.rs
//! Retry policies with exponential backoff

use crate::error::{ResilienceError, ResilienceResult, RETRIES_EXHAUSTED_MESSAGE};
use crate::invoke::invoke;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

/// Fraction of a computed delay that jitter may add or remove (±10%)
pub const JITTER_RATIO: f64 = 0.1;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);
const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(10_000);
const DEFAULT_MULTIPLIER: f64 = 2.0;

// Keeps powi() within a sane range; the max_delay cap applies long before this.
const MAX_EXPONENT: u32 = 64;

/// Retry policy configuration
///
/// Values are normalized on construction: `max_attempts` is at least 1 and
/// `backoff_multiplier` is at least 1.0, so a `RetryConfig` is always runnable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first attempt)
    max_attempts: u32,
    /// Delay after the first failed attempt
    base_delay: Duration,
    /// Upper bound on the unjittered delay
    max_delay: Duration,
    /// Backoff multiplier
    backoff_multiplier: f64,
    /// Whether to perturb delays by up to ±10%
    jitter: bool,
}

impl RetryConfig {
    /// Creates a retry policy with the global defaults and the given attempt limit
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_MULTIPLIER,
            jitter: true,
        }
        .with_max_attempts(max_attempts)
    }

    /// Sets the attempt limit (floored at 1)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        if max_attempts == 0 {
            log::warn!("Retry max_attempts of 0 is not runnable, using 1");
        }
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the base delay
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier
    ///
    /// Values below 1.0 are raised to 1.0 (constant delay). Non-finite values
    /// fall back to the default multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = if !multiplier.is_finite() {
            log::warn!(
                "Retry backoff multiplier {} is not finite, using {}",
                multiplier,
                DEFAULT_MULTIPLIER
            );
            DEFAULT_MULTIPLIER
        } else if multiplier < 1.0 {
            log::warn!("Retry backoff multiplier {} is below 1.0, using 1.0", multiplier);
            1.0
        } else {
            multiplier
        };
        self
    }

    /// Sets whether to use jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns the maximum number of attempts
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the base delay
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Returns the maximum delay
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Returns the backoff multiplier
    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// Returns whether jitter is enabled
    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Unjittered delay after the given failed attempt (1-based)
    ///
    /// `min(base_delay * multiplier^(attempt - 1), max_delay)`; attempt 0 has no delay.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = (attempt - 1).min(MAX_EXPONENT) as i32;
        let secs = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());

        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }

    /// Delay to sleep after the given failed attempt, with jitter if enabled
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let backoff = self.backoff_for_attempt(attempt);
        if !self.jitter || backoff.is_zero() {
            return backoff;
        }

        let secs = backoff.as_secs_f64();
        let spread = secs * JITTER_RATIO;
        let offset = rand::thread_rng().gen_range(-spread..=spread);

        Duration::try_from_secs_f64((secs + offset).max(0.0)).unwrap_or(backoff)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

/// A partial [`RetryConfig`]; set fields win over whatever they are applied to
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RetryConfigOverride {
    pub max_attempts: Option<u32>,
    pub base_delay: Option<Duration>,
    pub max_delay: Option<Duration>,
    pub backoff_multiplier: Option<f64>,
    pub jitter: Option<bool>,
}

impl RetryConfigOverride {
    /// Creates an empty override
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = Some(multiplier);
        self
    }

    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Returns true if no field is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Stacks `top` over this override; fields set in `top` take precedence
    pub fn layer(self, top: RetryConfigOverride) -> Self {
        Self {
            max_attempts: top.max_attempts.or(self.max_attempts),
            base_delay: top.base_delay.or(self.base_delay),
            max_delay: top.max_delay.or(self.max_delay),
            backoff_multiplier: top.backoff_multiplier.or(self.backoff_multiplier),
            jitter: top.jitter.or(self.jitter),
        }
    }

    /// Produces a full config from `base` with the set fields replaced
    pub fn apply_to(&self, base: &RetryConfig) -> RetryConfig {
        let mut config = *base;
        if let Some(max_attempts) = self.max_attempts {
            config = config.with_max_attempts(max_attempts);
        }
        if let Some(delay) = self.base_delay {
            config = config.with_base_delay(delay);
        }
        if let Some(delay) = self.max_delay {
            config = config.with_max_delay(delay);
        }
        if let Some(multiplier) = self.backoff_multiplier {
            config = config.with_multiplier(multiplier);
        }
        if let Some(jitter) = self.jitter {
            config = config.with_jitter(jitter);
        }
        config
    }
}

/// Uniform outcome of a wrapped operation
///
/// Exactly one of [`data`](Self::data) and [`error`](Self::error) is present.
/// On the circuit breaker path `attempts` is always 1.
#[derive(Debug)]
#[must_use]
pub struct RetryResult<T> {
    outcome: ResilienceResult<T>,
    attempts: u32,
    total_time: Duration,
}

impl<T> RetryResult<T> {
    /// A successful outcome
    pub fn succeeded(data: T, attempts: u32, total_time: Duration) -> Self {
        Self {
            outcome: Ok(data),
            attempts: attempts.max(1),
            total_time,
        }
    }

    /// A failed outcome
    pub fn failed(error: ResilienceError, attempts: u32, total_time: Duration) -> Self {
        Self {
            outcome: Err(error),
            attempts: attempts.max(1),
            total_time,
        }
    }

    /// Whether the operation ultimately succeeded
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn data(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ResilienceError> {
        self.outcome.as_ref().err()
    }

    /// The error rendered as the caller-facing message
    pub fn error_message(&self) -> Option<String> {
        self.error().map(|e| e.to_string())
    }

    /// Number of times the operation was invoked
    ///
    /// Always at least 1, even for calls rejected before invoking the
    /// operation. [`ResilienceError::Cancelled`] carries the exact count.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Wall time from the start of the call until the result was produced
    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    pub fn into_data(self) -> Option<T> {
        self.outcome.ok()
    }

    pub fn into_result(self) -> ResilienceResult<T> {
        self.outcome
    }
}

/// Executes an operation with retry logic
///
/// The operation is invoked up to `config.max_attempts()` times. Between
/// attempts the caller is suspended for [`RetryConfig::delay_for_attempt`];
/// there is no delay after the final attempt.
pub async fn execute_with_retry<F, Fut, T, E>(operation: F, config: &RetryConfig) -> RetryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    run(operation, config, None).await
}

/// Executes an operation with retry logic until `cancel` fires
///
/// Cancellation interrupts the delay between attempts and drops an in-flight
/// attempt. The result then reports [`ResilienceError::Cancelled`], whose
/// `attempts` is the exact number of invocations started; it is 0 when the
/// token had already fired. [`RetryResult::attempts`] stays floored at 1.
pub async fn execute_with_retry_until<F, Fut, T, E>(
    operation: F,
    config: &RetryConfig,
    cancel: &CancellationToken,
) -> RetryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    run(operation, config, Some(cancel)).await
}

async fn run<F, Fut, T, E>(
    mut operation: F,
    config: &RetryConfig,
    cancel: Option<&CancellationToken>,
) -> RetryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let start = Instant::now();
    let max_attempts = config.max_attempts();
    let mut last_error: Option<String> = None;

    for attempt in 1..=max_attempts {
        let outcome = match cancel {
            Some(token) if token.is_cancelled() => {
                return cancelled(attempt - 1, last_error, start);
            }
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return cancelled(attempt, last_error, start),
                outcome = invoke(&mut operation) => outcome,
            },
            None => invoke(&mut operation).await,
        };

        let message = match outcome {
            Ok(data) => {
                if attempt > 1 {
                    log::info!("Operation succeeded on attempt {}/{}", attempt, max_attempts);
                }
                return RetryResult::succeeded(data, attempt, start.elapsed());
            }
            Err(message) => message,
        };

        if attempt == max_attempts {
            log::warn!(
                "Attempt {}/{} failed: {}; no attempts left",
                attempt,
                max_attempts,
                message
            );
            last_error = Some(message);
            break;
        }

        let delay = config.delay_for_attempt(attempt);
        log::debug!(
            "Attempt {}/{} failed: {}; retrying in {:?}",
            attempt,
            max_attempts,
            message,
            delay
        );
        last_error = Some(message);

        match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return cancelled(attempt, last_error, start),
                _ = sleep(delay) => {}
            },
            None => sleep(delay).await,
        }
    }

    let last_error = last_error
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| RETRIES_EXHAUSTED_MESSAGE.to_string());

    RetryResult::failed(
        ResilienceError::RetriesExhausted {
            attempts: max_attempts,
            last_error,
        },
        max_attempts,
        start.elapsed(),
    )
}

fn cancelled<T>(attempts: u32, last_error: Option<String>, start: Instant) -> RetryResult<T> {
    log::info!("Retry loop cancelled after {} attempt(s)", attempts);
    RetryResult::failed(
        ResilienceError::Cancelled {
            attempts,
            last_error,
        },
        attempts,
        start.elapsed(),
    )
}
