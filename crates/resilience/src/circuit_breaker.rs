// crates/resilience/src/circuit_breaker.rs
//! Circuit breaker pattern implementation
//!
//! One [`CircuitBreakerState`] is kept per dependency name inside a
//! [`CircuitBreakerRegistry`]. Admission and outcome recording each run under
//! the registry's exclusive lock for that name; the lock is never held while
//! the wrapped operation is awaited.

use crate::error::ResilienceError;
use crate::invoke::invoke;
use crate::retry::RetryResult;
use dashmap::DashMap;
use std::fmt::{self, Display};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally
    Closed,
    /// Circuit is open, requests are rejected
    Open,
    /// Circuit is half-open, testing if service recovered
    HalfOpen,
}

impl Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of failures before opening the circuit
    failure_threshold: u32,
    /// Duration to wait before trying again after opening
    timeout: Duration,
    /// Number of successful requests needed to close from half-open
    success_threshold: u32,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration (thresholds are floored at 1)
    pub fn new(failure_threshold: u32, timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            timeout,
            success_threshold: 3,
        }
    }

    /// Sets the success threshold
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold.max(1);
        self
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn success_threshold(&self) -> u32 {
        self.success_threshold
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(60))
    }
}

/// Snapshot of one dependency's breaker
///
/// `failure_count` only means something while closed and `success_count`
/// only while half-open. A transition resets the counter that becomes
/// relevant in the destination state and leaves the other one alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
    last_error: Option<String>,
    generation: u64,
}

enum Admission {
    Proceed { generation: u64 },
    Reject,
}

impl CircuitBreakerState {
    fn fresh(generation: u64) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
            last_error: None,
            generation,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn success_count(&self) -> u32 {
        self.success_count
    }

    /// When the last failure was recorded; `None` if never
    pub fn last_failure_time(&self) -> Option<Instant> {
        self.last_failure_time
    }

    /// Message of the last recorded failure
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn admit(
        &mut self,
        service: &str,
        config: &CircuitBreakerConfig,
        now: Instant,
        generations: &AtomicU64,
    ) -> Admission {
        if self.state == CircuitState::Open {
            let cooling = self
                .last_failure_time
                .is_some_and(|at| now.saturating_duration_since(at) <= config.timeout());
            if cooling {
                return Admission::Reject;
            }
            self.transition_to(service, CircuitState::HalfOpen, generations);
        }

        Admission::Proceed {
            generation: self.generation,
        }
    }

    fn record_success(
        &mut self,
        service: &str,
        config: &CircuitBreakerConfig,
        generation: u64,
        generations: &AtomicU64,
    ) {
        if generation != self.generation {
            log::debug!("Ignoring stale success for {}", service);
            return;
        }

        match self.state {
            CircuitState::Closed => {
                self.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= config.success_threshold() {
                    self.transition_to(service, CircuitState::Closed, generations);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn record_failure(
        &mut self,
        service: &str,
        config: &CircuitBreakerConfig,
        generation: u64,
        message: String,
        now: Instant,
        generations: &AtomicU64,
    ) {
        if generation != self.generation {
            log::debug!("Ignoring stale failure for {}: {}", service, message);
            return;
        }

        match self.state {
            CircuitState::Closed => {
                self.failure_count += 1;
                self.last_failure_time = Some(now);
                self.last_error = Some(message);
                if self.failure_count >= config.failure_threshold() {
                    self.transition_to(service, CircuitState::Open, generations);
                }
            }
            CircuitState::HalfOpen => {
                self.last_failure_time = Some(now);
                self.last_error = Some(message);
                self.transition_to(service, CircuitState::Open, generations);
            }
            CircuitState::Open => {}
        }
    }

    fn transition_to(&mut self, service: &str, to: CircuitState, generations: &AtomicU64) {
        match to {
            CircuitState::Open => log::warn!(
                "Circuit breaker for {} opening ({} -> {}): {}",
                service,
                self.state,
                to,
                self.last_error.as_deref().unwrap_or("unknown failure")
            ),
            _ => log::info!("Circuit breaker for {}: {} -> {}", service, self.state, to),
        }

        match to {
            CircuitState::Closed => self.failure_count = 0,
            CircuitState::HalfOpen => self.success_count = 0,
            CircuitState::Open => {}
        }
        self.state = to;
        self.generation = generations.fetch_add(1, Ordering::Relaxed) + 1;
    }
}

/// Process-local breaker state for every named dependency
///
/// Entries are created on first use and live until [`reset`](Self::reset).
/// Share one registry between callers with an `Arc`.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, CircuitBreakerState>,
    generations: AtomicU64,
}

impl CircuitBreakerRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Executes one attempt of `operation` through the breaker for `service`
    ///
    /// This never retries: `attempts` is always 1. When the breaker is open and
    /// still cooling down, the operation is not invoked and the result carries
    /// [`ResilienceError::CircuitOpen`] with zero elapsed time.
    pub async fn execute<F, Fut, T, E>(
        &self,
        service: &str,
        config: &CircuitBreakerConfig,
        operation: F,
    ) -> RetryResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let start = Instant::now();

        let generation = {
            let mut entry = self
                .breakers
                .entry(service.to_string())
                .or_insert_with(|| CircuitBreakerState::fresh(self.next_generation()));
            match entry.admit(service, config, start, &self.generations) {
                Admission::Proceed { generation } => generation,
                Admission::Reject => {
                    let last_error = entry.last_error.clone();
                    drop(entry);
                    log::debug!("Rejecting call to {}: circuit open", service);
                    return RetryResult::failed(
                        ResilienceError::CircuitOpen {
                            service: service.to_string(),
                            last_error,
                        },
                        1,
                        Duration::ZERO,
                    );
                }
            }
        };

        let outcome = invoke(operation).await;
        let now = Instant::now();

        match self.breakers.get_mut(service) {
            Some(mut entry) => match &outcome {
                Ok(_) => entry.record_success(service, config, generation, &self.generations),
                Err(message) => entry.record_failure(
                    service,
                    config,
                    generation,
                    message.clone(),
                    now,
                    &self.generations,
                ),
            },
            None => log::debug!("Breaker for {} was reset while a call was in flight", service),
        }

        match outcome {
            Ok(data) => RetryResult::succeeded(data, 1, now - start),
            Err(message) => {
                log::warn!("Call to {} failed: {}", service, message);
                RetryResult::failed(ResilienceError::OperationFailed { message }, 1, now - start)
            }
        }
    }

    /// Current record for `service`, or `None` if it was never referenced
    pub fn state(&self, service: &str) -> Option<CircuitBreakerState> {
        self.breakers.get(service).map(|entry| entry.value().clone())
    }

    /// Deletes the record for `service`; returns whether one existed
    pub fn reset(&self, service: &str) -> bool {
        let removed = self.breakers.remove(service).is_some();
        if removed {
            log::info!("Circuit breaker for {} reset", service);
        }
        removed
    }

    /// Deletes every record
    pub fn reset_all(&self) {
        self.breakers.clear();
    }

    /// Names of all dependencies with a record, sorted
    pub fn services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }
}
