// crates/resilience/src/facade.rs
//! Single entry point combining retry presets with the breaker registry

use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitBreakerState};
use crate::presets::{RetryPresets, RetryProfile};
use crate::retry::{
    execute_with_retry, execute_with_retry_until, RetryConfig, RetryConfigOverride, RetryResult,
};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Resilient execution for encryption, storage and access-policy callers
///
/// Cloning is cheap and clones share one [`CircuitBreakerRegistry`]. Build one
/// instance at startup and hand it to every caller.
#[derive(Debug, Clone, Default)]
pub struct Resilience {
    presets: RetryPresets,
    breakers: Arc<CircuitBreakerRegistry>,
}

impl Resilience {
    /// Creates a facade over the given presets and registry
    pub fn new(presets: RetryPresets, breakers: Arc<CircuitBreakerRegistry>) -> Self {
        Self { presets, breakers }
    }

    /// Creates a facade with its own, empty registry
    pub fn with_presets(presets: RetryPresets) -> Self {
        Self::new(presets, Arc::new(CircuitBreakerRegistry::new()))
    }

    pub fn presets(&self) -> &RetryPresets {
        &self.presets
    }

    pub fn registry(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    /// Effective config for `profile` with an optional per-call override
    pub fn resolve(
        &self,
        profile: RetryProfile,
        overrides: Option<&RetryConfigOverride>,
    ) -> RetryConfig {
        self.presets.resolve(profile, overrides)
    }

    /// Retries `operation` under the named profile
    pub async fn retry_with_profile<F, Fut, T, E>(
        &self,
        profile: RetryProfile,
        operation: F,
        overrides: Option<RetryConfigOverride>,
    ) -> RetryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let config = self.resolve(profile, overrides.as_ref());
        log::debug!("Running {} operation with {:?}", profile, config);
        execute_with_retry(operation, &config).await
    }

    /// Retries `operation` under the named profile until `cancel` fires
    pub async fn retry_with_profile_until<F, Fut, T, E>(
        &self,
        profile: RetryProfile,
        operation: F,
        overrides: Option<RetryConfigOverride>,
        cancel: &CancellationToken,
    ) -> RetryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let config = self.resolve(profile, overrides.as_ref());
        execute_with_retry_until(operation, &config, cancel).await
    }

    /// Retries with the global defaults
    pub async fn execute_with_retry<F, Fut, T, E>(
        &self,
        operation: F,
        overrides: Option<RetryConfigOverride>,
    ) -> RetryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.retry_with_profile(RetryProfile::Default, operation, overrides)
            .await
    }

    pub async fn retry_encryption<F, Fut, T, E>(
        &self,
        operation: F,
        overrides: Option<RetryConfigOverride>,
    ) -> RetryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.retry_with_profile(RetryProfile::Encryption, operation, overrides)
            .await
    }

    pub async fn retry_decryption<F, Fut, T, E>(
        &self,
        operation: F,
        overrides: Option<RetryConfigOverride>,
    ) -> RetryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.retry_with_profile(RetryProfile::Decryption, operation, overrides)
            .await
    }

    pub async fn retry_storage<F, Fut, T, E>(
        &self,
        operation: F,
        overrides: Option<RetryConfigOverride>,
    ) -> RetryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.retry_with_profile(RetryProfile::Storage, operation, overrides)
            .await
    }

    pub async fn retry_access_validation<F, Fut, T, E>(
        &self,
        operation: F,
        overrides: Option<RetryConfigOverride>,
    ) -> RetryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.retry_with_profile(RetryProfile::AccessValidation, operation, overrides)
            .await
    }

    /// One breaker-gated attempt; see [`CircuitBreakerRegistry::execute`]
    pub async fn execute_with_circuit_breaker<F, Fut, T, E>(
        &self,
        operation: F,
        service: &str,
        config: &CircuitBreakerConfig,
    ) -> RetryResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.breakers.execute(service, config, operation).await
    }

    pub fn circuit_breaker_state(&self, service: &str) -> Option<CircuitBreakerState> {
        self.breakers.state(service)
    }

    pub fn reset_circuit_breaker(&self, service: &str) {
        self.breakers.reset(service);
    }
}
