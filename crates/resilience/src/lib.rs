// crates/resilience/src/lib.rs
//! Resilient execution for fallible async operations
//!
//! This crate provides:
//! - Retry with exponential backoff and ±10% jitter
//! - Named retry profiles (encryption, decryption, storage, access validation)
//! - Per-service circuit breakers held in an explicit registry
//!
//! Every entry point returns a [`RetryResult`]; failures are never raised past
//! this crate's boundary.
//!
//! # Example
//!
//! ```rust
//! use vellum_resilience::{
//!     CircuitBreakerConfig, Resilience, RetryConfig, RetryConfigOverride, RetryPresets,
//!     RetryProfile,
//! };
//! use std::time::Duration;
//!
//! // Global default with a storage-specific tweak
//! let presets = RetryPresets::new(RetryConfig::new(3).with_jitter(false))
//!     .with_overlay(RetryProfile::Storage, RetryConfigOverride::new().max_attempts(6));
//! let resilience = Resilience::with_presets(presets);
//!
//! assert_eq!(resilience.resolve(RetryProfile::Storage, None).max_attempts(), 6);
//!
//! // Circuit breaker
//! let cb_config = CircuitBreakerConfig::new(5, Duration::from_secs(60));
//! assert_eq!(cb_config.success_threshold(), 3);
//! ```

mod circuit_breaker;
mod error;
mod facade;
mod invoke;
mod presets;
mod retry;

pub use circuit_breaker::{
    CircuitBreakerConfig, CircuitBreakerRegistry, CircuitBreakerState, CircuitState,
};
pub use error::{ResilienceError, ResilienceResult, RETRIES_EXHAUSTED_MESSAGE};
pub use facade::Resilience;
pub use presets::{RetryPresets, RetryProfile, UnknownProfile};
pub use retry::{
    execute_with_retry, execute_with_retry_until, RetryConfig, RetryConfigOverride, RetryResult,
    JITTER_RATIO,
};
pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_exports_accessible() {
        let _: RetryConfig = RetryConfig::default();
        let _: RetryConfigOverride = RetryConfigOverride::default();
        let _: RetryPresets = RetryPresets::default();
        let _: CircuitBreakerConfig = CircuitBreakerConfig::default();
        let _: CircuitBreakerRegistry = CircuitBreakerRegistry::new();
        let _: Resilience = Resilience::default();
        let _: CancellationToken = CancellationToken::new();
    }
}
