//! Circuit breaker configuration section

use crate::validation::{Checks, ConfigSection};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vellum_resilience::CircuitBreakerConfig;

/// Default thresholds for breaker-gated calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures that open the breaker
    pub failure_threshold: u32,

    /// Cooldown after the last failure before probing, in milliseconds
    pub timeout_ms: u64,

    /// Half-open successes needed to close again
    pub success_threshold: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        let config = CircuitBreakerConfig::default();
        Self {
            failure_threshold: config.failure_threshold(),
            timeout_ms: config.timeout().as_millis() as u64,
            success_threshold: config.success_threshold(),
        }
    }
}

impl CircuitBreakerSettings {
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new(self.failure_threshold, Duration::from_millis(self.timeout_ms))
            .with_success_threshold(self.success_threshold)
    }
}

impl ConfigSection for CircuitBreakerSettings {
    const NAME: &'static str = "circuit_breaker";

    fn check(&self, checks: &mut Checks) {
        checks
            .range("failure_threshold", self.failure_threshold, 1..=1000)
            .range("timeout_ms", self.timeout_ms, 1..=86_400_000)
            .range("success_threshold", self.success_threshold, 1..=100);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let settings = CircuitBreakerSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.to_breaker_config(), CircuitBreakerConfig::default());
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let settings = CircuitBreakerSettings {
            failure_threshold: 0,
            success_threshold: 0,
            ..Default::default()
        };
        let errors = settings.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "circuit_breaker.failure_threshold");
    }
}
