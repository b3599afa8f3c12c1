//! Vellum Configuration System
//!
//! Loads the retry and circuit breaker defaults used by `vellum-resilience`
//! from a TOML file. New settings are added as sections implementing the
//! `ConfigSection` trait.
//!
//! # Architecture
//!
//! - **Trait-based**: Each section is a type implementing `ConfigSection`
//! - **Lenient loading**: Out-of-range values are loaded and reported as warnings;
//!   only unreadable or unparseable files fail to load
//! - **Strict saving**: `save` refuses configs that fail validation
//! - **Atomic writes**: Config files are never left in a corrupted state
//!
//! # Example
//!
//! ```rust
//! use vellum_config::Config;
//! use vellum_resilience::RetryProfile;
//!
//! let config: Config = toml::from_str(
//!     r#"
//!     [retry.storage]
//!     max_attempts = 7
//!     "#,
//! )
//! .expect("valid TOML");
//!
//! let storage = config.presets().resolve(RetryProfile::Storage, None);
//! assert_eq!(storage.max_attempts(), 7);
//! ```

mod breaker_config;
mod error;
mod logging_config;
mod manager;
mod persistence;
mod retry_config;
mod validation;

pub use breaker_config::CircuitBreakerSettings;
pub use error::{ConfigError, ConfigResult, ValidationError, WriteStep};
pub use logging_config::{LogLevel, LoggingConfig};
pub use manager::{apply_env_overrides, ConfigManager, ENV_PREFIX};
pub use retry_config::{RetryDefaults, RetryProfileSettings, RetrySettings};
pub use validation::{Checks, ConfigSection};

use serde::{Deserialize, Serialize};
use vellum_resilience::{CircuitBreakerConfig, Resilience, RetryPresets};

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Config file format version
    pub version: u32,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Retry defaults and profile overrides
    pub retry: RetrySettings,

    /// Circuit breaker defaults
    pub circuit_breaker: CircuitBreakerSettings,
}

impl Config {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates every section, collecting all errors
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut checks = Checks::default();
        checks
            .section(&self.logging)
            .section(&self.retry)
            .section(&self.circuit_breaker);
        checks.into_result()
    }

    /// Retry presets built from the `[retry]` tables
    pub fn presets(&self) -> RetryPresets {
        self.retry.to_presets()
    }

    /// Breaker thresholds from `[circuit_breaker]`
    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        self.circuit_breaker.to_breaker_config()
    }

    /// Composes a resilience facade with these presets
    pub fn build_resilience(&self) -> Resilience {
        Resilience::with_presets(self.presets())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            logging: LoggingConfig::default(),
            retry: RetrySettings::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
        }
    }
}
