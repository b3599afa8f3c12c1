//! Retry configuration section
//!
//! `[retry.default]` holds the global defaults. The per-profile tables
//! (`[retry.encryption]`, `[retry.storage]`, ...) are partial: fields left out
//! keep the built-in preset value for that profile.

use crate::validation::{Checks, ConfigSection};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vellum_resilience::{RetryConfig, RetryConfigOverride, RetryPresets, RetryProfile};

const MAX_ATTEMPTS_LIMIT: u32 = 20;
const MAX_DELAY_LIMIT_MS: u64 = 3_600_000;

/// Global retry defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryDefaults {
    /// Attempts including the first one
    pub max_attempts: u32,

    /// Delay after the first failure in milliseconds
    pub base_delay_ms: u64,

    /// Cap on the unjittered delay in milliseconds
    pub max_delay_ms: u64,

    /// Growth factor between delays
    pub backoff_multiplier: f64,

    /// Perturb delays by up to ±10%
    pub jitter: bool,
}

impl Default for RetryDefaults {
    fn default() -> Self {
        let config = RetryConfig::default();
        Self {
            max_attempts: config.max_attempts(),
            base_delay_ms: config.base_delay().as_millis() as u64,
            max_delay_ms: config.max_delay().as_millis() as u64,
            backoff_multiplier: config.backoff_multiplier(),
            jitter: config.jitter(),
        }
    }
}

impl RetryDefaults {
    /// Builds the global retry config
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.max_attempts)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_multiplier(self.backoff_multiplier)
            .with_jitter(self.jitter)
    }

    fn check(&self, checks: &mut Checks) {
        checks
            .range("default.max_attempts", self.max_attempts, 1..=MAX_ATTEMPTS_LIMIT)
            .range("default.base_delay_ms", self.base_delay_ms, 0..=MAX_DELAY_LIMIT_MS)
            .range("default.max_delay_ms", self.max_delay_ms, 0..=MAX_DELAY_LIMIT_MS)
            .at_least(
                "default.max_delay_ms",
                self.max_delay_ms,
                "base_delay_ms",
                self.base_delay_ms,
            )
            .range("default.backoff_multiplier", self.backoff_multiplier, 1.0..=10.0);
    }
}

/// Partial settings for one retry profile
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryProfileSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_delay_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_multiplier: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter: Option<bool>,
}

impl RetryProfileSettings {
    /// Converts to an override for the resilience presets
    pub fn to_override(&self) -> RetryConfigOverride {
        RetryConfigOverride {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay_ms.map(Duration::from_millis),
            max_delay: self.max_delay_ms.map(Duration::from_millis),
            backoff_multiplier: self.backoff_multiplier,
            jitter: self.jitter,
        }
    }

    fn check(&self, checks: &mut Checks, profile: RetryProfile) {
        let field = |name: &str| format!("{}.{}", profile, name);
        checks
            .optional_range(&field("max_attempts"), self.max_attempts, 1..=MAX_ATTEMPTS_LIMIT)
            .optional_range(&field("base_delay_ms"), self.base_delay_ms, 0..=MAX_DELAY_LIMIT_MS)
            .optional_range(&field("max_delay_ms"), self.max_delay_ms, 0..=MAX_DELAY_LIMIT_MS)
            .optional_range(
                &field("backoff_multiplier"),
                self.backoff_multiplier,
                1.0..=10.0,
            );

        if let (Some(base), Some(max)) = (self.base_delay_ms, self.max_delay_ms) {
            checks.at_least(&field("max_delay_ms"), max, "base_delay_ms", base);
        }
    }
}

/// Retry defaults plus per-profile overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
    pub default: RetryDefaults,
    pub encryption: RetryProfileSettings,
    pub decryption: RetryProfileSettings,
    pub storage: RetryProfileSettings,
    pub access_validation: RetryProfileSettings,
}

impl RetrySettings {
    /// Settings table for a named profile; `None` for the default profile
    pub fn profile(&self, profile: RetryProfile) -> Option<&RetryProfileSettings> {
        match profile {
            RetryProfile::Default => None,
            RetryProfile::Encryption => Some(&self.encryption),
            RetryProfile::Decryption => Some(&self.decryption),
            RetryProfile::Storage => Some(&self.storage),
            RetryProfile::AccessValidation => Some(&self.access_validation),
        }
    }

    /// Builds presets: file defaults, built-in overlays, then file overlays
    pub fn to_presets(&self) -> RetryPresets {
        RetryProfile::ALL.into_iter().fold(
            RetryPresets::new(self.default.to_retry_config()),
            |presets, profile| match self.profile(profile).map(|s| s.to_override()) {
                Some(overlay) if !overlay.is_empty() => presets.with_overlay(profile, overlay),
                _ => presets,
            },
        )
    }
}

impl ConfigSection for RetrySettings {
    const NAME: &'static str = "retry";

    fn check(&self, checks: &mut Checks) {
        self.default.check(checks);
        for profile in RetryProfile::ALL {
            if let Some(settings) = self.profile(profile) {
                settings.check(checks, profile);
            }
        }
    }
}
