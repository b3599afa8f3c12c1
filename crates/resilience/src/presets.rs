// crates/resilience/src/presets.rs
//! Named retry profiles layered over a global default

use crate::retry::{RetryConfig, RetryConfigOverride};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Which class of dependency an operation talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryProfile {
    /// Global defaults, no preset overlay
    Default,
    /// Key-service encryption calls
    Encryption,
    /// Key-service decryption calls
    Decryption,
    /// Remote blob storage
    Storage,
    /// Access-policy validation
    AccessValidation,
}

impl RetryProfile {
    /// All profiles, in display order
    pub const ALL: [RetryProfile; 5] = [
        RetryProfile::Default,
        RetryProfile::Encryption,
        RetryProfile::Decryption,
        RetryProfile::Storage,
        RetryProfile::AccessValidation,
    ];

    /// Stable name used in config files and on the command line
    pub fn name(&self) -> &'static str {
        match self {
            RetryProfile::Default => "default",
            RetryProfile::Encryption => "encryption",
            RetryProfile::Decryption => "decryption",
            RetryProfile::Storage => "storage",
            RetryProfile::AccessValidation => "access_validation",
        }
    }

    /// Built-in overlay for this profile
    ///
    /// Encryption and decryption: 2 attempts from 500ms, capped at 5s.
    /// Storage: 5 attempts from 2s, capped at 30s.
    /// Access validation: 3 attempts from 1s, capped at 8s.
    pub fn builtin_overlay(&self) -> RetryConfigOverride {
        match self {
            RetryProfile::Default => RetryConfigOverride::new(),
            RetryProfile::Encryption | RetryProfile::Decryption => RetryConfigOverride::new()
                .max_attempts(2)
                .base_delay(Duration::from_millis(500))
                .max_delay(Duration::from_secs(5)),
            RetryProfile::Storage => RetryConfigOverride::new()
                .max_attempts(5)
                .base_delay(Duration::from_millis(2000))
                .max_delay(Duration::from_secs(30)),
            RetryProfile::AccessValidation => RetryConfigOverride::new()
                .max_attempts(3)
                .base_delay(Duration::from_millis(1000))
                .max_delay(Duration::from_secs(8)),
        }
    }
}

impl fmt::Display for RetryProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unrecognized profile name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown retry profile '{0}' (expected one of: default, encryption, decryption, storage, access_validation)")]
pub struct UnknownProfile(pub String);

impl FromStr for RetryProfile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        RetryProfile::ALL
            .into_iter()
            .find(|profile| profile.name() == normalized)
            .ok_or_else(|| UnknownProfile(s.to_string()))
    }
}

/// Global default plus one overlay per profile
///
/// Resolution order is explicit override > profile overlay > global default.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPresets {
    global: RetryConfig,
    overlays: HashMap<RetryProfile, RetryConfigOverride>,
}

impl RetryPresets {
    /// Creates presets with the built-in overlays over `global`
    pub fn new(global: RetryConfig) -> Self {
        let overlays = RetryProfile::ALL
            .into_iter()
            .map(|profile| (profile, profile.builtin_overlay()))
            .collect();

        Self { global, overlays }
    }

    /// Stacks `overlay` on top of the current overlay for `profile`
    pub fn with_overlay(mut self, profile: RetryProfile, overlay: RetryConfigOverride) -> Self {
        let current = self.overlay(profile);
        self.overlays.insert(profile, current.layer(overlay));
        self
    }

    /// Returns the global default
    pub fn global(&self) -> &RetryConfig {
        &self.global
    }

    /// Returns the overlay for a profile
    pub fn overlay(&self, profile: RetryProfile) -> RetryConfigOverride {
        self.overlays.get(&profile).copied().unwrap_or_default()
    }

    /// Resolves the effective config for one invocation
    pub fn resolve(
        &self,
        profile: RetryProfile,
        explicit: Option<&RetryConfigOverride>,
    ) -> RetryConfig {
        let overlay = match explicit {
            Some(explicit) => self.overlay(profile).layer(*explicit),
            None => self.overlay(profile),
        };
        overlay.apply_to(&self.global)
    }
}

impl Default for RetryPresets {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_is_global_default() {
        let presets = RetryPresets::default();
        assert_eq!(
            presets.resolve(RetryProfile::Default, None),
            RetryConfig::default()
        );
    }

    #[test]
    fn test_storage_is_more_patient_than_encryption() {
        let presets = RetryPresets::default();
        let encryption = presets.resolve(RetryProfile::Encryption, None);
        let storage = presets.resolve(RetryProfile::Storage, None);

        assert!(encryption.max_attempts() < storage.max_attempts());
        assert!(encryption.base_delay() < storage.base_delay());
        assert!(encryption.max_delay() < storage.max_delay());
        assert_eq!(
            presets.resolve(RetryProfile::Decryption, None),
            encryption
        );
    }

    #[test]
    fn test_explicit_field_beats_preset_beats_global() {
        let global = RetryConfig::new(3).with_multiplier(3.0);
        let presets = RetryPresets::new(global);
        let explicit = RetryConfigOverride::new().max_attempts(9);

        let resolved = presets.resolve(RetryProfile::Storage, Some(&explicit));
        assert_eq!(resolved.max_attempts(), 9);
        assert_eq!(resolved.base_delay(), Duration::from_millis(2000));
        assert_eq!(resolved.backoff_multiplier(), 3.0);
    }

    #[test]
    fn test_with_overlay_keeps_builtin_fields() {
        let presets = RetryPresets::default().with_overlay(
            RetryProfile::Storage,
            RetryConfigOverride::new().max_attempts(8),
        );

        let storage = presets.resolve(RetryProfile::Storage, None);
        assert_eq!(storage.max_attempts(), 8);
        assert_eq!(storage.max_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_profile_from_str() {
        assert_eq!("storage".parse::<RetryProfile>(), Ok(RetryProfile::Storage));
        assert_eq!("Access-Validation".parse::<RetryProfile>(), Ok(RetryProfile::AccessValidation));
        assert!("blob".parse::<RetryProfile>().is_err());

        for profile in RetryProfile::ALL {
            assert_eq!(profile.to_string().parse::<RetryProfile>(), Ok(profile));
        }
    }
}
