//! Integration tests for the configuration system

use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use vellum_config::{
    apply_env_overrides, Config, ConfigError, ConfigManager, LogLevel, CONFIG_VERSION,
};
use vellum_resilience::{CircuitBreakerConfig, RetryConfig, RetryProfile};

fn setup_test_manager() -> Result<(TempDir, ConfigManager), Box<dyn std::error::Error>> {
    let _ = env_logger::builder().is_test(true).try_init();
    let temp_dir = TempDir::new()?;
    let manager = ConfigManager::with_directory(temp_dir.path().to_path_buf())?;
    Ok((temp_dir, manager))
}

#[test]
fn test_full_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    let created = manager.initialize()?;
    assert!(created);

    let config = manager.load()?;
    assert_eq!(config.version, CONFIG_VERSION);

    let mut modified = config.clone();
    modified.retry.storage.max_attempts = Some(6);
    modified.circuit_breaker.failure_threshold = 2;
    manager.save(&modified)?;

    let reloaded = manager.load()?;
    assert_eq!(reloaded.retry.storage.max_attempts, Some(6));
    assert_eq!(reloaded.circuit_breaker.failure_threshold, 2);

    manager.reset()?;
    let after_reset = manager.load()?;
    assert_eq!(after_reset, Config::default());

    Ok(())
}

#[test]
fn test_initialized_file_resolves_builtin_presets() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    manager.initialize()?;

    let presets = manager.load()?.presets();

    assert_eq!(presets.resolve(RetryProfile::Default, None), RetryConfig::default());

    let encryption = presets.resolve(RetryProfile::Encryption, None);
    assert_eq!(encryption.max_attempts(), 2);
    assert_eq!(encryption.base_delay(), Duration::from_millis(500));
    assert_eq!(encryption.max_delay(), Duration::from_secs(5));

    let storage = presets.resolve(RetryProfile::Storage, None);
    assert_eq!(storage.max_attempts(), 5);
    assert_eq!(storage.base_delay(), Duration::from_millis(2000));
    assert_eq!(storage.max_delay(), Duration::from_secs(30));

    let access = presets.resolve(RetryProfile::AccessValidation, None);
    assert_eq!(access.max_attempts(), 3);
    assert_eq!(access.max_delay(), Duration::from_secs(8));

    Ok(())
}

#[test]
fn test_hand_written_file() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    fs::write(
        manager.config_path(),
        r#"
version = 1

[logging]
level = "warn"

[retry.default]
max_attempts = 3
base_delay_ms = 1000
max_delay_ms = 10000
backoff_multiplier = 2.0
jitter = true

[retry.storage]
max_attempts = 5

[circuit_breaker]
failure_threshold = 5
timeout_ms = 60000
success_threshold = 3
"#,
    )?;

    let config = manager.load()?;
    assert!(manager.validate()?.is_empty());
    assert_eq!(config.logging.level, LogLevel::Warn);
    assert_eq!(config.breaker_config(), CircuitBreakerConfig::default());

    Ok(())
}

#[test]
fn test_config_validation_integration() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    manager.save(&Config::default())?;
    assert!(manager.validate()?.is_empty());

    let mut invalid = Config::default();
    invalid.retry.default.base_delay_ms = 20_000;
    assert!(manager.save(&invalid).is_err());

    Ok(())
}

#[test]
fn test_atomic_save() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    let config = Config::default();
    manager.save(&config)?;
    assert!(manager.config_path().exists());

    manager.save(&config)?;

    let backup_path = manager.config_path().with_extension("toml.backup");
    assert!(backup_path.exists());

    Ok(())
}

#[test]
fn test_old_file_with_bad_value_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    fs::write(
        manager.config_path(),
        "version = 0\n\n[circuit_breaker]\nfailure_threshold = 0\n",
    )?;

    let config = manager.load_with_env_overrides()?;
    assert_eq!(config.version, CONFIG_VERSION);

    let errors = manager.validate()?;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "circuit_breaker.failure_threshold");

    assert!(matches!(
        manager.save(&config),
        Err(ConfigError::Invalid(ref errors)) if errors.len() == 1
    ));

    Ok(())
}

#[test]
fn test_env_overrides_layer_over_file() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    manager.update(|config| config.retry.default.max_attempts = 4)?;

    let mut config = manager.load()?;
    apply_env_overrides(&mut config, |name| match name {
        "VELLUM_BREAKER_FAILURE_THRESHOLD" => Some("2".to_string()),
        _ => None,
    });

    assert_eq!(config.retry.default.max_attempts, 4);
    assert_eq!(config.breaker_config().failure_threshold(), 2);

    Ok(())
}

#[test]
fn test_serialization_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::default();
    config.retry.access_validation.jitter = Some(false);
    config.logging.timestamps = false;

    let toml_string = toml::to_string(&config)?;
    let deserialized: Config = toml::from_str(&toml_string)?;
    assert_eq!(config, deserialized);
    Ok(())
}
