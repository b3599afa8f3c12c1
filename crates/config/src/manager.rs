//! Configuration manager - main API for config operations

use crate::persistence::ConfigFile;
use crate::{Config, ConfigError, ConfigResult, LogLevel, ValidationError};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::str::FromStr;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "VELLUM_";

/// Main configuration manager
///
/// This is the primary interface for loading, saving, and managing configuration.
pub struct ConfigManager {
    file: ConfigFile,
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Creates a new config manager using the default config directory
    ///
    /// - Linux: `~/.config/vellum/`
    /// - macOS: `~/Library/Application Support/vellum/`
    /// - Windows: `%APPDATA%\vellum\`
    pub fn new() -> ConfigResult<Self> {
        let config_dir = Self::default_config_dir()?;
        Self::with_directory(config_dir)
    }

    /// Creates a config manager with a custom config directory
    pub fn with_directory(config_dir: PathBuf) -> ConfigResult<Self> {
        Ok(Self {
            file: ConfigFile::new(config_dir.join("config.toml")),
            config_dir,
        })
    }

    fn default_config_dir() -> ConfigResult<PathBuf> {
        ProjectDirs::from("", "", "vellum")
            .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Returns the config directory path
    pub fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }

    /// Returns the full config file path
    pub fn config_path(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    /// Loads the configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file is corrupted, returns an error.
    pub fn load(&self) -> ConfigResult<Config> {
        self.file.load()
    }

    /// Loads the configuration, falling back to defaults on any error
    pub fn load_or_default(&self) -> Config {
        match self.load() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config: {}, using defaults", e);
                Config::default()
            }
        }
    }

    /// Saves the configuration to file
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        self.file.save(config)
    }

    /// Updates the configuration using a closure
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use vellum_config::ConfigManager;
    /// # let manager = ConfigManager::new().unwrap();
    /// manager.update(|config| {
    ///     config.circuit_breaker.failure_threshold = 10;
    /// }).expect("Failed to update config");
    /// ```
    pub fn update<F>(&self, update_fn: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.load()?;
        update_fn(&mut config);
        self.save(&config)
    }

    /// Generates a default config file if one doesn't exist
    ///
    /// Returns Ok(true) if a new file was created, Ok(false) if one already exists.
    pub fn initialize(&self) -> ConfigResult<bool> {
        if self.config_path().exists() {
            log::info!(
                "Config file already exists at {}",
                self.config_path().display()
            );
            return Ok(false);
        }

        self.file.write_template()?;
        Ok(true)
    }

    /// Overwrites the config file with default values
    pub fn reset(&self) -> ConfigResult<()> {
        self.save(&Config::default())
    }

    /// Validates the current configuration file
    ///
    /// Returns all validation errors found, or an empty list if valid.
    pub fn validate(&self) -> ConfigResult<Vec<ValidationError>> {
        Ok(self.load()?.validate().err().unwrap_or_default())
    }

    /// Loads the config file and applies `VELLUM_*` environment overrides
    pub fn load_with_env_overrides(&self) -> ConfigResult<Config> {
        let mut config = self.load()?;
        apply_env_overrides(&mut config, |name| std::env::var(name).ok());

        if let Err(errors) = config.validate() {
            for error in &errors {
                log::warn!("After environment overrides: {}", error);
            }
        }

        Ok(config)
    }
}

/// Applies `VELLUM_*` overrides read through `lookup`
///
/// Values that fail to parse are skipped with a warning. Returns the names of
/// the variables that were applied.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = Vec::new();
    let read = |suffix: &str| -> Option<(String, String)> {
        let name = format!("{}{}", ENV_PREFIX, suffix);
        lookup(&name).map(|value| (name, value))
    };

    if let Some((name, value)) = read("LOG_LEVEL") {
        if let Some(level) = parse_env::<LogLevel>(&name, &value) {
            config.logging.level = level;
            applied.push(name);
        }
    }

    if let Some((name, value)) = read("RETRY_MAX_ATTEMPTS") {
        if let Some(v) = parse_env::<u32>(&name, &value) {
            config.retry.default.max_attempts = v;
            applied.push(name);
        }
    }

    if let Some((name, value)) = read("RETRY_BASE_DELAY_MS") {
        if let Some(v) = parse_env::<u64>(&name, &value) {
            config.retry.default.base_delay_ms = v;
            applied.push(name);
        }
    }

    if let Some((name, value)) = read("RETRY_MAX_DELAY_MS") {
        if let Some(v) = parse_env::<u64>(&name, &value) {
            config.retry.default.max_delay_ms = v;
            applied.push(name);
        }
    }

    if let Some((name, value)) = read("RETRY_JITTER") {
        match parse_bool(&value) {
            Some(v) => {
                config.retry.default.jitter = v;
                applied.push(name);
            }
            None => log::warn!("Ignoring {}: '{}' is not a boolean", name, value),
        }
    }

    if let Some((name, value)) = read("BREAKER_FAILURE_THRESHOLD") {
        if let Some(v) = parse_env::<u32>(&name, &value) {
            config.circuit_breaker.failure_threshold = v;
            applied.push(name);
        }
    }

    if let Some((name, value)) = read("BREAKER_TIMEOUT_MS") {
        if let Some(v) = parse_env::<u64>(&name, &value) {
            config.circuit_breaker.timeout_ms = v;
            applied.push(name);
        }
    }

    if let Some((name, value)) = read("BREAKER_SUCCESS_THRESHOLD") {
        if let Some(v) = parse_env::<u32>(&name, &value) {
            config.circuit_breaker.success_threshold = v;
            applied.push(name);
        }
    }

    for name in &applied {
        log::debug!("Applied environment override {}", name);
    }

    applied
}

fn parse_env<T>(name: &str, value: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(e) => {
            log::warn!("Ignoring {}='{}': {}", name, value, e);
            None
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
