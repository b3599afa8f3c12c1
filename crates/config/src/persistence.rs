//! Reading and atomically replacing `config.toml`
//!
//! Writes go to a temp file in the same directory and are renamed over the
//! target, keeping the previous contents as `config.toml.backup`.

use crate::error::WriteStep;
use crate::{Config, ConfigError, ConfigResult, CONFIG_VERSION};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Commented default config written by `initialize`
pub(crate) const DEFAULT_TEMPLATE: &str = r#"# Vellum configuration
version = 1

[logging]
# off, error, warn, info, debug or trace. RUST_LOG takes precedence.
level = "info"
timestamps = true

# Global retry defaults, used as-is by the default profile.
[retry.default]
max_attempts = 3
base_delay_ms = 1000
max_delay_ms = 10000
backoff_multiplier = 2.0
jitter = true

# Profile tables override single fields of the built-in presets:
# [retry.encryption], [retry.decryption], [retry.storage], [retry.access_validation]
#
# [retry.storage]
# max_attempts = 5

[circuit_breaker]
failure_threshold = 5
timeout_ms = 60000
success_threshold = 3
"#;

/// One config file on disk
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        self.path.with_extension("toml.backup")
    }

    /// Loads the file, or defaults when it does not exist
    ///
    /// Out-of-range values are logged and kept so the user can fix them.
    /// Files from an older format version are upgraded in place when possible.
    pub fn load(&self) -> ConfigResult<Config> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", self.path.display());
                return Ok(Config::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if contents.trim().is_empty() {
            return Err(ConfigError::Empty {
                path: self.path.clone(),
            });
        }

        let mut config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;

        if config.version > CONFIG_VERSION {
            log::warn!(
                "Config version {} is newer than supported version {}, unknown settings are ignored",
                config.version,
                CONFIG_VERSION
            );
        } else if config.version < CONFIG_VERSION {
            self.upgrade(&mut config);
        }

        if let Err(errors) = config.validate() {
            for error in &errors {
                log::warn!("{}: {}", self.path.display(), error);
            }
        }

        Ok(config)
    }

    /// Validates, then atomically replaces the file
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        config.validate().map_err(ConfigError::Invalid)?;
        self.write_config(config)?;
        log::info!("Config saved to {}", self.path.display());
        Ok(())
    }

    /// Writes the commented default config
    pub fn write_template(&self) -> ConfigResult<()> {
        self.replace(DEFAULT_TEMPLATE)?;
        log::info!("Generated default config at {}", self.path.display());
        Ok(())
    }

    /// Bumps the version and rewrites the file without validating it
    ///
    /// A failed rewrite is logged; the upgraded config is still returned.
    fn upgrade(&self, config: &mut Config) {
        log::info!(
            "Upgrading {} from config version {} to {}",
            self.path.display(),
            config.version,
            CONFIG_VERSION
        );
        config.version = CONFIG_VERSION;

        if let Err(e) = self.write_config(config) {
            log::warn!("Could not rewrite upgraded config: {}", e);
        }
    }

    fn write_config(&self, config: &Config) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(config)?;
        self.replace(&contents)
    }

    fn replace(&self, contents: &str) -> ConfigResult<()> {
        let fail = |step: WriteStep| {
            let path = self.path.clone();
            move |source: std::io::Error| ConfigError::Write { step, path, source }
        };

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(fail(WriteStep::CreateDir))?;

        if self.path.exists() {
            fs::copy(&self.path, self.backup_path()).map_err(fail(WriteStep::Backup))?;
        }

        let mut staged = NamedTempFile::new_in(dir).map_err(fail(WriteStep::Stage))?;
        staged
            .write_all(contents.as_bytes())
            .and_then(|()| staged.as_file().sync_all())
            .map_err(fail(WriteStep::Stage))?;
        staged
            .persist(&self.path)
            .map_err(|e| fail(WriteStep::Replace)(e.error))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_test_dir() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.toml");
        (temp_dir, config_path)
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let (_temp_dir, config_path) = setup_test_dir();
        let file = ConfigFile::new(config_path);

        let config = file.load().expect("Should load default config");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let (_temp_dir, config_path) = setup_test_dir();
        let file = ConfigFile::new(config_path);

        let mut config = Config::default();
        config.retry.storage.max_attempts = Some(8);
        config.circuit_breaker.timeout_ms = 5000;

        file.save(&config).expect("Should save config");
        let loaded = file.load().expect("Should load config");

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_unset_profile_fields_not_written() {
        let (_temp_dir, config_path) = setup_test_dir();
        let file = ConfigFile::new(config_path.clone());

        let mut config = Config::default();
        config.retry.storage.max_attempts = Some(8);
        file.save(&config).expect("Should save config");

        let written = fs::read_to_string(&config_path).expect("Should read file");
        assert!(written.contains("max_attempts = 8"));
        assert_eq!(written.matches("jitter").count(), 1);
    }

    #[test]
    fn test_save_creates_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("subdir").join("config.toml");
        let file = ConfigFile::new(config_path.clone());

        file.save(&Config::default())
            .expect("Should create directory and save");

        assert!(config_path.exists());
    }

    #[test]
    fn test_backup_created_on_overwrite() {
        let (_temp_dir, config_path) = setup_test_dir();
        let file = ConfigFile::new(config_path.clone());

        let config = Config::default();
        file.save(&config).expect("Should save config");
        file.save(&config).expect("Should save config again");

        let backup_path = file.backup_path();
        assert!(backup_path.exists());
    }

    #[test]
    fn test_invalid_config_returns_error() {
        let (_temp_dir, config_path) = setup_test_dir();
        fs::write(&config_path, "this is not valid TOML {{{").expect("Should write file");

        let file = ConfigFile::new(config_path);
        let result = file.load();

        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_empty_file_is_an_error() {
        let (_temp_dir, config_path) = setup_test_dir();
        fs::write(&config_path, "  \n").expect("Should write file");

        let file = ConfigFile::new(config_path);
        assert!(matches!(file.load(), Err(ConfigError::Empty { .. })));
    }

    #[test]
    fn test_validate_before_save() {
        let (_temp_dir, config_path) = setup_test_dir();
        let file = ConfigFile::new(config_path);

        let mut config = Config::default();
        config.retry.default.max_attempts = 0;

        let result = file.save(&config);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_old_version_is_upgraded() {
        let (_temp_dir, config_path) = setup_test_dir();
        fs::write(&config_path, "version = 0\n").expect("Should write file");

        let file = ConfigFile::new(config_path.clone());
        let config = file.load().expect("Should load");
        assert_eq!(config.version, CONFIG_VERSION);

        let written = fs::read_to_string(&config_path).expect("Should read file");
        assert!(written.contains(&format!("version = {}", CONFIG_VERSION)));
    }

    #[test]
    fn test_old_version_with_bad_value_still_loads() {
        let (_temp_dir, config_path) = setup_test_dir();
        fs::write(
            &config_path,
            "version = 0\n\n[circuit_breaker]\nfailure_threshold = 0\n",
        )
        .expect("Should write file");

        let file = ConfigFile::new(config_path.clone());
        let config = file.load().expect("Should load despite invalid value");
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.circuit_breaker.failure_threshold, 0);
        assert!(config.validate().is_err());

        let rewritten: Config =
            toml::from_str(&fs::read_to_string(&config_path).expect("Should read file"))
                .expect("Rewritten file should parse");
        assert_eq!(rewritten.version, CONFIG_VERSION);
        assert_eq!(rewritten.circuit_breaker.failure_threshold, 0);
    }

    #[test]
    fn test_upgrade_rewrite_failure_is_not_fatal() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "version = 0\n").expect("Should write file");
        // A directory where the backup should go makes the rewrite fail
        fs::create_dir(config_path.with_extension("toml.backup")).expect("Should create dir");

        let config = ConfigFile::new(config_path.clone())
            .load()
            .expect("Should load without rewriting");
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(
            fs::read_to_string(&config_path).expect("Should read file"),
            "version = 0\n"
        );
    }

    #[test]
    fn test_save_failure_names_step() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "version = 1\n").expect("Should write file");
        fs::create_dir(config_path.with_extension("toml.backup")).expect("Should create dir");

        let result = ConfigFile::new(config_path).save(&Config::default());
        assert!(matches!(
            result,
            Err(ConfigError::Write {
                step: WriteStep::Backup,
                ..
            })
        ));
    }

    #[test]
    fn test_default_template_matches_defaults() {
        let parsed: Config = toml::from_str(DEFAULT_TEMPLATE).expect("Template should parse");
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_write_template() {
        let (_temp_dir, config_path) = setup_test_dir();
        let file = ConfigFile::new(config_path.clone());

        file
            .write_template()
            .expect("Should generate default config");

        let written = fs::read_to_string(&config_path).expect("Should read file");
        assert!(written.starts_with("# Vellum configuration"));

        let loaded = file.load().expect("Should load generated config");
        assert_eq!(loaded, Config::default());
    }
}
