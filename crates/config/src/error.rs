//! Errors raised while locating, reading and writing the Vellum config file

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform has no per-user config directory
    #[error("No config directory for vellum on this platform; pass --config <DIR>")]
    NoConfigDir,

    #[error("Cannot read vellum config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file exists but holds nothing but whitespace
    #[error("Vellum config {path} is empty; delete it or run `vellum config init`")]
    Empty { path: PathBuf },

    #[error("Vellum config {path} is not valid TOML: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Refused to persist a config that fails validation
    #[error("Refusing to save vellum config with {} invalid value(s): {}", .0.len(), join(.0))]
    Invalid(Vec<ValidationError>),

    #[error("Cannot serialize vellum config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// One step of the atomic replace failed
    #[error("Cannot {step} for vellum config {path}: {source}")]
    Write {
        step: WriteStep,
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Stage of an atomic config write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    CreateDir,
    Backup,
    Stage,
    Replace,
}

impl fmt::Display for WriteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriteStep::CreateDir => "create the directory",
            WriteStep::Backup => "back up the previous file",
            WriteStep::Stage => "stage the new file",
            WriteStep::Replace => "replace the file",
        })
    }
}

/// A config value outside what the resilience core accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted TOML path, e.g. `retry.storage.max_attempts`
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
