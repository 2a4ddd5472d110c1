//! Process configuration for the SQLite adapter.
//!
//! # Responsibility
//! - Describe connection bootstrap, placeholder style and logging in one
//!   JSON document.
//! - Validate values before anything is opened or initialized.
//!
//! # Invariants
//! - Every field has a default, so `{}` is a valid configuration.
//! - `apply` only touches set-once process state (placeholder, logging).

use crate::logging::{default_log_level, init_logging, normalize_level};
use crate::template::{set_default_placeholder, Placeholder};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

const MAX_BUSY_TIMEOUT_MS: u64 = 10 * 60 * 1000;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// SQLite journal mode requested for file databases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    Delete,
    #[default]
    Wal,
    Memory,
}

impl JournalMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Wal => "wal",
            Self::Memory => "memory",
        }
    }
}

/// Connection bootstrap settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub busy_timeout_ms: u64,
    pub foreign_keys: bool,
    /// Ignored for in-memory databases.
    pub journal_mode: JournalMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            foreign_keys: true,
            journal_mode: JournalMode::Wal,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormConfig {
    pub store: StoreConfig,
    pub placeholder: Placeholder,
    pub log_level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub log_dir: Option<String>,
}

impl Default for NormConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            placeholder: Placeholder::default(),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl NormConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        let config: NormConfig = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        normalize_level(&self.log_level).map_err(ConfigError::Invalid)?;

        if let Some(dir) = &self.log_dir {
            if !Path::new(dir.trim()).is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be an absolute path, got `{dir}`"
                )));
            }
        }

        if self.store.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "busy_timeout_ms {} exceeds maximum {MAX_BUSY_TIMEOUT_MS}",
                self.store.busy_timeout_ms
            )));
        }

        Ok(())
    }

    /// Installs the default placeholder and, when `log_dir` is set, logging.
    ///
    /// Must run once at startup, before the first adapter is built.
    pub fn apply(&self) -> ConfigResult<()> {
        set_default_placeholder(self.placeholder).map_err(ConfigError::Invalid)?;
        if let Some(dir) = &self.log_dir {
            init_logging(&self.log_level, dir).map_err(ConfigError::Invalid)?;
        }
        Ok(())
    }
}
