//! Configuration loading traits and error types.
//!
//! Every smoother binary loads one TOML file with a `[shared]` table (logging,
//! service name) plus its own tables. The [`ConfigLoader`] blanket impl gives
//! any `DeserializeOwned` type a `load(path)` constructor.
//!
//! ```rust,no_run
//! use smoother_common::config::{ConfigLoader, ConfigError, SharedConfig};
//! use serde::Deserialize;
//! use std::path::Path;
//!
//! #[derive(Debug, Deserialize)]
//! struct AppConfig {
//!     shared: SharedConfig,
//! }
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = AppConfig::load(Path::new("velocity_smoother.toml"))?;
//!     config.shared.validate()?;
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Error type for configuration loading and live reconfiguration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed (including wrong array lengths).
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// A value violates a kinematic or loop invariant.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// Reconfiguration named a parameter this component does not own.
    #[error("Unknown parameter '{0}'")]
    UnknownParameter(String),

    /// Reconfiguration supplied a value of the wrong type.
    #[error("Parameter '{name}' expects {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
    },

    /// Per-axis array parameter with a length other than 3.
    #[error("Invalid size of parameter '{name}': got {len}, must be size 3")]
    InvalidLength { name: String, len: usize },

    /// Parameter can only be set at startup.
    #[error("Parameter '{0}' cannot be changed at runtime (requires restart)")]
    ReloadScopeViolation(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Common fields shared by every smoother process.
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "velocity_smoother"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    crate::consts::DEFAULT_SERVICE_NAME.to_string()
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

/// Trait for loading configuration from TOML files.
///
/// - `ConfigError::FileNotFound` if the file does not exist
/// - `ConfigError::ParseError` if TOML syntax or shape is invalid
///
/// Semantic validation is left to the caller.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;
        tracing::debug!(path = %path.display(), "configuration file read");

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
