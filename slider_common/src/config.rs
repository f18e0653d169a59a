//! Configuration loading traits and types.
//!
//! The slider reads one TOML file at startup:
//!
//! ```toml
//! [shared]
//! service_name = "slider"
//! log_level = "info"
//!
//! [stepper]
//! max_speed = 2000
//!
//! [limits]
//! logic = "NC"
//! debounce_ms = 50
//! ```
//!
//! Every section except `[shared]` is optional and falls back to the
//! firmware defaults in [`crate::consts`].
//!
//! ```rust,no_run
//! use slider_common::config::{ConfigError, SliderConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = SliderConfig::load_validated(Path::new("config/slider.toml"))?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use crate::consts::DEFAULT_WATCHDOG_TIMEOUT_MS;
use crate::hal::config::{LimitConfig, ServoConfig, StepperConfig};
use crate::hal::driver::HalError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<HalError> for ConfigError {
    fn from(err: HalError) -> Self {
        match err {
            HalError::ConfigError(msg) => Self::ValidationError(msg),
            other => Self::ValidationError(other.to_string()),
        }
    }
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string for an `EnvFilter`.
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Fields common to every slider process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Instance identifier used in logs.
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            service_name: "slider".to_string(),
        }
    }
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

/// Task supervision settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskConfig {
    /// A task that has not fed its heartbeat for this long is reported stale.
    pub watchdog_timeout_ms: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            watchdog_timeout_ms: DEFAULT_WATCHDOG_TIMEOUT_MS,
        }
    }
}

impl TaskConfig {
    /// Watchdog timeout as a `Duration`.
    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }
}

/// Complete slider configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SliderConfig {
    /// Common process settings.
    pub shared: SharedConfig,
    /// Rail axis.
    #[serde(default)]
    pub stepper: StepperConfig,
    /// Head axis.
    #[serde(default)]
    pub servo: ServoConfig,
    /// End-stop switches.
    #[serde(default)]
    pub limits: LimitConfig,
    /// Task supervision.
    #[serde(default)]
    pub tasks: TaskConfig,
}

impl SliderConfig {
    /// Validate every section, including the end-stop over-travel bound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.stepper.validate()?;
        self.servo.validate()?;
        self.limits.validate(&self.stepper)?;
        if self.tasks.watchdog_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "tasks.watchdog_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Load from a TOML file and validate.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
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

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
