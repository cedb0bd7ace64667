//! Unified error handling for the fan-pwm governor
//!
//! A single error type shared by the core library and the daemon, built on
//! thiserror so every variant carries enough context to log on its own.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Result type alias using HardwareError
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Unified error type for hardware and configuration failures
#[derive(thiserror::Error, Debug)]
pub enum HardwareError {
    #[error("Failed to read file {path}: {source}")]
    FileRead { path: PathBuf, source: io::Error },

    #[error("Failed to write file {path}: {source}")]
    FileWrite { path: PathBuf, source: io::Error },

    #[error("Failed to read PWM attribute {path}: {reason}")]
    PwmRead { path: PathBuf, reason: String },

    #[error("Failed to write PWM attribute {path}: {reason}")]
    PwmWrite { path: PathBuf, reason: String },

    #[error("Failed to read temperature from {path}: {reason}")]
    TemperatureRead { path: PathBuf, reason: String },

    #[error("Failed to read tachometer input {path}: {reason}")]
    TachRead { path: PathBuf, reason: String },

    #[error("Timed out waiting for {what} after {waited:?}")]
    Timeout { what: String, waited: Duration },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl HardwareError {
    /// Create a timeout error
    pub fn timeout(what: impl Into<String>, waited: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            waited,
        }
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
