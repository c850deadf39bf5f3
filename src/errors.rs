// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the photo timer core

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Configuration errors
    Config(ConfigError),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Configuration errors
///
/// The only fatal error class in the crate: everything on the preview and
/// cache hot paths degrades to an absent result instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The pacer needs at least one target rate
    NoTargetRates,
    /// Fewer minimum rates than target tiers minus one
    NotEnoughMinimumRates {
        /// Number of configured target rates
        targets: usize,
        /// Number of configured minimum rates
        minimums: usize,
    },
    /// A setting value outside its valid range
    InvalidSetting(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoTargetRates => {
                write!(f, "At least one target frame rate is required")
            }
            ConfigError::NotEnoughMinimumRates { targets, minimums } => write!(
                f,
                "Must specify as many minimum rates as target rates minus one ({} targets, {} minimums)",
                targets, minimums
            ),
            ConfigError::InvalidSetting(msg) => write!(f, "Invalid setting: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for ConfigError {}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}
