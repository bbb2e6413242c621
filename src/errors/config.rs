// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

/// Errors that can occur while loading or validating a bridge configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The configuration file could not be read
    Io {
        /// Path of the file that failed to load
        path: String,
        /// Underlying I/O error message
        message: String,
    },
    /// The configuration file is not valid YAML or TOML
    Parse {
        /// Path of the file that failed to parse
        path: String,
        /// Parser error message
        message: String,
    },
    /// The file extension does not name a supported format
    UnsupportedFormat {
        /// Path with the unrecognised extension
        path: String,
    },
    /// A field holds a value outside its allowed range
    InvalidValue {
        /// Dotted name of the offending field
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, message } => {
                write!(f, "Failed to read config '{}': {}", path, message)
            }
            ConfigError::Parse { path, message } => {
                write!(f, "Failed to parse config '{}': {}", path, message)
            }
            ConfigError::UnsupportedFormat { path } => {
                write!(
                    f,
                    "Unsupported config format for '{}': expected .yaml, .yml or .toml",
                    path
                )
            }
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
