use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during scenario loading, parsing, or validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The specified scenario file was not found.
    #[error("scenario file not found: {0}")]
    NotFound(PathBuf),

    /// TOML parsing failed.
    #[error("TOML parse error: {0}")]
    Parse(String),

    /// A scenario value failed validation.
    #[error("validation error: {field}: {message}")]
    Validation {
        /// The dotted field path (e.g. `instances.a.env`).
        field: String,
        /// Human-readable description of the violation.
        message: String,
    },

    /// An I/O error occurred while reading the scenario file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
