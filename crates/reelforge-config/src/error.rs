//! Configuration errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} is invalid after sanitising control characters")]
    InvalidValue { field: &'static str },

    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),

    #[error("invalid value for {field}: {value}")]
    InvalidEnv { field: &'static str, value: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
