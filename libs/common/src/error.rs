//! Errors of the configuration, logging and hex helpers

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed config document
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document could not be written in the requested format
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Bad hex text or similar operator input
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid filter directive or subscriber bootstrap failure
    #[error("Logging error: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}
