//! Error types for fieldcheck shared primitives

use thiserror::Error;

/// Result type alias using the fieldcheck common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or rendering captured exchanges
#[derive(Error, Debug)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid body encoding: {0}")]
    BodyEncoding(String),

    #[error("Fixture not found: {0}")]
    FixtureMissing(String),
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::BodyEncoding(e.to_string())
    }
}
