//! Harness error type.

use sketchzone_core::SafezoneError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Safezone(#[from] SafezoneError),
    #[error("invalid seed '{0}'")]
    InvalidSeed(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
