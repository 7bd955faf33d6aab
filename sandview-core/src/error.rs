use thiserror::Error;

use crate::platform::PlatformError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("initialization error: {0}")]
    Initialization(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
