use std::fmt::{self, Display};

/// Errors produced by model constructors and validation routines.
#[derive(Debug)]
pub enum ModelError {
    InvalidPass(String),
    InvalidMedia(String),
    InvalidAnnotation(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidPass(msg) => write!(f, "invalid pass: {msg}"),
            ModelError::InvalidMedia(msg) => write!(f, "invalid media: {msg}"),
            ModelError::InvalidAnnotation(msg) => {
                write!(f, "invalid annotation: {msg}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
