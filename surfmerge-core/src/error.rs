//! Error types for surfmerge

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for surfmerge operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unable to load mesh {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error("Parameter initialization failed: {0}")]
    ParamInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

impl Error {
    /// Build a load error for `path`
    pub fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for surfmerge operations
pub type Result<T> = std::result::Result<T, Error>;
