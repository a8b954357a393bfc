use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Key '{0}' already exists")]
    DuplicateKey(String),

    #[error("Key '{0}' not found")]
    NotFound(String),

    /// The backing file exists, is non-empty and cannot be understood.
    /// The file is left untouched.
    #[error("Corrupt store at '{}': {reason}", path.display())]
    CorruptStore { path: PathBuf, reason: String },

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
