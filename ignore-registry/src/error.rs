//! Error types for registry operations

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Registry lock poisoned")]
    LockPoisoned,

    #[error("Invalid domain: {0:?}")]
    InvalidDomain(String),

    #[error("Invalid timestamp {value:?} for {domain}: {source}")]
    Timestamp {
        domain: String,
        value: String,
        source: chrono::ParseError,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error on {path}: {source}")]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
