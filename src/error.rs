//! Error types for pmpack

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for conversion operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("corrupt container: {0}")]
    CorruptContainer(#[from] zip::result::ZipError),

    #[error("container has no project.json descriptor entry")]
    MissingDescriptor,

    #[error("invalid descriptor: {0}")]
    Descriptor(String),

    #[error("illegal entry name {name:?}: {reason}")]
    Name { name: String, reason: &'static str },

    #[error("descriptor reference {reference:?} does not resolve to any entry")]
    BrokenReference { reference: String },

    #[error("destination already contains a conflicting {path:?} (enable overwrite to replace it)")]
    DestinationConflict { path: PathBuf },

    #[error("unsupported conversion mode: {0:?}")]
    UnsupportedMode(String),

    #[error("conversion cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, Error>;
