//! Error types for the vidqueue library.

use thiserror::Error;

/// Errors that can occur during queueing and orchestration operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A video descriptor failed validation.
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// A download-mode value did not name a recognized mode.
    #[error("Invalid download mode: {0:?}")]
    InvalidMode(String),

    /// The operation was abandoned because a stop was requested.
    #[error("Download cancelled")]
    Cancelled,

    /// The external fetch collaborator reported a failure.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for vidqueue operations.
pub type Result<T> = std::result::Result<T, Error>;
