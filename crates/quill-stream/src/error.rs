//! Error types for the quill-stream crate.

use thiserror::Error;

/// Failures that abort a decoding run.
///
/// Malformed events are not errors: they degrade to raw text. The only way a
/// session fails is its transport failing underneath it.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The read primitive failed mid-stream (connection drop, reset, …).
    /// The completion state of the answer is unknown.
    #[error("stream read failed: {0}")]
    Read(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StreamError {
    pub fn read<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        StreamError::Read(err.into())
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StreamError>;
