use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuillError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl QuillError {
    /// Short error code string, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            QuillError::Config(_) => "CONFIG_ERROR",
            QuillError::Validation(_) => "VALIDATION_ERROR",
            QuillError::Serialization(_) => "SERIALIZATION_ERROR",
            QuillError::Io(_) => "IO_ERROR",
        }
    }
}

/// Rejection of a chat message before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message must not be empty")]
    Empty,

    #[error("message too long: {len} characters (max {max})")]
    TooLong { len: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, QuillError>;
