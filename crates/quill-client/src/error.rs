use quill_core::ValidationError;
use quill_stream::StreamError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx reply. `body` is whatever text could be read, possibly empty.
    #[error("API error ({status} {status_text}): {body}")]
    Api {
        status: u16,
        status_text: String,
        body: String,
    },

    /// 2xx reply whose JSON envelope carries a failure `code`. The code is
    /// kept as sent, since backends use strings as well as numbers.
    #[error("Backend error ({code}): {message}")]
    Backend {
        code: serde_json::Value,
        message: String,
    },

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Short error code string, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            ClientError::Validation(_) => "VALIDATION_ERROR",
            ClientError::Http(_) => "HTTP_ERROR",
            ClientError::Api { .. } => "API_ERROR",
            ClientError::Backend { .. } => "BACKEND_ERROR",
            ClientError::Stream(_) => "STREAM_ERROR",
            ClientError::Config(_) => "CONFIG_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
