//! quill-core — configuration, errors and the request model shared by the
//! decoder, the HTTP client and the CLI.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Framing, QuillConfig, RawFallback};
pub use error::{QuillError, Result, ValidationError};
pub use types::{ChatMessage, ChatRequest, KnowledgeOptions, Role, SessionId};
