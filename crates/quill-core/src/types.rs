use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config::ChatConfig;
use crate::error::ValidationError;

/// Longest accepted chat message after trimming, in UTF-16 code units (the
/// unit browsers and the backend count length in).
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Identifies one decoding run. UUIDv7, so ids sort by creation time in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A previous turn of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Retrieval knobs for the knowledge-base backed endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeOptions {
    pub use_knowledge_base: bool,
    pub similarity_threshold: f32,
    pub top_k: u32,
}

impl Default for KnowledgeOptions {
    fn default() -> Self {
        Self {
            use_knowledge_base: true,
            similarity_threshold: 0.3,
            top_k: 5,
        }
    }
}

impl From<&ChatConfig> for KnowledgeOptions {
    fn from(chat: &ChatConfig) -> Self {
        Self {
            use_knowledge_base: chat.use_knowledge_base,
            similarity_threshold: chat.similarity_threshold,
            top_k: chat.top_k,
        }
    }
}

/// A validated chat request, serialized as the POST body.
///
/// Construction is the only validation point: a `ChatRequest` that exists
/// always carries a trimmed, non-empty message of at most
/// [`MAX_MESSAGE_CHARS`] UTF-16 code units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    message: String,
    #[serde(flatten)]
    knowledge: KnowledgeOptions,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    history: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn new(message: &str) -> Result<Self, ValidationError> {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty);
        }

        let len = trimmed.encode_utf16().count();
        if len > MAX_MESSAGE_CHARS {
            return Err(ValidationError::TooLong {
                len,
                max: MAX_MESSAGE_CHARS,
            });
        }

        Ok(Self {
            message: trimmed.to_string(),
            knowledge: KnowledgeOptions::default(),
            history: Vec::new(),
        })
    }

    /// Attach prior turns, keeping only the most recent `limit` of them.
    pub fn with_history(mut self, mut history: Vec<ChatMessage>, limit: usize) -> Self {
        if history.len() > limit {
            history.drain(..history.len() - limit);
        }
        self.history = history;
        self
    }

    pub fn with_knowledge(mut self, knowledge: KnowledgeOptions) -> Self {
        self.knowledge = knowledge;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn knowledge(&self) -> &KnowledgeOptions {
        &self.knowledge
    }
}
