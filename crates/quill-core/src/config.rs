use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_STREAM_PATH: &str = "/ai/chat-stream";
pub const DEFAULT_SIMPLE_PATH: &str = "/ai/chat-simple";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000; // non-streaming calls only
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Top-level config (quill.toml + QUILL_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuillConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Where the generative-text backend lives and how to authenticate to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_stream_path")]
    pub stream_path: String,
    #[serde(default = "default_simple_path")]
    pub simple_path: String,
    /// Bearer token sent verbatim. Takes precedence over `token_env`.
    pub token: Option<String>,
    /// Name of an environment variable read at request time for the token.
    pub token_env: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stream_path: default_stream_path(),
            simple_path: default_simple_path(),
            token: None,
            token_env: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl BackendConfig {
    /// Join `base_url` and `path` with exactly one slash between them.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// SSE framing used when the response declares `text/event-stream`.
///
/// The backend has been observed emitting both shapes, so neither is assumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    /// Events are blocks separated by a blank line; `data:` lines are merged.
    #[default]
    Block,
    /// Every newline-terminated line is its own frame.
    Line,
}

/// What to do with a content payload that yields no known field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RawFallback {
    /// Deliver the raw data string verbatim, whether or not it parsed.
    #[default]
    Always,
    /// Deliver raw text only when it is not JSON; drop field-less JSON objects.
    UnparseableOnly,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default)]
    pub framing: Framing,
    #[serde(default)]
    pub raw_fallback: RawFallback,
}

/// Defaults applied to every outgoing chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "bool_true")]
    pub use_knowledge_base: bool,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            use_knowledge_base: true,
            similarity_threshold: default_similarity_threshold(),
            top_k: default_top_k(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_stream_path() -> String {
    DEFAULT_STREAM_PATH.to_string()
}
fn default_simple_path() -> String {
    DEFAULT_SIMPLE_PATH.to_string()
}
fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}
fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}
fn default_similarity_threshold() -> f32 {
    0.3
}
fn default_top_k() -> u32 {
    5
}
fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

impl QuillConfig {
    /// Load config from a TOML file with QUILL_* env var overrides.
    ///
    /// The file is `config_path` if given, else `~/.quill/quill.toml`. A
    /// missing file is fine: every field has a default. Nested keys use a
    /// double underscore, e.g. `QUILL_BACKEND__BASE_URL`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: QuillConfig = Figment::from(Serialized::defaults(QuillConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("QUILL_").split("__"))
            .extract()
            .map_err(|e| crate::error::QuillError::Config(e.to_string()))?;

        tracing::debug!(path = %path, base_url = %config.backend.base_url, "config loaded");
        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.quill/quill.toml", home)
}
