//! Bearer-token sources for outgoing requests.

use std::sync::Arc;

use async_trait::async_trait;
use quill_core::config::BackendConfig;
use tracing::debug;

/// Supplies the token sent as `Authorization: Bearer <token>`, if any.
///
/// Asked once per request so rotating tokens are picked up without
/// rebuilding the client.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn bearer_token(&self) -> Option<String>;
}

/// Anonymous access; no header is sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

#[async_trait]
impl CredentialProvider for NoCredentials {
    async fn bearer_token(&self) -> Option<String> {
        None
    }
}

#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

// Keep the token itself out of logs.
impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Reads the named environment variable on every request. Unset or blank
/// means no header.
#[derive(Debug, Clone)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl CredentialProvider for EnvToken {
    async fn bearer_token(&self) -> Option<String> {
        match std::env::var(&self.var) {
            Ok(token) if !token.trim().is_empty() => Some(token.trim().to_string()),
            _ => {
                debug!(var = %self.var, "token variable unset, sending no credentials");
                None
            }
        }
    }
}

/// Pick a provider from config: an inline `token` wins over `token_env`.
pub fn credentials_from_config(backend: &BackendConfig) -> Arc<dyn CredentialProvider> {
    if let Some(token) = backend.token.as_deref().filter(|t| !t.is_empty()) {
        return Arc::new(StaticToken::new(token));
    }
    if let Some(var) = backend.token_env.as_deref().filter(|v| !v.is_empty()) {
        return Arc::new(EnvToken::new(var));
    }
    Arc::new(NoCredentials)
}
