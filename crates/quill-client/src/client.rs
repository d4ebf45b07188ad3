use std::sync::Arc;
use std::time::Duration;

use futures_util::Stream;
use quill_core::{ChatMessage, ChatRequest, KnowledgeOptions, QuillConfig};
use quill_stream::{DecodeMode, DeltaSink, StreamOutcome, StreamSession};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::credentials::{credentials_from_config, CredentialProvider};
use crate::error::{ClientError, Result};

const STREAM_ACCEPT: &str = "text/event-stream, application/json";
const DEFAULT_BACKEND_MESSAGE: &str = "request failed";

/// HTTP client for the chat backend.
///
/// Streaming calls have no overall timeout: a healthy stream may run for as
/// long as the model keeps generating. Only connecting is bounded.
pub struct ChatClient {
    http: reqwest::Client,
    config: QuillConfig,
    credentials: Arc<dyn CredentialProvider>,
}

impl ChatClient {
    pub fn new(config: QuillConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        reqwest::Url::parse(&config.backend.base_url).map_err(|e| {
            ClientError::Config(format!("invalid base_url {:?}: {e}", config.backend.base_url))
        })?;

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.backend.connect_timeout_ms))
            .build()?;

        Ok(Self {
            http,
            config,
            credentials,
        })
    }

    /// Build a client whose credentials come from `config.backend`.
    pub fn from_config(config: QuillConfig) -> Result<Self> {
        let credentials = credentials_from_config(&config.backend);
        Self::new(config, credentials)
    }

    pub fn config(&self) -> &QuillConfig {
        &self.config
    }

    /// Validate `message`, then stream the answer into `sink`.
    ///
    /// Knowledge-base options come from the `[chat]` config section.
    pub async fn ask<K: DeltaSink + ?Sized>(
        &self,
        message: &str,
        sink: &mut K,
    ) -> Result<StreamOutcome> {
        let request = self.request(message)?;
        self.stream_chat(&request, sink).await
    }

    /// Build a validated request carrying the configured knowledge options.
    pub fn request(&self, message: &str) -> Result<ChatRequest> {
        Ok(ChatRequest::new(message)?.with_knowledge(KnowledgeOptions::from(&self.config.chat)))
    }

    /// Like [`request`](Self::request), with prior turns cut to the
    /// configured history limit.
    pub fn request_with_history(
        &self,
        message: &str,
        history: Vec<ChatMessage>,
    ) -> Result<ChatRequest> {
        Ok(self
            .request(message)?
            .with_history(history, self.config.chat.history_limit))
    }

    pub async fn stream_chat<K: DeltaSink + ?Sized>(
        &self,
        request: &ChatRequest,
        sink: &mut K,
    ) -> Result<StreamOutcome> {
        let (session, resp) = self.open_stream(request).await?;
        Ok(session.drive(resp.bytes_stream(), sink).await?)
    }

    /// Like [`stream_chat`](Self::stream_chat); cancelling `cancel` stops the
    /// read and returns whatever was decoded so far.
    pub async fn stream_chat_cancellable<K: DeltaSink + ?Sized>(
        &self,
        request: &ChatRequest,
        sink: &mut K,
        cancel: CancellationToken,
    ) -> Result<StreamOutcome> {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("cancelled before response headers");
                return Ok(StreamSession::new(DecodeMode::Plain).cancel());
            }
            opened = self.open_stream(request) => opened?,
        };
        let (session, resp) = opened;
        Ok(session
            .drive_cancellable(resp.bytes_stream(), sink, cancel)
            .await?)
    }

    /// Open the stream and hand back the deltas as a `Stream` instead of
    /// pushing them into a sink.
    pub async fn stream_deltas(
        &self,
        request: &ChatRequest,
    ) -> Result<impl Stream<Item = quill_stream::Result<String>>> {
        let (session, resp) = self.open_stream(request).await?;
        Ok(session.into_delta_stream(resp.bytes_stream()))
    }

    /// Non-streaming knowledge-base endpoint. Returns the reply's JSON body.
    #[instrument(skip(self, request), fields(chars = request.message().chars().count()))]
    pub async fn chat_simple(&self, request: &ChatRequest) -> Result<Value> {
        let url = self.config.backend.endpoint(&self.config.backend.simple_path);
        let timeout = Duration::from_millis(self.config.backend.request_timeout_ms);

        let resp = self
            .authorized(self.http.post(&url))
            .await
            .header(ACCEPT, "application/json")
            .timeout(timeout)
            .json(request)
            .send()
            .await?;

        let resp = check_status(resp).await?;
        let body: Value = resp.json().await?;
        check_envelope(&body)?;
        debug!("simple chat reply received");
        Ok(body)
    }

    #[instrument(skip(self, request), fields(chars = request.message().chars().count()))]
    async fn open_stream(&self, request: &ChatRequest) -> Result<(StreamSession, reqwest::Response)> {
        let url = self.config.backend.endpoint(&self.config.backend.stream_path);
        debug!(%url, "opening stream");

        let resp = self
            .authorized(self.http.post(&url))
            .await
            .header(ACCEPT, STREAM_ACCEPT)
            .json(request)
            .send()
            .await?;

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        let mode = DecodeMode::from_content_type(content_type, self.config.stream.framing);
        let mut session =
            StreamSession::new(mode).with_fallback(self.config.stream.raw_fallback);

        match check_status(resp).await {
            Ok(resp) => {
                info!(session = %session.id(), ?mode, "stream opened");
                Ok((session, resp))
            }
            Err(e) => {
                session.mark_failed();
                debug!(session = %session.id(), state = ?session.state(), "stream not opened");
                Err(e)
            }
        }
    }

    async fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.credentials.bearer_token().await {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

/// Turn a non-2xx reply into [`ClientError::Api`]. The body is read on a
/// best-effort basis.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), body = %body, "backend returned an error status");
    Err(ClientError::Api {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("").to_string(),
        body,
    })
}

/// Envelopes carrying a `code` key are failures even on HTTP 200 unless the
/// code is the number 200 or 0. A string or null code counts as a failure.
fn check_envelope(body: &Value) -> Result<()> {
    let Some(code) = body.get("code") else {
        return Ok(());
    };
    if matches!(code.as_f64(), Some(c) if c == 200.0 || c == 0.0) {
        return Ok(());
    }

    let message = body
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_BACKEND_MESSAGE)
        .to_string();
    warn!(%code, %message, "backend rejected request");
    Err(ClientError::Backend {
        code: code.clone(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_without_code_passes() {
        assert!(check_envelope(&json!({"answer": "hi"})).is_ok());
    }

    #[test]
    fn envelope_success_codes_pass() {
        assert!(check_envelope(&json!({"code": 200, "data": {}})).is_ok());
        assert!(check_envelope(&json!({"code": 0})).is_ok());
    }

    #[test]
    fn envelope_failure_code_rejected() {
        match check_envelope(&json!({"code": 401, "message": "token expired"})) {
            Err(ClientError::Backend { code, message }) => {
                assert_eq!(code, 401);
                assert_eq!(message, "token expired");
            }
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[test]
    fn envelope_non_numeric_code_rejected() {
        match check_envelope(&json!({"code": "E001", "message": "bad"})) {
            Err(ClientError::Backend { code, message }) => {
                assert_eq!(code, "E001");
                assert_eq!(message, "bad");
            }
            other => panic!("expected backend error, got {other:?}"),
        }

        match check_envelope(&json!({"code": null})) {
            Err(ClientError::Backend { code, .. }) => assert!(code.is_null()),
            other => panic!("expected backend error, got {other:?}"),
        }

        assert!(check_envelope(&json!({"code": 1.5})).is_err());
        assert!(check_envelope(&json!({"code": "200"})).is_err());
        assert!(check_envelope(&json!({"code": 200.0})).is_ok());
    }

    #[test]
    fn envelope_failure_without_message_uses_default() {
        match check_envelope(&json!({"code": 500})) {
            Err(ClientError::Backend { message, .. }) => assert_eq!(message, "request failed"),
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[test]
    fn history_is_cut_to_configured_limit() {
        let mut config = QuillConfig::default();
        config.chat.history_limit = 2;
        config.chat.top_k = 3;
        let client = ChatClient::from_config(config).unwrap();

        let history = vec![
            ChatMessage::user("one"),
            ChatMessage::assistant("two"),
            ChatMessage::user("three"),
        ];
        let request = client.request_with_history("four", history).unwrap();

        assert_eq!(request.history().len(), 2);
        assert_eq!(request.history()[0].content, "two");
        assert_eq!(request.knowledge().top_k, 3);
    }

    #[test]
    fn bad_base_url_is_a_config_error() {
        let mut config = QuillConfig::default();
        config.backend.base_url = "not a url".to_string();
        let err = ChatClient::from_config(config).err().unwrap();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
