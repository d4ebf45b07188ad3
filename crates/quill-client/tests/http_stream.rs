//! ChatClient against a mock backend.

use std::sync::Arc;
use std::time::Duration;

use futures_util::TryStreamExt;
use quill_client::{ChatClient, ClientError, NoCredentials, StaticToken};
use quill_core::{Framing, QuillConfig, RawFallback};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const STREAM_PATH: &str = "/api/ai/chat-stream";
const SIMPLE_PATH: &str = "/api/ai/chat-simple";

fn config_for(server: &MockServer) -> QuillConfig {
    let mut config = QuillConfig::default();
    config.backend.base_url = format!("{}/api", server.uri());
    config
}

fn client_for(server: &MockServer) -> ChatClient {
    ChatClient::from_config(config_for(server)).unwrap()
}

fn sse(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

#[tokio::test]
async fn streams_sse_answer_into_sink() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(|req: &Request| {
            req.headers
                .get("accept")
                .and_then(|v| v.to_str().ok())
                == Some("text/event-stream, application/json")
        })
        .and(body_partial_json(json!({
            "message": "hi",
            "use_knowledge_base": true,
            "top_k": 5
        })))
        .respond_with(sse(
            "data: {\"content\":\"Hel\"}\n\n: ping\n\ndata: {\"content\":\"lo\"}\n\ndata: [DONE]\n\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut deltas: Vec<String> = Vec::new();
    let outcome = client.ask("  hi  ", &mut deltas).await.unwrap();

    assert_eq!(deltas, vec!["Hel", "lo"]);
    assert_eq!(outcome.answer, "Hello");
    assert_eq!(outcome.heartbeats, 1);
    assert!(outcome.saw_terminator);
}

#[tokio::test]
async fn line_framing_from_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(sse(
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\ndata: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\ndata: [DONE]\n",
        ))
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.stream.framing = Framing::Line;
    let client = ChatClient::from_config(config).unwrap();

    let mut answer = String::new();
    let outcome = client.ask("go", &mut answer).await.unwrap();
    assert_eq!(answer, "ab");
    assert_eq!(outcome.deltas, 2);
}

#[tokio::test]
async fn non_sse_body_is_plain_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("data: {\"content\":\"x\"}\n\n", "text/plain"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut body = String::new();
    let outcome = client.ask("hello", &mut body).await.unwrap();

    assert_eq!(body, "data: {\"content\":\"x\"}\n\n");
    assert_eq!(outcome.answer, "data: {\"content\":\"x\"}");
}

#[tokio::test]
async fn sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(header("authorization", "Bearer t0ken"))
        .respond_with(sse("data: ok\n\n"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(config_for(&server), Arc::new(StaticToken::new("t0ken"))).unwrap();
    let mut deltas: Vec<String> = Vec::new();
    client.ask("hi", &mut deltas).await.unwrap();
    assert_eq!(deltas, vec!["ok"]);
}

#[tokio::test]
async fn anonymous_requests_carry_no_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(|req: &Request| !req.headers.contains_key("authorization"))
        .respond_with(sse("data: ok\n\n"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(config_for(&server), Arc::new(NoCredentials)).unwrap();
    let mut deltas: Vec<String> = Vec::new();
    client.ask("hi", &mut deltas).await.unwrap();
}

#[tokio::test]
async fn error_status_is_reported_without_decoding() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("data: {\"content\":\"boom\"}"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut deltas: Vec<String> = Vec::new();
    let err = client.ask("hi", &mut deltas).await.unwrap_err();

    match err {
        ClientError::Api {
            status,
            status_text,
            body,
        } => {
            assert_eq!(status, 500);
            assert_eq!(status_text, "Internal Server Error");
            assert!(body.contains("boom"));
        }
        other => panic!("expected API error, got {other:?}"),
    }
    assert!(deltas.is_empty());
}

#[tokio::test]
async fn invalid_message_never_reaches_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sse("data: nope\n\n"))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut deltas: Vec<String> = Vec::new();

    let err = client.ask("   ", &mut deltas).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let long = "x".repeat(1001);
    let err = client.ask(&long, &mut deltas).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
}

#[tokio::test]
async fn strict_fallback_from_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(sse(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\ndata: {\"text\":\"t\"}\n\n",
        ))
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.stream.raw_fallback = RawFallback::UnparseableOnly;
    let client = ChatClient::from_config(config).unwrap();

    let mut deltas: Vec<String> = Vec::new();
    client.ask("hi", &mut deltas).await.unwrap();
    assert_eq!(deltas, vec!["t"]);
}

#[tokio::test]
async fn pre_cancelled_token_returns_empty_cancelled_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(sse("data: late\n\n"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = client.request("hi").unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let mut deltas: Vec<String> = Vec::new();
    let outcome = client
        .stream_chat_cancellable(&request, &mut deltas, token)
        .await
        .unwrap();

    assert!(outcome.cancelled);
    assert!(deltas.is_empty());
}

#[tokio::test]
async fn delta_stream_pulls_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(sse("data: {\"answer\":\"one\"}\n\ndata: {\"answer\":\" two\"}\n\n"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = client.request("count").unwrap();
    let deltas: Vec<String> = client
        .stream_deltas(&request)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(deltas, vec!["one", " two"]);
}

#[tokio::test]
async fn chat_simple_returns_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SIMPLE_PATH))
        .and(body_partial_json(json!({"message": "kb?", "similarity_threshold": 0.3})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "data": {"answer": "from the knowledge base"}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let reply = client.chat_simple(&client.request("kb?").unwrap()).await.unwrap();
    assert_eq!(reply["data"]["answer"], "from the knowledge base");
}

#[tokio::test]
async fn chat_simple_rejects_failure_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SIMPLE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 403,
            "message": "forbidden"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .chat_simple(&client.request("kb?").unwrap())
        .await
        .unwrap_err();

    match err {
        ClientError::Backend { code, message } => {
            assert_eq!(code, 403);
            assert_eq!(message, "forbidden");
        }
        other => panic!("expected backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn chat_simple_honours_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SIMPLE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"code": 200}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.backend.request_timeout_ms = 50;
    let client = ChatClient::from_config(config).unwrap();

    let err = client
        .chat_simple(&client.request("slow").unwrap())
        .await
        .unwrap_err();
    match err {
        ClientError::Http(e) => assert!(e.is_timeout()),
        other => panic!("expected timeout, got {other:?}"),
    }
}
