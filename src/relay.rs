// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// HTTP relay endpoint
//
// Responsibilities:
// - GET /api/chat_stream?msg=... -> server-sent event stream of the reply
// - Reject any other method with 405 before doing upstream work
// - Commit SSE headers immediately; the body is fed by a StreamSession
// - Heartbeat endpoint

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header::{ALLOW, CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::session::{StreamSession, OUTBOUND_BUFFER};
use crate::upstream::UpstreamClient;

/// Path of the streaming chat endpoint.
pub const CHAT_STREAM_PATH: &str = "/api/chat_stream";

/// Path of the heartbeat endpoint.
pub const HEARTBEAT_PATH: &str = "/api/heartbeat";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors reported synchronously, before any stream is opened.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Only GET method allowed")]
    MethodNotAllowed,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match self {
            RelayError::MethodNotAllowed => {
                let body = serde_json::json!({ "error": self.to_string() });
                let mut response = (StatusCode::METHOD_NOT_ALLOWED, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(ALLOW, HeaderValue::from_static("GET"));
                response
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Shared state injected into axum handlers. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub upstream: Arc<dyn UpstreamClient>,
}

/// Query string of the chat endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ChatQuery {
    #[serde(default)]
    pub msg: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Heartbeat endpoint: GET /api/heartbeat -> 200 OK
pub async fn heartbeat() -> StatusCode {
    StatusCode::OK
}

/// Streaming chat handler.
///
/// Spawns one `StreamSession` per request and returns immediately with the
/// SSE headers; the session writes events into the response body as they
/// are decoded. Dropping the body (client disconnect) stops the session.
pub async fn chat_stream(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    if method != Method::GET {
        tracing::debug!(%method, "rejected non-GET chat stream request");
        return RelayError::MethodNotAllowed.into_response();
    }

    let msg = Query::<ChatQuery>::try_from_uri(&uri)
        .map(|Query(q)| q.msg)
        .unwrap_or_default();

    let request_id = Uuid::new_v4().to_string();
    tracing::info!(
        request_id = %request_id,
        msg_chars = msg.chars().count(),
        "chat stream requested"
    );

    let (tx, rx) = mpsc::channel::<Bytes>(OUTBOUND_BUFFER);
    let session = StreamSession::new(request_id, state.config.clone(), msg, tx);
    tokio::spawn(session.run(state.upstream.clone()));

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<Bytes, Infallible>));
    sse_response(body)
}

/// 200 response with the event-stream headers and a streaming body.
fn sse_response(body: Body) -> Response {
    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-transform"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}

// ---------------------------------------------------------------------------
// Router construction
// ---------------------------------------------------------------------------

/// Build the axum router with the chat stream and heartbeat endpoints.
///
/// The upstream client is injected, so tests can swap in a mock.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(HEARTBEAT_PATH, get(heartbeat))
        .route(CHAT_STREAM_PATH, any(chat_stream))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamConfig;
    use crate::message::ChatMessage;
    use crate::upstream::{ByteStream, CompletionRequest, UpstreamError};
    use axum::http::Request;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt; // for oneshot

    // -----------------------------------------------------------------------
    // Mock upstream clients
    // -----------------------------------------------------------------------

    /// Replays a fixed body split into the given chunks and records the
    /// request it was opened with.
    struct MockUpstream {
        chunks: Vec<&'static str>,
        captured: tokio::sync::Mutex<Vec<CompletionRequest>>,
        opened: AtomicUsize,
    }

    impl MockUpstream {
        fn new(chunks: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                chunks,
                captured: tokio::sync::Mutex::new(Vec::new()),
                opened: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl UpstreamClient for MockUpstream {
        async fn open(&self, request: CompletionRequest) -> Result<ByteStream, UpstreamError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            self.captured.lock().await.push(request);
            let chunks: Vec<Result<Bytes, UpstreamError>> = self
                .chunks
                .iter()
                .map(|c| Ok(Bytes::from_static(c.as_bytes())))
                .collect();
            Ok(Box::pin(tokio_stream::iter(chunks)))
        }
    }

    /// Responds like a provider returning HTTP 500.
    struct ServerErrorUpstream;

    #[async_trait::async_trait]
    impl UpstreamClient for ServerErrorUpstream {
        async fn open(&self, _request: CompletionRequest) -> Result<ByteStream, UpstreamError> {
            Err(UpstreamError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: r#"{"error":{"message":"internal server error"}}"#.to_string(),
            })
        }
    }

    fn test_config() -> Arc<RelayConfig> {
        Arc::new(RelayConfig {
            upstream: UpstreamConfig {
                base_url: "http://upstream.invalid".to_string(),
                api_key: "sk-test".to_string(),
                model: "gpt-3.5-turbo".to_string(),
                max_tokens: 600,
                temperature: 0.8,
                timeout_ms: None,
            },
            persona: "You are myj.".to_string(),
            error_message: "Please try again later".to_string(),
        })
    }

    fn app(upstream: Arc<dyn UpstreamClient>) -> Router {
        build_router(AppState {
            config: test_config(),
            upstream,
        })
    }

    fn request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(resp: Response) -> String {
        let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    const HI: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n";
    const THERE: &str = "data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\n";
    const DONE: &str = "data: [DONE]\n\n";

    // -----------------------------------------------------------------------
    // Successful stream
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn tokens_are_relayed_then_done() {
        let upstream = MockUpstream::new(vec![HI, THERE, DONE]);
        let resp = app(upstream)
            .oneshot(request("GET", "/api/chat_stream?msg=hello"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_string(resp).await;
        assert_eq!(
            body,
            "event: message\ndata: \"Hi\"\n\n\
             event: message\ndata: \" there\"\n\n\
             event: done\ndata: \n\n"
        );
    }

    #[tokio::test]
    async fn sse_headers_are_set() {
        let upstream = MockUpstream::new(vec![DONE]);
        let resp = app(upstream)
            .oneshot(request("GET", "/api/chat_stream?msg=x"))
            .await
            .unwrap();

        assert_eq!(resp.headers()[CONTENT_TYPE], "text/event-stream");
        assert_eq!(resp.headers()[CACHE_CONTROL], "no-cache, no-transform");
        assert_eq!(resp.headers()[CONNECTION], "keep-alive");
    }

    #[tokio::test]
    async fn record_split_mid_json_is_relayed_whole() {
        let upstream = MockUpstream::new(vec![
            "data: {\"cho",
            "ices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            DONE,
        ]);
        let resp = app(upstream)
            .oneshot(request("GET", "/api/chat_stream?msg=x"))
            .await
            .unwrap();

        let body = body_string(resp).await;
        assert_eq!(body, "event: message\ndata: \"Hi\"\n\nevent: done\ndata: \n\n");
    }

    // -----------------------------------------------------------------------
    // Query handling
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn msg_query_is_sent_as_user_message_after_persona() {
        let upstream = MockUpstream::new(vec![DONE]);
        let resp = app(upstream.clone())
            .oneshot(request(
                "GET",
                "/api/chat_stream?msg=%E4%BD%A0%E6%98%AF%E8%B0%81%3F+tell+me",
            ))
            .await
            .unwrap();
        body_string(resp).await;

        let captured = upstream.captured.lock().await;
        assert_eq!(captured.len(), 1);
        assert_eq!(
            captured[0].messages,
            vec![
                ChatMessage::system("You are myj."),
                ChatMessage::user("你是谁? tell me"),
            ]
        );
        assert!(captured[0].stream);
        assert_eq!(captured[0].max_tokens, 600);
    }

    #[tokio::test]
    async fn missing_msg_sends_empty_user_message() {
        let upstream = MockUpstream::new(vec![DONE]);
        let resp = app(upstream.clone())
            .oneshot(request("GET", "/api/chat_stream"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        body_string(resp).await;

        let captured = upstream.captured.lock().await;
        assert_eq!(captured[0].messages[1], ChatMessage::user(""));
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn upstream_500_yields_single_generic_error_event() {
        let resp = app(Arc::new(ServerErrorUpstream))
            .oneshot(request("GET", "/api/chat_stream?msg=hi"))
            .await
            .unwrap();

        // Headers are committed before the upstream outcome is known.
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_string(resp).await;
        assert_eq!(body, "event: error\ndata: \"Please try again later\"\n\n");
        assert!(!body.contains("internal server error"));
        assert!(!body.contains("event: message"));
    }

    #[tokio::test]
    async fn post_is_rejected_with_405_json() {
        let upstream = MockUpstream::new(vec![DONE]);
        let resp = app(upstream.clone())
            .oneshot(request("POST", "/api/chat_stream?msg=hi"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_ne!(
            resp.headers().get(CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );
        assert!(resp.headers().get(CACHE_CONTROL).is_none());

        let body = body_string(resp).await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "Only GET method allowed" }));

        assert_eq!(upstream.opened.load(Ordering::SeqCst), 0, "no upstream work");
    }

    #[tokio::test]
    async fn other_methods_are_rejected_too() {
        for method in ["PUT", "DELETE", "PATCH"] {
            let upstream = MockUpstream::new(vec![DONE]);
            let resp = app(upstream.clone())
                .oneshot(request(method, "/api/chat_stream"))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");
            assert_eq!(upstream.opened.load(Ordering::SeqCst), 0);
        }
    }

    #[test]
    fn method_not_allowed_sets_allow_header() {
        let resp = RelayError::MethodNotAllowed.into_response();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers()[ALLOW], "GET");
    }

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn heartbeat_returns_200() {
        let resp = app(MockUpstream::new(vec![]))
            .oneshot(request("GET", "/api/heartbeat"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_path_returns_404() {
        let resp = app(MockUpstream::new(vec![]))
            .oneshot(request("GET", "/v1/unknown"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    // -----------------------------------------------------------------------
    // Concurrency: sessions are independent
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn concurrent_sessions_are_independent() {
        let upstream = MockUpstream::new(vec![HI, THERE, DONE]);
        let num_requests = 10;
        let mut handles = Vec::new();

        for i in 0..num_requests {
            let router = app(upstream.clone());
            handles.push(tokio::spawn(async move {
                let resp = router
                    .oneshot(request("GET", &format!("/api/chat_stream?msg=q{i}")))
                    .await
                    .unwrap();
                body_string(resp).await
            }));
        }

        for handle in handles {
            let body = handle.await.unwrap();
            assert_eq!(body.matches("event: message").count(), 2);
            assert_eq!(body.matches("event: done").count(), 1);
        }

        assert_eq!(upstream.opened.load(Ordering::SeqCst), num_requests);
        let mut users: Vec<String> = upstream
            .captured
            .lock()
            .await
            .iter()
            .map(|r| r.messages[1].content().to_string())
            .collect();
        users.sort();
        let mut expected: Vec<String> = (0..num_requests).map(|i| format!("q{i}")).collect();
        expected.sort();
        assert_eq!(users, expected);
    }
}
