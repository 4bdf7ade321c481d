// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Upstream chat-completions client
//
// Responsibilities:
// - Build the streamed chat-completions request body
// - POST it with bearer auth to `{base_url}/v1/chat/completions`
// - Map non-success status and transport failures to `UpstreamError`
// - Hand back the response body as an incremental byte stream

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::Stream;
use futures_util::TryStreamExt;
use serde::Serialize;

use crate::config::UpstreamConfig;
use crate::message::{ChatMessage, Conversation};

/// Upper bound on how much of an error body is read for the server log.
const ERROR_BODY_LOG_LIMIT: usize = 2048;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Body of the outbound chat-completions request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
}

impl CompletionRequest {
    /// A streamed request for `conversation` using the configured model
    /// parameters.
    pub fn streamed(config: &UpstreamConfig, conversation: &Conversation) -> Self {
        Self {
            model: config.model.clone(),
            messages: conversation.messages().to_vec(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            stream: true,
        }
    }
}

/// Incremental upstream response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, UpstreamError>> + Send>>;

/// Errors talking to the upstream provider. Never shown to the browser.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("upstream request timed out: {0}")]
    Timeout(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout(e.to_string())
        } else {
            UpstreamError::Transport(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Trait: UpstreamClient (dependency injection point)
// ---------------------------------------------------------------------------

/// Opens one streamed completion per call.
///
/// Implementations must be Send + Sync so they can be shared across request
/// handlers via `Arc`. Dropping the returned stream must release the
/// underlying connection.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn open(&self, request: CompletionRequest) -> Result<ByteStream, UpstreamError>;
}

// ---------------------------------------------------------------------------
// Reqwest implementation
// ---------------------------------------------------------------------------

pub struct ReqwestUpstreamClient {
    client: reqwest::Client,
    config: Arc<UpstreamConfig>,
}

impl ReqwestUpstreamClient {
    pub fn new(client: reqwest::Client, config: Arc<UpstreamConfig>) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl UpstreamClient for ReqwestUpstreamClient {
    async fn open(&self, request: CompletionRequest) -> Result<ByteStream, UpstreamError> {
        let mut req = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request);

        if let Some(timeout_ms) = self.config.timeout_ms {
            req = req.timeout(std::time::Duration::from_millis(timeout_ms));
        }

        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = read_error_body(resp).await;
            return Err(UpstreamError::Status { status, body });
        }

        let stream = resp.bytes_stream().map_err(UpstreamError::from);
        Ok(Box::pin(stream))
    }
}

/// Best-effort read of an error response body, truncated for logging.
async fn read_error_body(resp: reqwest::Response) -> String {
    match resp.text().await {
        Ok(text) => truncate_chars(&text, ERROR_BODY_LOG_LIMIT),
        Err(e) => format!("<unreadable body: {e}>"),
    }
}

fn truncate_chars(input: &str, max: usize) -> String {
    match input.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &input[..idx]),
        None => input.to_string(),
    }
}
