// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Stream session: one per inbound connection.
//
// Opens the upstream completion, feeds each chunk through the decoder and
// writes the resulting events to the client channel in order. Ends with
// exactly one `done` or `error` event unless the client has already gone.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::config::RelayConfig;
use crate::message::{ChatMessage, Conversation};
use crate::stream::{SseEncoder, StreamDecoder, TerminalKind};
use crate::upstream::{CompletionRequest, UpstreamClient, UpstreamError};

/// Outbound events buffered ahead of the client before the session waits.
pub const OUTBOUND_BUFFER: usize = 32;

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// `done` was written. Carries the conversation with the assistant
    /// reply appended.
    Completed(Conversation),
    /// `error` was written.
    Failed,
    /// The client disconnected; nothing further could be written.
    ClientGone,
}

/// Lifetime state of one browser-initiated conversation turn.
pub struct StreamSession {
    request_id: String,
    config: Arc<RelayConfig>,
    conversation: Conversation,
    tx: mpsc::Sender<Bytes>,
    decoder: StreamDecoder,
    encoder: SseEncoder,
    reply: String,
    tokens: usize,
}

impl StreamSession {
    /// Create a session for `user_message`, prefixed with the configured
    /// persona. Events are written to `tx`.
    pub fn new(
        request_id: impl Into<String>,
        config: Arc<RelayConfig>,
        user_message: impl Into<String>,
        tx: mpsc::Sender<Bytes>,
    ) -> Self {
        let mut conversation = Conversation::with_persona(config.persona.clone());
        conversation.push(ChatMessage::user(user_message));
        Self {
            request_id: request_id.into(),
            config,
            conversation,
            tx,
            decoder: StreamDecoder::new(),
            encoder: SseEncoder,
            reply: String::new(),
            tokens: 0,
        }
    }

    /// Drive the session to its terminal state.
    ///
    /// Both the upstream open and every upstream read race the client
    /// disconnect; on disconnect the upstream stream is dropped unread.
    pub async fn run(mut self, upstream: Arc<dyn UpstreamClient>) -> SessionOutcome {
        let request = CompletionRequest::streamed(&self.config.upstream, &self.conversation);

        let opened = tokio::select! {
            _ = self.tx.closed() => return self.client_gone(),
            result = upstream.open(request) => result,
        };
        let mut body = match opened {
            Ok(body) => body,
            Err(e) => return self.fail(e).await,
        };

        tracing::debug!(request_id = %self.request_id, "upstream stream opened");

        loop {
            let next = tokio::select! {
                _ = self.tx.closed() => return self.client_gone(),
                next = body.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let decoded = self.decoder.push(&chunk);
                    if !self.forward(decoded.tokens).await {
                        return self.client_gone();
                    }
                    if decoded.done {
                        return self.complete().await;
                    }
                }
                Some(Err(e)) => return self.fail(e).await,
                None => {
                    let decoded = self.decoder.finish();
                    if !decoded.done {
                        tracing::warn!(
                            request_id = %self.request_id,
                            tokens = self.tokens,
                            "upstream closed without end-of-stream marker"
                        );
                    }
                    if !self.forward(decoded.tokens).await {
                        return self.client_gone();
                    }
                    return self.complete().await;
                }
            }
        }
    }

    /// Write one `message` event per token. Returns `false` if the client
    /// has gone away.
    async fn forward(&mut self, tokens: Vec<String>) -> bool {
        for token in tokens {
            let frame = self.encoder.token(&token);
            if self.tx.send(frame).await.is_err() {
                return false;
            }
            self.reply.push_str(&token);
            self.tokens += 1;
        }
        true
    }

    async fn complete(mut self) -> SessionOutcome {
        let frame = self.encoder.terminal(TerminalKind::Done, None);
        if self.tx.send(frame).await.is_err() {
            return self.client_gone();
        }

        tracing::info!(
            request_id = %self.request_id,
            tokens = self.tokens,
            reply_chars = self.reply.chars().count(),
            "stream completed"
        );

        let reply = std::mem::take(&mut self.reply);
        self.conversation.push(ChatMessage::assistant(reply));
        SessionOutcome::Completed(self.conversation)
    }

    async fn fail(self, error: UpstreamError) -> SessionOutcome {
        // Detail stays in the server log; the client gets the fixed message.
        tracing::error!(
            request_id = %self.request_id,
            tokens = self.tokens,
            error = %error,
            "upstream stream failed"
        );

        let frame = self
            .encoder
            .terminal(TerminalKind::Error, Some(self.config.error_message.as_str()));
        if self.tx.send(frame).await.is_err() {
            return self.client_gone();
        }
        SessionOutcome::Failed
    }

    fn client_gone(self) -> SessionOutcome {
        tracing::info!(
            request_id = %self.request_id,
            tokens = self.tokens,
            "client disconnected, abandoning upstream"
        );
        SessionOutcome::ClientGone
    }
}
