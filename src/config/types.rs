// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

/// Top-level parsed and validated relay config.
///
/// Built once at startup and shared read-only (behind an `Arc`) by every
/// stream session.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub upstream: UpstreamConfig,
    /// System-role instruction prepended to every conversation.
    pub persona: String,
    /// User-facing text carried by the terminal `error` event.
    pub error_message: String,
}

/// Where and how to reach the chat-completions provider.
#[derive(Clone, PartialEq)]
pub struct UpstreamConfig {
    /// Base URL without trailing slash, e.g. `https://api.openai.com`.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Whole-request deadline. `None` leaves timeouts to the host.
    pub timeout_ms: Option<u64>,
}

impl UpstreamConfig {
    /// Full URL of the chat-completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

// Hand-written so the API key never ends up in logs.
impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}
