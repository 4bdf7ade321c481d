// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// SSE decoding and encoding
//
// Responsibilities:
// - Decode the provider's `data: {...}` stream into content tokens,
//   across arbitrary chunk boundaries
// - Detect the `data: [DONE]` sentinel
// - Skip heartbeats and other non-JSON records without failing
// - Frame outbound `message` / `done` / `error` events for the browser

mod decoder;
mod sse;

pub use decoder::{extract_content, Decoded, StreamDecoder};
pub use sse::{SseEncoder, TerminalKind, MESSAGE_EVENT};
