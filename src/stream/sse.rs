// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Outbound SSE framing
//
// Every record the relay writes to the browser goes through `SseEncoder`.
// Event names come from a closed set and payloads are JSON string literals,
// so a token containing `\n\n` or `event:` cannot break the framing.

use bytes::Bytes;

/// Event name for a content token.
pub const MESSAGE_EVENT: &str = "message";

/// The two ways a stream session may end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalKind {
    Done,
    Error,
}

impl TerminalKind {
    pub fn event_name(self) -> &'static str {
        match self {
            TerminalKind::Done => "done",
            TerminalKind::Error => "error",
        }
    }
}

/// Builds `event: <name>\ndata: <payload>\n\n` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct SseEncoder;

impl SseEncoder {
    /// A `message` record carrying one token as a JSON string.
    pub fn token(&self, text: &str) -> Bytes {
        frame(MESSAGE_EVENT, &json_string(text))
    }

    /// A terminal record. `None` yields an empty `data:` field.
    pub fn terminal(&self, kind: TerminalKind, payload: Option<&str>) -> Bytes {
        let data = payload.map(json_string).unwrap_or_default();
        frame(kind.event_name(), &data)
    }
}

fn frame(event: &str, data: &str) -> Bytes {
    Bytes::from(format!("event: {event}\ndata: {data}\n\n"))
}

/// JSON string literal for `text`. Newlines and quotes come out escaped.
fn json_string(text: &str) -> String {
    serde_json::Value::String(text.to_owned()).to_string()
}
