// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Upstream stream decoder
//
// Turns the provider's chunked `data: {...}` framing into content tokens.
// Pure transformation of bytes already received: the caller owns all
// awaiting.

/// Prefix of every record line carrying a payload.
const DATA_PREFIX: &str = "data:";

/// Payload of the record that ends the stream.
const DONE_SENTINEL: &str = "[DONE]";

/// Tokens produced from one chunk, plus whether the end-of-stream sentinel
/// was seen in it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub tokens: Vec<String>,
    pub done: bool,
}

/// Incremental decoder for an OpenAI-compatible chat-completions stream.
///
/// Bytes are buffered until a full line is available, so records (and
/// multi-byte UTF-8 characters) split across chunk boundaries decode the
/// same as the unsplit stream. Once the sentinel is seen the decoder is
/// finished and ignores further input.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Bytes received after the last complete line.
    residual: Vec<u8>,
    finished: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the end-of-stream sentinel has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one upstream chunk and return every token completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Decoded {
        let mut out = Decoded::default();
        if self.finished {
            return out;
        }

        self.residual.extend_from_slice(chunk);

        let mut consumed = 0;
        while let Some(offset) = self.residual[consumed..].iter().position(|&b| b == b'\n') {
            let end = consumed + offset;
            let line = String::from_utf8_lossy(&self.residual[consumed..end]).into_owned();
            consumed = end + 1;

            if process_line(&line, &mut out.tokens) {
                self.finish_stream(&mut out);
                return out;
            }
        }
        self.residual.drain(..consumed);

        out
    }

    /// Flush the residual partial line once the upstream has closed.
    ///
    /// A final record sent without a trailing newline is still decoded.
    pub fn finish(&mut self) -> Decoded {
        let mut out = Decoded::default();
        if self.finished {
            return out;
        }

        let residual = std::mem::take(&mut self.residual);
        let line = String::from_utf8_lossy(&residual);
        if process_line(&line, &mut out.tokens) {
            out.done = true;
        }
        self.finished = true;
        out
    }

    fn finish_stream(&mut self, out: &mut Decoded) {
        out.done = true;
        self.finished = true;
        self.residual.clear();
    }
}

/// Handle one complete line. Returns `true` on the sentinel record.
fn process_line(line: &str, tokens: &mut Vec<String>) -> bool {
    // `trim` also drops the `\r` of CRLF framing.
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return false;
    }

    let Some(payload) = trimmed.strip_prefix(DATA_PREFIX) else {
        // `event:`, `id:`, `:` comments and anything else carry no tokens.
        return false;
    };
    let payload = payload.trim();

    if payload == DONE_SENTINEL {
        return true;
    }

    if let Some(token) = extract_content(payload) {
        tokens.push(token);
    }
    false
}

/// Extract `choices[0].delta.content` from one record payload.
///
/// Non-JSON payloads (heartbeats, keep-alives) and records without content
/// yield `None`.
pub fn extract_content(payload: &str) -> Option<String> {
    let json: serde_json::Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            tracing::trace!(error = %e, "skipping non-JSON stream record");
            return None;
        }
    };

    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|content| content.as_str())
        .filter(|content| !content.is_empty())
        .map(String::from)
}
