//! Newline-delimited JSON decoding for streamed answers
//!
//! The answering service writes one JSON object per line, shaped either
//! `{"content": "..."}` or `{"error": "..."}`. Transport reads deliver an
//! arbitrary chunking of those bytes, so `LineDecoder` holds partial lines
//! until their newline arrives and `decode_line` only ever sees whole lines.

use crate::protocol::types::StreamFragment;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Default upper bound for a single buffered line (1 MiB)
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Reasons a line could not be turned into a fragment
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("line is not valid UTF-8")]
    InvalidUtf8,

    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("unexpected line shape: {0}")]
    UnexpectedShape(String),
}

/// Splits a byte stream into complete lines
///
/// Bytes are buffered rather than characters so a multi-byte UTF-8
/// sequence split across reads is rejoined before decoding. Line order is
/// preserved exactly.
#[derive(Debug)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    max_line_bytes: usize,
    /// Set while skipping the remainder of an oversized line
    discarding: bool,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_BYTES)
    }
}

impl LineDecoder {
    /// Create a decoder that rejects lines longer than `max_line_bytes`
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line_bytes,
            discarding: false,
        }
    }

    /// Feed one transport chunk, returning every line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<String, DecodeError>> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            rest = &tail[1..];

            if self.discarding {
                self.discarding = false;
                self.buffer.clear();
                continue;
            }

            self.buffer.extend_from_slice(head);
            let line = std::mem::take(&mut self.buffer);
            lines.push(self.complete_line(line));
        }

        if !rest.is_empty() && !self.discarding {
            self.buffer.extend_from_slice(rest);
            // A trailing `\r` may be the first half of a CRLF terminator.
            let pending_cr = usize::from(self.buffer.last() == Some(&b'\r'));
            if self.buffer.len() - pending_cr > self.max_line_bytes {
                self.buffer.clear();
                self.discarding = true;
                lines.push(Err(DecodeError::LineTooLong {
                    limit: self.max_line_bytes,
                }));
            }
        }

        lines
    }

    /// Flush the unterminated final line once the transport has closed
    pub fn finish(&mut self) -> Option<Result<String, DecodeError>> {
        let discarding = std::mem::take(&mut self.discarding);
        let line = std::mem::take(&mut self.buffer);
        if discarding || line.is_empty() {
            return None;
        }
        Some(self.complete_line(line))
    }

    /// Number of bytes held for an incomplete line
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    fn complete_line(&self, mut line: Vec<u8>) -> Result<String, DecodeError> {
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.len() > self.max_line_bytes {
            return Err(DecodeError::LineTooLong {
                limit: self.max_line_bytes,
            });
        }
        String::from_utf8(line).map_err(|_| DecodeError::InvalidUtf8)
    }
}

#[derive(Debug, Deserialize)]
struct WireLine {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Decode one complete line
///
/// Returns `Ok(None)` for lines that carry nothing: blank lines and objects
/// with neither `content` nor `error`. When both are present the error wins.
pub fn decode_line(line: &str) -> Result<Option<StreamFragment>, DecodeError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let value: Value =
        serde_json::from_str(line).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
    if !value.is_object() {
        return Err(DecodeError::UnexpectedShape(
            "expected a JSON object".to_string(),
        ));
    }

    let wire: WireLine =
        serde_json::from_value(value).map_err(|e| DecodeError::UnexpectedShape(e.to_string()))?;

    Ok(match (wire.error, wire.content) {
        (Some(error), _) => Some(StreamFragment::Error(error)),
        (None, Some(content)) => Some(StreamFragment::Content(content)),
        (None, None) => None,
    })
}
