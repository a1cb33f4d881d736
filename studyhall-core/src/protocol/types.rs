//! Core protocol types for chat exchanges
//!
//! This module contains the data structures shared by the session, the
//! transport and the rendering layer:
//! - `Exchange` records one question or answer turn
//! - `StreamFragment` is one decoded unit of a streamed answer
//! - `AskRequest` is the body sent to the answering service

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an exchange, unique within one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeId(u64);

impl ExchangeId {
    /// Create an id from its raw value
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Who produced an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A question typed by the user
    User,
    /// An answer produced by the answering service
    Assistant,
}

/// Lifecycle status of an exchange
///
/// Only assistant exchanges move through these states; user exchanges are
/// created `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeStatus {
    /// Placeholder created, waiting for the service to respond
    Pending,
    /// Response body is being consumed
    Streaming,
    /// Stream ended normally
    Complete,
    /// Transport failure, service-reported error or decode failure
    Failed,
    /// Aborted by the user
    Cancelled,
}

impl ExchangeStatus {
    /// Whether no further updates can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Cancelled)
    }
}

/// One question or answer turn in a chat session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    /// Session-unique identifier
    pub id: ExchangeId,

    /// Who produced the text
    pub role: Role,

    /// Question or (accumulated) answer text
    pub text: String,

    /// Lifecycle status
    pub status: ExchangeStatus,
}

impl Exchange {
    /// Create a finalized user question
    pub fn user(id: ExchangeId, text: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::User,
            text: text.into(),
            status: ExchangeStatus::Complete,
        }
    }

    /// Create an empty assistant placeholder awaiting a response
    pub fn assistant_placeholder(id: ExchangeId) -> Self {
        Self {
            id,
            role: Role::Assistant,
            text: String::new(),
            status: ExchangeStatus::Pending,
        }
    }

    /// Create a finalized assistant message, e.g. a greeting
    pub fn assistant(id: ExchangeId, text: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            text: text.into(),
            status: ExchangeStatus::Complete,
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// One decoded unit of a streamed answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFragment {
    /// Text to append to the answer
    Content(String),
    /// Error reported by the service; ends the stream
    Error(String),
    /// Transport closed with no pending error
    EndOfStream,
}

impl StreamFragment {
    /// Returns true if this fragment ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::EndOfStream)
    }
}

/// Body of a question sent to the answering service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskRequest {
    /// The question text as typed
    pub question: String,

    /// Subject whose material the answer should draw on
    pub subject_id: String,
}

impl AskRequest {
    pub fn new(question: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            subject_id: subject_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ask_request_wire_shape() {
        let request = AskRequest::new("What is a monad?", "CS101");
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({ "question": "What is a monad?", "subject_id": "CS101" })
        );
    }

    #[test]
    fn test_placeholder_starts_pending_and_empty() {
        let exchange = Exchange::assistant_placeholder(ExchangeId::new(2));
        assert_eq!(exchange.status, ExchangeStatus::Pending);
        assert!(exchange.text.is_empty());
        assert!(exchange.is_assistant());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!ExchangeStatus::Pending.is_terminal());
        assert!(!ExchangeStatus::Streaming.is_terminal());
        assert!(ExchangeStatus::Complete.is_terminal());
        assert!(ExchangeStatus::Failed.is_terminal());
        assert!(ExchangeStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(ExchangeStatus::Cancelled).unwrap(),
            json!("cancelled")
        );
        assert_eq!(serde_json::to_value(Role::Assistant).unwrap(), json!("assistant"));
    }
}
