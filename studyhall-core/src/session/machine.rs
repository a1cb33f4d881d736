//! State machine for a single question/answer exchange
//!
//! `ExchangeMachine` owns the assistant exchange's text and status while an
//! answer is in flight. It performs no IO: each event returns the
//! `ExchangeUpdate` to publish, or `None` when the event is discarded
//! (late fragments after finalization, duplicate terminal events).

use crate::http::TransportError;
use crate::protocol::types::{ExchangeId, ExchangeStatus, StreamFragment};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an exchange ended in failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The service could not be reached, answered with a non-success
    /// status, sent no body, or the body read failed
    NetworkFailure,
    /// The answer deadline expired; displayed like `NetworkFailure`
    Timeout,
    /// A malformed line under the strict decode policy
    StreamDecodeError,
    /// The service sent an `error` line
    ServiceReportedError,
    /// The user aborted the exchange
    Cancelled,
}

impl FailureKind {
    /// Exchange status shown for this failure
    pub fn status(&self) -> ExchangeStatus {
        match self {
            Self::Cancelled => ExchangeStatus::Cancelled,
            _ => ExchangeStatus::Failed,
        }
    }

    /// Whether the displayed text is replaced by the fallback message
    pub fn uses_fallback_text(&self) -> bool {
        matches!(
            self,
            Self::NetworkFailure | Self::Timeout | Self::StreamDecodeError
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NetworkFailure => "network failure",
            Self::Timeout => "timeout",
            Self::StreamDecodeError => "stream decode error",
            Self::ServiceReportedError => "service reported error",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Timeouts keep their own kind; every other transport error is a
/// network failure
impl From<&TransportError> for FailureKind {
    fn from(err: &TransportError) -> Self {
        match err {
            TransportError::Timeout => Self::Timeout,
            _ => Self::NetworkFailure,
        }
    }
}

/// Terminal result of an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Complete,
    Failed(FailureKind),
}

/// Session-level state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No question has been submitted yet
    Idle,
    /// Question sent, waiting for a readable response body
    Sending,
    /// Consuming the response body
    Streaming,
    /// The last exchange has ended
    Finalized(Outcome),
}

impl SessionState {
    /// Whether a question is currently in flight
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Sending | Self::Streaming)
    }
}

/// A change to publish for the assistant exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeUpdate {
    pub id: ExchangeId,
    pub text: String,
    pub status: ExchangeStatus,
}

/// Pure state machine for one assistant exchange
#[derive(Debug)]
pub struct ExchangeMachine {
    exchange_id: ExchangeId,
    state: SessionState,
    text: String,
    fallback_message: String,
    malformed_lines: usize,
}

impl ExchangeMachine {
    /// Start a machine in `Sending` for the given placeholder exchange
    pub fn new(exchange_id: ExchangeId, fallback_message: impl Into<String>) -> Self {
        Self {
            exchange_id,
            state: SessionState::Sending,
            text: String::new(),
            fallback_message: fallback_message.into(),
            malformed_lines: 0,
        }
    }

    pub fn exchange_id(&self) -> ExchangeId {
        self.exchange_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of lines dropped as malformed so far
    pub fn malformed_lines(&self) -> usize {
        self.malformed_lines
    }

    /// Failure kind if the exchange has failed
    pub fn failure(&self) -> Option<FailureKind> {
        match self.state {
            SessionState::Finalized(Outcome::Failed(kind)) => Some(kind),
            _ => None,
        }
    }

    /// Exchange status matching the current state
    pub fn status(&self) -> ExchangeStatus {
        match self.state {
            SessionState::Idle | SessionState::Sending => ExchangeStatus::Pending,
            SessionState::Streaming => ExchangeStatus::Streaming,
            SessionState::Finalized(Outcome::Complete) => ExchangeStatus::Complete,
            SessionState::Finalized(Outcome::Failed(kind)) => kind.status(),
        }
    }

    /// `Sending -> Streaming` once a readable body is available
    pub fn body_opened(&mut self) -> Option<ExchangeUpdate> {
        if self.state != SessionState::Sending {
            return None;
        }
        self.state = SessionState::Streaming;
        Some(self.update())
    }

    /// Apply one decoded fragment; ignored unless streaming
    pub fn apply(&mut self, fragment: StreamFragment) -> Option<ExchangeUpdate> {
        if self.state != SessionState::Streaming {
            return None;
        }
        match fragment {
            StreamFragment::Content(content) => {
                self.text.push_str(&content);
                Some(self.update())
            }
            StreamFragment::Error(message) => {
                self.text = message;
                self.finalize(Outcome::Failed(FailureKind::ServiceReportedError))
            }
            StreamFragment::EndOfStream => self.finalize(Outcome::Complete),
        }
    }

    /// Record a malformed line; under the strict policy it ends the exchange
    pub fn malformed_line(&mut self, strict: bool) -> Option<ExchangeUpdate> {
        if self.state != SessionState::Streaming {
            return None;
        }
        self.malformed_lines += 1;
        if strict {
            self.fail(FailureKind::StreamDecodeError)
        } else {
            None
        }
    }

    /// Fail an in-flight exchange
    ///
    /// Fallback kinds replace the text with the fallback message; a
    /// cancellation freezes the text at its last published value.
    pub fn fail(&mut self, kind: FailureKind) -> Option<ExchangeUpdate> {
        if !self.state.is_in_flight() {
            return None;
        }
        if kind.uses_fallback_text() {
            self.text = self.fallback_message.clone();
        }
        self.finalize(Outcome::Failed(kind))
    }

    /// Abort an in-flight exchange
    pub fn cancel(&mut self) -> Option<ExchangeUpdate> {
        self.fail(FailureKind::Cancelled)
    }

    fn finalize(&mut self, outcome: Outcome) -> Option<ExchangeUpdate> {
        self.state = SessionState::Finalized(outcome);
        Some(self.update())
    }

    fn update(&self) -> ExchangeUpdate {
        ExchangeUpdate {
            id: self.exchange_id,
            text: self.text.clone(),
            status: self.status(),
        }
    }
}
