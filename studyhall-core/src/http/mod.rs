//! HTTP transport to the answering service
//!
//! The session talks to the answering service through `AnswerTransport`,
//! which yields the raw response body as a stream of byte chunks. Framing
//! and decoding happen in the session, so any transport that can produce
//! bytes (HTTP, a test script, a local pipe) plugs in here.

pub mod client;
pub mod error;

pub use client::HttpAnswerClient;
pub use error::TransportError;

use crate::protocol::types::AskRequest;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// Response body as an ordered stream of byte chunks
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Opens streamed answers from the answering service
#[async_trait]
pub trait AnswerTransport: Send + Sync {
    /// Send a question and return the readable response body
    ///
    /// Errors returned here mean no body was obtained: the service was
    /// unreachable, answered with a non-success status, or sent no body.
    async fn open(&self, request: &AskRequest) -> Result<ByteStream, TransportError>;
}
