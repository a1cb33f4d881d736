//! Studyhall Core Library
//!
//! Streaming question/answer sessions for the Studyhall course-material
//! assistant. A `ChatSession` sends a question about one subject to the
//! answering service, decodes the newline-delimited JSON answer as it
//! arrives, and publishes each change of the growing answer to an
//! `ExchangeObserver`. Completed answers can be saved through a
//! `ResponseStore`.

pub mod config;
pub mod http;
pub mod persistence;
pub mod protocol;
pub mod session;

pub use config::{SessionSettings, StudyhallConfig};
pub use http::{AnswerTransport, HttpAnswerClient, TransportError};
pub use persistence::{HttpResponseStore, MemoryResponseStore, ResponseStore, SavedResponse};
pub use protocol::{Exchange, ExchangeId, ExchangeStatus, Role, StreamFragment};
pub use session::{
    ChatSession, ExchangeObserver, ExchangeOutcome, FailureKind, SaveError, SessionState,
    SubmitError,
};

/// Returns the version of the Studyhall Core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
