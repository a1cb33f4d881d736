//! Observer interface between a session and its rendering layer

use crate::protocol::types::{Exchange, ExchangeId, ExchangeStatus};
use tokio::sync::mpsc;

/// Receives transcript changes from a `ChatSession`
///
/// Callbacks run synchronously while the session holds its internal lock,
/// which is what keeps updates strictly ordered. Implementations must not
/// call back into the session.
pub trait ExchangeObserver: Send + Sync {
    /// A new exchange was appended to the transcript
    fn on_exchange_appended(&self, exchange: &Exchange);

    /// An exchange's text or status changed
    fn on_exchange_updated(&self, id: ExchangeId, text: &str, status: ExchangeStatus);
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ExchangeObserver for NoopObserver {
    fn on_exchange_appended(&self, _exchange: &Exchange) {}

    fn on_exchange_updated(&self, _id: ExchangeId, _text: &str, _status: ExchangeStatus) {}
}

/// Transcript change, as delivered by `ChannelObserver`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Appended(Exchange),
    Updated {
        id: ExchangeId,
        text: String,
        status: ExchangeStatus,
    },
}

/// Forwards events into an unbounded channel for an async rendering loop
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelObserver {
    /// Create an observer along with the receiving end of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, event: SessionEvent) {
        // A dropped receiver means nobody is rendering any more.
        if self.sender.send(event).is_err() {
            tracing::debug!("Session event dropped: receiver closed");
        }
    }
}

impl ExchangeObserver for ChannelObserver {
    fn on_exchange_appended(&self, exchange: &Exchange) {
        self.send(SessionEvent::Appended(exchange.clone()));
    }

    fn on_exchange_updated(&self, id: ExchangeId, text: &str, status: ExchangeStatus) {
        self.send(SessionEvent::Updated {
            id,
            text: text.to_string(),
            status,
        });
    }
}
