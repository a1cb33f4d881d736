//! Shared helpers for session integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::{stream, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use studyhall_core::http::{AnswerTransport, ByteStream, TransportError};
use studyhall_core::persistence::{
    PersistenceError, PersistenceResult, ResponseStore, SaveRequest, SavedResponse,
};
use studyhall_core::protocol::AskRequest;
use studyhall_core::session::SessionEvent;
use tokio::sync::mpsc::UnboundedReceiver;

enum Reply {
    Chunks(Vec<Bytes>),
    Live(mpsc::UnboundedReceiver<Result<Bytes, TransportError>>),
    Error(TransportError),
}

/// Transport that plays back queued replies, one per question
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<AskRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a body delivered as exactly these reads
    pub fn push_chunks(&self, chunks: &[&str]) {
        let chunks = chunks
            .iter()
            .map(|c| Bytes::copy_from_slice(c.as_bytes()))
            .collect();
        self.push(Reply::Chunks(chunks));
    }

    /// Queue a body delivered as raw byte reads
    pub fn push_bytes(&self, chunks: Vec<Vec<u8>>) {
        self.push(Reply::Chunks(chunks.into_iter().map(Bytes::from).collect()));
    }

    /// Queue a body the test writes to while the session reads it
    pub fn push_live(&self) -> LiveBody {
        let (sender, receiver) = mpsc::unbounded();
        self.push(Reply::Live(receiver));
        LiveBody { sender }
    }

    /// Queue a failure to obtain any body
    pub fn push_error(&self, error: TransportError) {
        self.push(Reply::Error(error));
    }

    /// Questions received so far
    pub fn requests(&self) -> Vec<AskRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }
}

#[async_trait]
impl AnswerTransport for ScriptedTransport {
    async fn open(&self, request: &AskRequest) -> Result<ByteStream, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Chunks(chunks)) => Ok(stream::iter(chunks.into_iter().map(Ok)).boxed()),
            Some(Reply::Live(receiver)) => Ok(receiver.boxed()),
            Some(Reply::Error(error)) => Err(error),
            None => Err(TransportError::Connect {
                message: "no scripted reply".to_string(),
            }),
        }
    }
}

/// Writing end of a live body
pub struct LiveBody {
    sender: mpsc::UnboundedSender<Result<Bytes, TransportError>>,
}

impl LiveBody {
    pub fn send(&self, chunk: &str) {
        // The session may already have stopped reading.
        let _ = self
            .sender
            .unbounded_send(Ok(Bytes::copy_from_slice(chunk.as_bytes())));
    }

    pub fn fail(&self, error: TransportError) {
        let _ = self.sender.unbounded_send(Err(error));
    }

    /// End the body cleanly
    pub fn close(self) {
        self.sender.close_channel();
    }
}

/// Store whose every call fails
pub struct FailingStore;

#[async_trait]
impl ResponseStore for FailingStore {
    async fn save(&self, _request: SaveRequest) -> PersistenceResult<SavedResponse> {
        Err(PersistenceError::Network("store offline".to_string()))
    }

    async fn list_for_user(&self, _user_id: &str) -> PersistenceResult<Vec<SavedResponse>> {
        Err(PersistenceError::Network("store offline".to_string()))
    }

    async fn get(&self, id: &str) -> PersistenceResult<SavedResponse> {
        Err(PersistenceError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> PersistenceResult<()> {
        Err(PersistenceError::NotFound(id.to_string()))
    }
}

/// Receive events until one matches, failing the test after a few seconds
pub async fn wait_for<F>(events: &mut UnboundedReceiver<SessionEvent>, mut matches: F) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    let found = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = events.recv().await {
            if matches(&event) {
                return Some(event);
            }
        }
        None
    })
    .await;

    match found {
        Ok(Some(event)) => event,
        Ok(None) => panic!("session dropped its observer"),
        Err(_) => panic!("timed out waiting for session event"),
    }
}

/// Drain every event already delivered
pub fn drain(events: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

/// Build one NDJSON content line
pub fn content_line(text: &str) -> String {
    format!("{}\n", serde_json::json!({ "content": text }))
}
