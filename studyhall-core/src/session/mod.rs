//! Streaming chat sessions
//!
//! A `ChatSession` owns the transcript of one chat about one subject and
//! coordinates a single in-flight question at a time:
//!
//! 1. `submit_question` appends the user exchange and an empty assistant
//!    placeholder, then opens the answer stream through an `AnswerTransport`
//! 2. response bytes are framed into lines by `LineDecoder`, decoded into
//!    fragments, and applied in arrival order by `ExchangeMachine`
//! 3. every change is published to the `ExchangeObserver` as it happens
//!
//! Failures never escape `submit_question`; they end the exchange with a
//! visible text and status. Nothing is retried.

pub mod machine;
pub mod observer;

pub use machine::{ExchangeMachine, ExchangeUpdate, FailureKind, Outcome, SessionState};
pub use observer::{ChannelObserver, ExchangeObserver, NoopObserver, SessionEvent};

use crate::config::{DecodePolicy, SessionSettings};
use crate::http::AnswerTransport;
use crate::persistence::{PersistenceError, ResponseStore, SaveRequest, SavedResponse};
use crate::protocol::codec::{decode_line, DecodeError, LineDecoder};
use crate::protocol::types::{AskRequest, Exchange, ExchangeId, ExchangeStatus, StreamFragment};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why a question was not accepted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error("an answer is already in flight")]
    Busy,
}

/// Why an exchange could not be saved
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaveError {
    #[error("exchange {0} does not exist")]
    NotFound(ExchangeId),

    #[error("exchange {0} is not an answer")]
    NotAssistant(ExchangeId),

    #[error("exchange {id} is {status:?}, only complete answers can be saved")]
    NotComplete { id: ExchangeId, status: ExchangeStatus },

    #[error(transparent)]
    Store(#[from] PersistenceError),
}

/// Final state of an accepted question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOutcome {
    /// The assistant exchange holding the answer
    pub exchange_id: ExchangeId,

    pub status: ExchangeStatus,

    /// Answer text as last published
    pub text: String,

    /// Set when the exchange did not complete
    pub failure: Option<FailureKind>,

    /// Stream lines dropped because they did not decode
    pub malformed_lines: usize,
}

#[derive(Default)]
struct SessionInner {
    transcript: Vec<Exchange>,
    machine: Option<ExchangeMachine>,
    cancel: Option<CancellationToken>,
    /// Outcomes of finalized exchanges not yet returned to their caller
    settled: HashMap<ExchangeId, ExchangeOutcome>,
    last_id: u64,
}

impl SessionInner {
    fn allocate_id(&mut self) -> ExchangeId {
        self.last_id += 1;
        ExchangeId::new(self.last_id)
    }

    fn state(&self) -> SessionState {
        self.machine
            .as_ref()
            .map(|m| m.state())
            .unwrap_or(SessionState::Idle)
    }

    fn append(&mut self, exchange: Exchange, observer: &dyn ExchangeObserver) {
        observer.on_exchange_appended(&exchange);
        self.transcript.push(exchange);
    }

    fn publish(&mut self, update: ExchangeUpdate, observer: &dyn ExchangeObserver) {
        if let Some(exchange) = self.transcript.iter_mut().rev().find(|e| e.id == update.id) {
            exchange.text.clone_from(&update.text);
            exchange.status = update.status;
        }
        observer.on_exchange_updated(update.id, &update.text, update.status);

        if update.status.is_terminal() {
            if let Some(machine) = &self.machine {
                self.settled.insert(
                    update.id,
                    ExchangeOutcome {
                        exchange_id: update.id,
                        status: update.status,
                        text: update.text,
                        failure: machine.failure(),
                        malformed_lines: machine.malformed_lines(),
                    },
                );
            }
            self.cancel = None;
        }
    }
}

/// Cancels an accepted answer whose `submit_question` future is dropped
/// before it returns
struct PendingAnswer<'a> {
    session: &'a ChatSession,
    exchange_id: ExchangeId,
    token: CancellationToken,
    armed: bool,
}

impl PendingAnswer<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingAnswer<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("Answer {} abandoned by its caller, cancelling", self.exchange_id);
        self.token.cancel();
        self.session.step(self.exchange_id, |m| m.cancel());
        self.session.lock().settled.remove(&self.exchange_id);
    }
}

/// Builder for `ChatSession`
pub struct ChatSessionBuilder {
    subject_id: String,
    transport: Arc<dyn AnswerTransport>,
    observer: Arc<dyn ExchangeObserver>,
    settings: SessionSettings,
}

impl ChatSessionBuilder {
    /// Receive transcript changes
    pub fn observer(mut self, observer: Arc<dyn ExchangeObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Create the session, seeding the greeting if one is configured
    pub fn build(self) -> ChatSession {
        let mut inner = SessionInner::default();
        if let Some(greeting) = &self.settings.greeting {
            let id = inner.allocate_id();
            inner.append(Exchange::assistant(id, greeting.clone()), self.observer.as_ref());
        }

        ChatSession {
            subject_id: self.subject_id,
            transport: self.transport,
            observer: self.observer,
            settings: self.settings,
            inner: Mutex::new(inner),
        }
    }
}

/// A chat about one subject, answering one question at a time
pub struct ChatSession {
    subject_id: String,
    transport: Arc<dyn AnswerTransport>,
    observer: Arc<dyn ExchangeObserver>,
    settings: SessionSettings,
    inner: Mutex<SessionInner>,
}

impl ChatSession {
    /// Start building a session for a subject
    pub fn builder(
        subject_id: impl Into<String>,
        transport: Arc<dyn AnswerTransport>,
    ) -> ChatSessionBuilder {
        ChatSessionBuilder {
            subject_id: subject_id.into(),
            transport,
            observer: Arc::new(NoopObserver),
            settings: SessionSettings::default(),
        }
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn state(&self) -> SessionState {
        self.lock().state()
    }

    /// Whether a question is in flight; the UI disables input while true
    pub fn is_busy(&self) -> bool {
        self.state().is_in_flight()
    }

    /// Snapshot of the transcript in order
    pub fn exchanges(&self) -> Vec<Exchange> {
        self.lock().transcript.clone()
    }

    pub fn exchange(&self, id: ExchangeId) -> Option<Exchange> {
        self.lock().transcript.iter().find(|e| e.id == id).cloned()
    }

    /// Ask a question and stream its answer into the transcript
    ///
    /// Returns once the answer has reached a terminal state. Transport and
    /// service failures are reported through the returned outcome, never as
    /// an error; `Err` means the question was not accepted at all.
    ///
    /// Dropping the returned future cancels the answer the same way `abort`
    /// does, so the session is free for the next question.
    pub async fn submit_question(&self, question: &str) -> Result<ExchangeOutcome, SubmitError> {
        if question.trim().is_empty() {
            return Err(SubmitError::EmptyQuestion);
        }

        let (exchange_id, token) = {
            let mut inner = self.lock();
            if inner.state().is_in_flight() {
                warn!("Rejecting question for subject {}: answer in flight", self.subject_id);
                return Err(SubmitError::Busy);
            }

            let user_id = inner.allocate_id();
            inner.append(Exchange::user(user_id, question), self.observer.as_ref());

            let exchange_id = inner.allocate_id();
            inner.append(
                Exchange::assistant_placeholder(exchange_id),
                self.observer.as_ref(),
            );
            inner.machine = Some(ExchangeMachine::new(
                exchange_id,
                self.settings.fallback_message.clone(),
            ));

            let token = CancellationToken::new();
            inner.cancel = Some(token.clone());
            (exchange_id, token)
        };

        let mut pending = PendingAnswer {
            session: self,
            exchange_id,
            token: token.clone(),
            armed: true,
        };

        info!(
            "Question submitted for subject {} (exchange {})",
            self.subject_id, exchange_id
        );

        let request = AskRequest::new(question, self.subject_id.clone());
        let stream = self.stream_answer(exchange_id, &request, &token);

        match self.settings.answer_timeout() {
            Some(limit) => {
                if tokio::time::timeout(limit, stream).await.is_err() {
                    warn!("Answer {} timed out after {:?}", exchange_id, limit);
                    self.step(exchange_id, |m| m.fail(FailureKind::Timeout));
                }
            }
            None => stream.await,
        }

        pending.disarm();
        Ok(self.take_outcome(exchange_id))
    }

    /// Abort the in-flight answer
    ///
    /// The answer keeps the text it had when aborted and ends `Cancelled`;
    /// nothing read afterwards is applied. Returns false when no answer was
    /// in flight.
    pub fn abort(&self) -> bool {
        let mut inner = self.lock();
        let Some(update) = inner.machine.as_mut().and_then(|m| m.cancel()) else {
            return false;
        };
        if let Some(token) = inner.cancel.take() {
            token.cancel();
        }
        info!("Answer {} cancelled", update.id);
        inner.publish(update, self.observer.as_ref());
        true
    }

    /// Save a completed answer to a response store
    ///
    /// Save failures are returned to the caller and never change the
    /// exchange.
    pub async fn save_exchange(
        &self,
        id: ExchangeId,
        user_id: &str,
        store: &dyn ResponseStore,
    ) -> Result<SavedResponse, SaveError> {
        let content = {
            let inner = self.lock();
            let exchange = inner
                .transcript
                .iter()
                .find(|e| e.id == id)
                .ok_or(SaveError::NotFound(id))?;
            if !exchange.is_assistant() {
                return Err(SaveError::NotAssistant(id));
            }
            if exchange.status != ExchangeStatus::Complete {
                return Err(SaveError::NotComplete {
                    id,
                    status: exchange.status,
                });
            }
            exchange.text.clone()
        };

        let request = SaveRequest::new(content, user_id, self.subject_id.clone());
        store.save(request).await.map_err(|e| {
            warn!("Saving exchange {} failed: {}", id, e);
            SaveError::Store(e)
        })
    }

    async fn stream_answer(
        &self,
        id: ExchangeId,
        request: &AskRequest,
        token: &CancellationToken,
    ) {
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            opened = self.transport.open(request) => opened,
        };

        let mut body = match opened {
            Ok(body) => body,
            Err(err) => {
                warn!("Answer {} failed before streaming: {}", id, err);
                self.step(id, |m| m.fail(FailureKind::from(&err)));
                return;
            }
        };

        if !self.step(id, |m| m.body_opened()) {
            return;
        }

        let mut decoder = LineDecoder::new(self.settings.max_line_bytes);
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                next = body.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    for line in decoder.push(&chunk) {
                        if !self.handle_line(id, line) {
                            return;
                        }
                    }
                }
                Some(Err(err)) => {
                    warn!("Answer {} stream broke: {}", id, err);
                    self.step(id, |m| m.fail(FailureKind::NetworkFailure));
                    return;
                }
                None => {
                    if let Some(line) = decoder.finish() {
                        if !self.handle_line(id, line) {
                            return;
                        }
                    }
                    self.step(id, |m| m.apply(StreamFragment::EndOfStream));
                    debug!("Answer {} stream closed", id);
                    return;
                }
            }
        }
    }

    /// Decode and apply one line; returns whether the answer is still streaming
    fn handle_line(&self, id: ExchangeId, line: Result<String, DecodeError>) -> bool {
        match line.and_then(|l| decode_line(&l)) {
            Ok(Some(fragment)) => self.step(id, |m| m.apply(fragment)),
            Ok(None) => self.step(id, |_| None),
            Err(err) => {
                warn!("Dropping malformed line in answer {}: {}", id, err);
                let strict = self.settings.decode_policy == DecodePolicy::Strict;
                self.step(id, |m| m.malformed_line(strict))
            }
        }
    }

    /// Run one state machine step for exchange `id` and publish its update
    ///
    /// Returns whether the exchange is still in flight afterwards.
    fn step<F>(&self, id: ExchangeId, f: F) -> bool
    where
        F: FnOnce(&mut ExchangeMachine) -> Option<ExchangeUpdate>,
    {
        let mut inner = self.lock();
        let Some(machine) = inner.machine.as_mut().filter(|m| m.exchange_id() == id) else {
            return false;
        };
        let update = f(machine);
        let in_flight = machine.state().is_in_flight();
        if let Some(update) = update {
            inner.publish(update, self.observer.as_ref());
        }
        in_flight
    }

    fn take_outcome(&self, id: ExchangeId) -> ExchangeOutcome {
        let mut inner = self.lock();
        if let Some(outcome) = inner.settled.remove(&id) {
            return outcome;
        }

        // Only reachable if the exchange never settled; report what the
        // transcript holds.
        let (text, status) = inner
            .transcript
            .iter()
            .find(|e| e.id == id)
            .map(|e| (e.text.clone(), e.status))
            .unwrap_or((String::new(), ExchangeStatus::Pending));
        ExchangeOutcome {
            exchange_id: id,
            status,
            text,
            failure: None,
            malformed_lines: 0,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
