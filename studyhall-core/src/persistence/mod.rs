//! Saved-response persistence
//!
//! Completed answers can be saved on explicit user request. The store is an
//! external service; this module defines its contract and two clients: one
//! speaking the web application's `/api/responses` routes and one kept in
//! memory for tests and offline demos.

pub mod http;
pub mod memory;

pub use self::http::HttpResponseStore;
pub use memory::MemoryResponseStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body of a save request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    /// Answer text to keep
    pub content: String,

    /// Owner of the saved response
    pub user_id: String,

    /// Subject the answer was given for
    pub subject_id: String,
}

impl SaveRequest {
    pub fn new(
        content: impl Into<String>,
        user_id: impl Into<String>,
        subject_id: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            user_id: user_id.into(),
            subject_id: subject_id.into(),
        }
    }
}

/// A persisted answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedResponse {
    /// Persisted-response identifier
    pub id: String,

    pub content: String,

    pub user_id: String,

    pub subject_id: String,

    pub created_at: DateTime<Utc>,
}

/// Errors reported by a response store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("Not authenticated with the persistence service")]
    Unauthorized,

    #[error("Saved response '{0}' not found")]
    NotFound(String),

    #[error("Persistence service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response from persistence service: {0}")]
    Decode(String),

    #[error("Invalid persistence endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Result type for store operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Storage for saved answers
#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Persist an answer and return the stored record
    async fn save(&self, request: SaveRequest) -> PersistenceResult<SavedResponse>;

    /// All responses saved by a user, newest first
    async fn list_for_user(&self, user_id: &str) -> PersistenceResult<Vec<SavedResponse>>;

    /// Fetch one saved response
    async fn get(&self, id: &str) -> PersistenceResult<SavedResponse>;

    /// Delete one saved response
    async fn delete(&self, id: &str) -> PersistenceResult<()>;
}
