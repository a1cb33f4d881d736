//! In-memory response store

use super::{PersistenceError, PersistenceResult, ResponseStore, SaveRequest, SavedResponse};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Keeps saved responses in process memory
#[derive(Debug, Default)]
pub struct MemoryResponseStore {
    /// Records in insertion order
    records: RwLock<Vec<SavedResponse>>,
}

impl MemoryResponseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ResponseStore for MemoryResponseStore {
    async fn save(&self, request: SaveRequest) -> PersistenceResult<SavedResponse> {
        let saved = SavedResponse {
            id: Uuid::new_v4().to_string(),
            content: request.content,
            user_id: request.user_id,
            subject_id: request.subject_id,
            created_at: Utc::now(),
        };
        self.records.write().await.push(saved.clone());
        Ok(saved)
    }

    async fn list_for_user(&self, user_id: &str) -> PersistenceResult<Vec<SavedResponse>> {
        let records = self.records.read().await;
        // Later inserts win ties on created_at.
        let mut owned: Vec<SavedResponse> = records
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn get(&self, id: &str) -> PersistenceResult<SavedResponse> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> PersistenceResult<()> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(PersistenceError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_get_delete() {
        let store = MemoryResponseStore::new();
        let saved = store
            .save(SaveRequest::new("Photosynthesis is...", "u1", "BIO1"))
            .await
            .unwrap();

        assert_eq!(store.get(&saved.id).await.unwrap(), saved);
        store.delete(&saved.id).await.unwrap();
        assert_eq!(
            store.get(&saved.id).await,
            Err(PersistenceError::NotFound(saved.id.clone()))
        );
        assert!(store.delete(&saved.id).await.is_err());
    }

    #[tokio::test]
    async fn test_list_is_per_user_newest_first() {
        let store = MemoryResponseStore::new();
        let first = store.save(SaveRequest::new("one", "u1", "S")).await.unwrap();
        store.save(SaveRequest::new("other", "u2", "S")).await.unwrap();
        let second = store.save(SaveRequest::new("two", "u1", "S")).await.unwrap();

        let listed = store.list_for_user("u1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
        assert_eq!(store.len().await, 3);
    }
}
