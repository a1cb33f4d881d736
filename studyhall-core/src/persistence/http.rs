//! Response store backed by the web application's `/api/responses` routes

use super::{PersistenceError, PersistenceResult, ResponseStore, SaveRequest, SavedResponse};
use crate::config::{PersistenceConfig, SecretString};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

const USER_AGENT: &str = concat!("studyhall/", env!("CARGO_PKG_VERSION"));

/// HTTP client for saved responses
#[derive(Clone)]
pub struct HttpResponseStore {
    client: Client,
    base_url: Url,
    auth_token: Option<SecretString>,
}

impl HttpResponseStore {
    /// Create a store for `base_url` without authentication
    pub fn new(base_url: &str) -> PersistenceResult<Self> {
        Self::with_config(&PersistenceConfig {
            base_url: base_url.to_string(),
            auth_token: None,
        })
    }

    /// Create a store from persistence configuration
    pub fn with_config(config: &PersistenceConfig) -> PersistenceResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| PersistenceError::InvalidEndpoint(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(PersistenceError::InvalidEndpoint(config.base_url.clone()));
        }

        let client = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PersistenceError::Network(format!("Failed to create HTTP client: {}", e)))?;

        if let Some(token) = &config.auth_token {
            debug!("Persistence requests authenticated with token {}", token.partial_redact());
        }

        Ok(Self {
            client,
            base_url,
            auth_token: config.auth_token.clone(),
        })
    }

    /// Build `<base>/api/responses/<segments...>` with each segment escaped
    fn endpoint(&self, segments: &[&str]) -> PersistenceResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PersistenceError::InvalidEndpoint(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "responses"])
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> (RequestBuilder, Uuid) {
        let request_id = Uuid::new_v4();
        let mut builder = self
            .client
            .request(method, url)
            .header("X-Request-ID", request_id.to_string());
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        (builder, request_id)
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        request_id: Uuid,
        missing_id: Option<&str>,
    ) -> PersistenceResult<Response> {
        let response = builder.send().await.map_err(|e| {
            warn!("Persistence request failed [request_id: {}]: {}", request_id, e);
            PersistenceError::Network(format!("{} [request_id: {}]", e, request_id))
        })?;

        let status = response.status();
        debug!("Persistence response status: {} [request_id: {}]", status, request_id);
        if status.is_success() {
            return Ok(response);
        }

        match (status, missing_id) {
            (StatusCode::UNAUTHORIZED, _) => Err(PersistenceError::Unauthorized),
            (StatusCode::NOT_FOUND, Some(id)) => Err(PersistenceError::NotFound(id.to_string())),
            _ => {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<Value>(&body)
                    .ok()
                    .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                    .unwrap_or(body);
                Err(PersistenceError::Status {
                    status: status.as_u16(),
                    message: format!("{} [request_id: {}]", message, request_id),
                })
            }
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> PersistenceResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| PersistenceError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ResponseStore for HttpResponseStore {
    async fn save(&self, request: SaveRequest) -> PersistenceResult<SavedResponse> {
        let url = self.endpoint(&["save"])?;
        let (builder, request_id) = self.request(Method::POST, url);
        let response = self.send(builder.json(&request), request_id, None).await?;
        let saved: SavedResponse = Self::decode(response).await?;
        info!(
            "Saved response {} for subject {} [request_id: {}]",
            saved.id, saved.subject_id, request_id
        );
        Ok(saved)
    }

    async fn list_for_user(&self, user_id: &str) -> PersistenceResult<Vec<SavedResponse>> {
        let url = self.endpoint(&[])?;
        let (builder, request_id) = self.request(Method::GET, url);
        let builder = builder.query(&[("userId", user_id)]);
        let response = self.send(builder, request_id, None).await?;
        Self::decode(response).await
    }

    async fn get(&self, id: &str) -> PersistenceResult<SavedResponse> {
        let url = self.endpoint(&[id])?;
        let (builder, request_id) = self.request(Method::GET, url);
        let response = self.send(builder, request_id, Some(id)).await?;
        Self::decode(response).await
    }

    async fn delete(&self, id: &str) -> PersistenceResult<()> {
        let url = self.endpoint(&[id])?;
        let (builder, request_id) = self.request(Method::DELETE, url);
        self.send(builder, request_id, Some(id)).await?;
        info!("Deleted saved response {} [request_id: {}]", id, request_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_building() {
        let store = HttpResponseStore::new("http://localhost:3000").unwrap();
        assert_eq!(
            store.endpoint(&["save"]).unwrap().as_str(),
            "http://localhost:3000/api/responses/save"
        );
        assert_eq!(
            store.endpoint(&[]).unwrap().as_str(),
            "http://localhost:3000/api/responses"
        );
    }

    #[test]
    fn test_endpoint_escapes_ids_and_keeps_prefix() {
        let store = HttpResponseStore::new("https://app.example.edu/studyhall/").unwrap();
        assert_eq!(
            store.endpoint(&["a/b"]).unwrap().as_str(),
            "https://app.example.edu/studyhall/api/responses/a%2Fb"
        );
    }

    #[test]
    fn test_rejects_non_base_url() {
        assert!(matches!(
            HttpResponseStore::new("mailto:someone@example.edu"),
            Err(PersistenceError::InvalidEndpoint(_))
        ));
    }
}
