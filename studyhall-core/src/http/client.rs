//! HTTP client implementation using reqwest

use crate::config::AnsweringConfig;
use crate::http::error::{map_http_error, map_send_error};
use crate::http::{AnswerTransport, ByteStream, TransportError};
use crate::protocol::types::AskRequest;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Client, ClientBuilder, StatusCode};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

/// Default user agent
const USER_AGENT: &str = concat!("studyhall/", env!("CARGO_PKG_VERSION"));

/// Most bytes of an error body kept for the error message
const ERROR_BODY_LIMIT: usize = 4 * 1024;

/// How long to wait for an error body before giving up on it
const ERROR_BODY_WAIT: Duration = Duration::from_secs(5);

/// Streams answers from the answering service over HTTP
///
/// The client sets a connect timeout but no overall request timeout: an
/// answer streams for as long as the service keeps writing, and the session
/// applies its own deadline when one is configured.
#[derive(Clone)]
pub struct HttpAnswerClient {
    /// The underlying reqwest client (internally reference counted)
    client: Client,

    /// Full URL of the chat endpoint
    chat_url: Url,
}

impl HttpAnswerClient {
    /// Create a client for `base_url` with default settings
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        Self::with_config(&AnsweringConfig::new(base_url))
    }

    /// Create a client from answering service configuration
    pub fn with_config(config: &AnsweringConfig) -> Result<Self, TransportError> {
        let chat_url = join_endpoint(&config.base_url, &config.chat_path)?;

        let client = ClientBuilder::new()
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(config.connect_timeout())
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| TransportError::Request {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, chat_url })
    }

    pub fn chat_url(&self) -> &str {
        self.chat_url.as_str()
    }
}

fn join_endpoint(base_url: &str, path: &str) -> Result<Url, TransportError> {
    let joined = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| TransportError::InvalidEndpoint {
        url: joined.clone(),
        message: e.to_string(),
    })
}

/// Read at most `limit` bytes of an error body, waiting no longer than `wait`
///
/// Whatever arrived before the deadline or a read error is kept.
async fn read_error_body<S, E>(body: S, limit: usize, wait: Duration) -> Option<String>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    let mut body = std::pin::pin!(body);
    let deadline = tokio::time::Instant::now() + wait;
    let mut collected = Vec::new();

    while collected.len() < limit {
        match tokio::time::timeout_at(deadline, body.next()).await {
            Ok(Some(Ok(chunk))) => collected.extend_from_slice(&chunk),
            Ok(Some(Err(_))) | Ok(None) => break,
            Err(_) => {
                debug!("Gave up waiting for error body after {:?}", wait);
                break;
            }
        }
    }

    collected.truncate(limit);
    if collected.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(&collected).into_owned())
}

#[async_trait]
impl AnswerTransport for HttpAnswerClient {
    async fn open(&self, request: &AskRequest) -> Result<ByteStream, TransportError> {
        let request_id = Uuid::new_v4();

        info!(
            "Sending question for subject {} [request_id: {}]",
            request.subject_id, request_id
        );
        debug!("Request URL: {}", self.chat_url);

        let response = self
            .client
            .post(self.chat_url.clone())
            .header("X-Request-ID", request_id.to_string())
            .header(ACCEPT, "application/x-ndjson, application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!("Request error [request_id: {}]: {}", request_id, e);
                map_send_error(e, request_id)
            })?;

        let status = response.status();
        debug!("Response status: {} [request_id: {}]", status, request_id);

        if !status.is_success() {
            let body =
                read_error_body(response.bytes_stream(), ERROR_BODY_LIMIT, ERROR_BODY_WAIT).await;
            warn!(
                "Answering service failed with status {} [request_id: {}]",
                status, request_id
            );
            return Err(map_http_error(status, body, request_id));
        }

        if status == StatusCode::NO_CONTENT {
            warn!("Answering service sent no body [request_id: {}]", request_id);
            return Err(TransportError::MissingBody);
        }

        let body = response.bytes_stream().map_err(move |e| {
            error!("Body read failed [request_id: {}]: {}", request_id, e);
            TransportError::Body {
                message: format!("{} [request_id: {}]", e, request_id),
            }
        });

        Ok(body.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joining() {
        let client = HttpAnswerClient::new("http://localhost:8000/").unwrap();
        assert_eq!(client.chat_url(), "http://localhost:8000/chat");

        let mut config = AnsweringConfig::new("https://rag.example.edu/api");
        config.chat_path = "/v2/chat".to_string();
        let client = HttpAnswerClient::with_config(&config).unwrap();
        assert_eq!(client.chat_url(), "https://rag.example.edu/api/v2/chat");
    }

    #[tokio::test]
    async fn test_error_body_read_is_capped() {
        let chunks = vec![
            Ok::<_, std::io::Error>(Bytes::from(vec![b'x'; 3000])),
            Ok(Bytes::from(vec![b'y'; 3000])),
            Ok(Bytes::from(vec![b'z'; 3000])),
        ];
        let body = read_error_body(futures::stream::iter(chunks), 4096, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(body.len(), 4096);
        assert!(body.starts_with("xxx"));
        assert!(body.ends_with("yyy"));
    }

    #[tokio::test]
    async fn test_error_body_read_stops_at_deadline() {
        let open_ended = futures::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(
            br#"{"detail":"overloaded"}"#,
        ))])
        .chain(futures::stream::pending());

        let body = read_error_body(open_ended, 4096, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(body, r#"{"detail":"overloaded"}"#);
    }

    #[tokio::test]
    async fn test_empty_error_body() {
        let empty = futures::stream::iter(Vec::<Result<Bytes, std::io::Error>>::new());
        assert!(read_error_body(empty, 4096, Duration::from_secs(1)).await.is_none());
    }

    #[test]
    fn test_invalid_base_url() {
        let result = HttpAnswerClient::new("not a url");
        assert!(matches!(
            result,
            Err(TransportError::InvalidEndpoint { .. })
        ));
    }
}
