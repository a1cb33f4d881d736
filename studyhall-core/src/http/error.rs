//! Transport errors and HTTP error mapping

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while reaching the answering service or reading its body
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Connection failed: {message}")]
    Connect { message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Answering service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Answering service response has no body")]
    MissingBody,

    #[error("Failed to read response body: {message}")]
    Body { message: String },

    #[error("Request failed: {message}")]
    Request { message: String },

    #[error("Invalid endpoint '{url}': {message}")]
    InvalidEndpoint { url: String, message: String },
}

/// Map a non-success status and its body to a `TransportError`
pub fn map_http_error(status: StatusCode, body: Option<String>, request_id: Uuid) -> TransportError {
    if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        return TransportError::Timeout;
    }

    let extracted = body
        .as_deref()
        .and_then(|b| serde_json::from_str::<Value>(b).ok())
        .and_then(|v| extract_error_message(&v));

    let message = extracted
        .or_else(|| body.filter(|b| !b.trim().is_empty()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown status").to_string());

    TransportError::Status {
        status: status.as_u16(),
        message: format!("{} [request_id: {}]", message, request_id),
    }
}

/// Map a failed `send()` to a `TransportError`
pub fn map_send_error(err: reqwest::Error, request_id: Uuid) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect {
            message: format!("{} [request_id: {}]", err, request_id),
        }
    } else {
        TransportError::Request {
            message: format!("{} [request_id: {}]", err, request_id),
        }
    }
}

/// Extract a human-readable message from common error body formats
fn extract_error_message(json: &Value) -> Option<String> {
    // { "error": { "message": "..." } }
    if let Some(message) = json
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|v| v.as_str())
    {
        return Some(message.to_string());
    }

    // { "error": "..." }, as returned by the web application's API routes
    if let Some(error) = json.get("error").and_then(|v| v.as_str()) {
        return Some(error.to_string());
    }

    // { "detail": "..." }, as returned by Python web frameworks
    if let Some(detail) = json.get("detail").and_then(|v| v.as_str()) {
        return Some(detail.to_string());
    }

    json.get("message")
        .and_then(|v| v.as_str())
        .map(|m| m.to_string())
}
