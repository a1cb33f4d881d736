//! Configuration schema structures with serde support

use super::error::{ValidationError, ValidationErrorKind};
use super::secrets::SecretString;
use crate::protocol::codec::DEFAULT_MAX_LINE_BYTES;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Only supported schema version
pub const CONFIG_VERSION: &str = "0.1";

/// Greeting the chat opens with
pub const DEFAULT_GREETING: &str = "Hello, how can I help you?";

/// Text shown when an answer could not be obtained
pub const DEFAULT_FALLBACK_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

/// Root configuration structure for Studyhall
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StudyhallConfig {
    /// Schema version (required - no default)
    pub version: String,

    /// Answering service connection
    pub answering: AnsweringConfig,

    /// Chat session behaviour
    #[serde(default)]
    pub session: SessionSettings,

    /// Saved-response API; saving is unavailable when absent
    #[serde(default)]
    pub persistence: Option<PersistenceConfig>,

    /// Custom metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Answering service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnsweringConfig {
    /// Base URL of the answering service
    pub base_url: String,

    /// Path of the streaming chat endpoint
    #[serde(default = "default_chat_path")]
    pub chat_path: String,

    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Maximum idle connections per host
    #[serde(default = "default_max_idle")]
    pub max_idle_per_host: usize,
}

impl AnsweringConfig {
    /// Configuration for `base_url` with every other field defaulted
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            chat_path: default_chat_path(),
            connect_timeout_ms: default_connect_timeout(),
            max_idle_per_host: default_max_idle(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// What to do with a stream line that does not decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodePolicy {
    /// Drop the line, count it, keep streaming
    #[default]
    Tolerant,
    /// Fail the exchange with a decode error
    Strict,
}

/// Chat session settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSettings {
    /// Assistant message seeded into every new session
    #[serde(default = "default_greeting")]
    pub greeting: Option<String>,

    /// Text shown for network failures and timeouts
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,

    /// Overall deadline for one answer, in milliseconds
    #[serde(default)]
    pub answer_timeout_ms: Option<u64>,

    /// Handling of malformed stream lines
    #[serde(default)]
    pub decode_policy: DecodePolicy,

    /// Longest stream line accepted, in bytes
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            fallback_message: default_fallback_message(),
            answer_timeout_ms: None,
            decode_policy: DecodePolicy::default(),
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

impl SessionSettings {
    pub fn answer_timeout(&self) -> Option<Duration> {
        self.answer_timeout_ms.map(Duration::from_millis)
    }

    pub fn without_greeting(mut self) -> Self {
        self.greeting = None;
        self
    }

    pub fn with_answer_timeout(mut self, timeout: Duration) -> Self {
        self.answer_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_decode_policy(mut self, policy: DecodePolicy) -> Self {
        self.decode_policy = policy;
        self
    }
}

/// Saved-response API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PersistenceConfig {
    /// Base URL of the web application exposing `/api/responses`
    pub base_url: String,

    /// Bearer token (supports environment variable interpolation)
    #[serde(default)]
    pub auth_token: Option<SecretString>,
}

// Default value functions for serde
fn default_chat_path() -> String { "/chat".to_string() }
fn default_connect_timeout() -> u64 { 10000 }
fn default_max_idle() -> usize { 10 }
fn default_greeting() -> Option<String> { Some(DEFAULT_GREETING.to_string()) }
fn default_fallback_message() -> String { DEFAULT_FALLBACK_MESSAGE.to_string() }
fn default_max_line_bytes() -> usize { DEFAULT_MAX_LINE_BYTES }

impl StudyhallConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version.is_empty() {
            return Err(ValidationError::required("version"));
        }

        if self.version != CONFIG_VERSION {
            return Err(ValidationError::new(
                "version",
                ValidationErrorKind::InvalidVersion {
                    expected: CONFIG_VERSION.to_string(),
                    actual: self.version.clone(),
                },
            ));
        }

        self.answering.validate("answering")?;
        self.session.validate("session")?;

        if let Some(persistence) = &self.persistence {
            persistence.validate("persistence")?;
        }

        Ok(())
    }
}

impl AnsweringConfig {
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        validate_http_url(&format!("{}.base_url", path), &self.base_url)?;

        if !self.chat_path.starts_with('/') {
            return Err(ValidationError::invalid_format(
                format!("{}.chat_path", path),
                "Must start with '/'",
            ));
        }

        if self.connect_timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.connect_timeout_ms", path),
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl SessionSettings {
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.fallback_message.trim().is_empty() {
            return Err(ValidationError::required(format!("{}.fallback_message", path))
                .with_context("Failed answers need visible text"));
        }

        if self.answer_timeout_ms == Some(0) {
            return Err(ValidationError::out_of_range(
                format!("{}.answer_timeout_ms", path),
                "Must be greater than 0 when set",
            ));
        }

        if self.max_line_bytes == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.max_line_bytes", path),
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl PersistenceConfig {
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        validate_http_url(&format!("{}.base_url", path), &self.base_url)?;

        if let Some(token) = &self.auth_token {
            if token.is_empty() {
                return Err(ValidationError::required(format!("{}.auth_token", path))
                    .with_context("Remove the field instead of leaving it empty"));
            }
        }

        Ok(())
    }
}

fn validate_http_url(field_path: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::required(field_path));
    }

    match url::Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        Ok(url) => Err(ValidationError::invalid_url(
            field_path,
            format!("URL scheme must be http or https, got: {}", url.scheme()),
        )),
        Err(e) => Err(ValidationError::invalid_url(field_path, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> StudyhallConfig {
        serde_yaml::from_str(
            r#"
version: "0.1"
answering:
  base_url: http://localhost:8000
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults_fill_in() {
        let config = minimal();
        assert_eq!(config.answering.chat_path, "/chat");
        assert_eq!(config.answering.connect_timeout_ms, 10000);
        assert_eq!(config.session.greeting.as_deref(), Some(DEFAULT_GREETING));
        assert_eq!(config.session.fallback_message, DEFAULT_FALLBACK_MESSAGE);
        assert_eq!(config.session.decode_policy, DecodePolicy::Tolerant);
        assert_eq!(config.session.answer_timeout(), None);
        assert!(config.persistence.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_null_greeting_disables_it() {
        let config: StudyhallConfig = serde_yaml::from_str(
            r#"
version: "0.1"
answering:
  base_url: http://localhost:8000
session:
  greeting: null
  decode_policy: strict
"#,
        )
        .unwrap();
        assert!(config.session.greeting.is_none());
        assert_eq!(config.session.decode_policy, DecodePolicy::Strict);
    }

    #[test]
    fn test_wrong_version_rejected() {
        let mut config = minimal();
        config.version = "2.0".to_string();
        let err = config.validate().unwrap_err();
        assert_eq!(err.field_path, "version");
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let mut config = minimal();
        config.answering.base_url = "ftp://files.example.com".to_string();
        let err = config.validate().unwrap_err();
        assert_eq!(err.field_path, "answering.base_url");
        assert!(matches!(err.kind, ValidationErrorKind::InvalidUrl { .. }));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = minimal();
        config.session.answer_timeout_ms = Some(0);
        let err = config.validate().unwrap_err();
        assert_eq!(err.field_path, "session.answer_timeout_ms");
    }

    #[test]
    fn test_chat_path_needs_leading_slash() {
        let mut config = minimal();
        config.answering.chat_path = "chat".to_string();
        let err = config.validate().unwrap_err();
        assert_eq!(err.field_path, "answering.chat_path");
    }
}
