//! Configuration module for Studyhall
//!
//! This module provides the configuration schema, environment variable
//! interpolation and validation for chat sessions, the answering service
//! connection and the saved-response API.

mod env;
mod error;
mod schema;
mod secrets;
mod validator;

pub use env::referenced_env_vars;
pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{
    AnsweringConfig, DecodePolicy, PersistenceConfig, SessionSettings, StudyhallConfig,
    CONFIG_VERSION, DEFAULT_FALLBACK_MESSAGE, DEFAULT_GREETING,
};
pub use secrets::SecretString;
pub use validator::ConfigValidator;

use std::fs;
use std::path::Path;

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<StudyhallConfig> {
    let path = path.as_ref();
    let content = read_interpolated(path)?;

    let config: StudyhallConfig =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: e.location().map(|l| l.line()),
            column: e.location().map(|l| l.column()),
            message: e.to_string(),
        })?;

    ConfigValidator::new().validate(&config)?;
    Ok(config)
}

/// Load a configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<StudyhallConfig> {
    let path = path.as_ref();
    let content = read_interpolated(path)?;

    let config: StudyhallConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: Some(e.line()),
            column: Some(e.column()),
            message: e.to_string(),
        })?;

    ConfigValidator::new().validate(&config)?;
    Ok(config)
}

/// Load a configuration, choosing the format from the file extension
pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<StudyhallConfig> {
    let path = path.as_ref();
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => load_from_json(path),
        _ => load_from_yaml(path),
    }
}

fn read_interpolated(path: &Path) -> ConfigResult<String> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    env::interpolate_env_vars(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_yaml() {
        let yaml = r#"
version: "0.1"
answering:
  base_url: http://localhost:8000
  chat_path: /chat
  connect_timeout_ms: 5000
session:
  greeting: "Ask me about the syllabus"
  answer_timeout_ms: 120000
  decode_policy: tolerant
  max_line_bytes: 65536
persistence:
  base_url: http://localhost:3000
  auth_token: some-session-token
"#;
        let config: StudyhallConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.session.max_line_bytes, 65536);
        let persistence = config.persistence.unwrap();
        assert_eq!(
            persistence.auth_token.unwrap().expose_secret(),
            "some-session-token"
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
version: "0.1"
answering:
  base_url: http://localhost:8000
  retries: 3
"#;
        let config: Result<StudyhallConfig, _> = serde_yaml::from_str(yaml);
        assert!(config.is_err());
    }
}
