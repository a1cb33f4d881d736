//! Integration tests for configuration loading and validation

use std::fs;
use std::path::PathBuf;
use studyhall_core::config::{
    load, load_from_json, load_from_yaml, ConfigError, DecodePolicy, ValidationErrorKind,
};
use tempfile::TempDir;

/// Helper to create a test config file
fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_valid_yaml_config() {
    std::env::set_var("STUDYHALL_IT_TOKEN", "token-from-env");

    let yaml = r#"
version: "0.1"
answering:
  base_url: https://rag.example.edu
  chat_path: /chat
session:
  answer_timeout_ms: 60000
  decode_policy: strict
persistence:
  base_url: https://app.example.edu
  auth_token: ${STUDYHALL_IT_TOKEN}
metadata:
  course: CS101
"#;

    let temp_dir = TempDir::new().unwrap();
    let path = create_test_file(&temp_dir, "studyhall.yaml", yaml);

    let config = load_from_yaml(&path).unwrap();
    assert_eq!(config.answering.base_url, "https://rag.example.edu");
    assert_eq!(config.session.decode_policy, DecodePolicy::Strict);
    assert_eq!(
        config.session.answer_timeout(),
        Some(std::time::Duration::from_secs(60))
    );
    let persistence = config.persistence.unwrap();
    assert_eq!(
        persistence.auth_token.unwrap().expose_secret(),
        "token-from-env"
    );
    assert_eq!(config.metadata["course"], "CS101");

    std::env::remove_var("STUDYHALL_IT_TOKEN");
}

#[test]
fn test_load_valid_json_config() {
    let json = r#"{
  "version": "0.1",
  "answering": { "base_url": "http://localhost:8000" },
  "session": { "greeting": null }
}"#;

    let temp_dir = TempDir::new().unwrap();
    let path = create_test_file(&temp_dir, "studyhall.json", json);

    let config = load_from_json(&path).unwrap();
    assert!(config.session.greeting.is_none());

    // extension-based dispatch picks the same loader
    let config = load(&path).unwrap();
    assert_eq!(config.answering.chat_path, "/chat");
}

#[test]
fn test_missing_env_var() {
    let yaml = r#"
version: "0.1"
answering:
  base_url: ${STUDYHALL_IT_UNSET_URL}
"#;

    let temp_dir = TempDir::new().unwrap();
    let path = create_test_file(&temp_dir, "studyhall.yaml", yaml);

    match load_from_yaml(&path) {
        Err(ConfigError::EnvVarNotFound { var }) => assert_eq!(var, "STUDYHALL_IT_UNSET_URL"),
        other => panic!("Expected EnvVarNotFound, got {:?}", other),
    }
}

#[test]
fn test_invalid_url() {
    let yaml = r#"
version: "0.1"
answering:
  base_url: not-a-url
"#;

    let temp_dir = TempDir::new().unwrap();
    let path = create_test_file(&temp_dir, "studyhall.yaml", yaml);

    match load_from_yaml(&path) {
        Err(ConfigError::ValidationError(err)) => {
            assert_eq!(err.field_path, "answering.base_url");
            assert!(matches!(err.kind, ValidationErrorKind::InvalidUrl { .. }));
        }
        other => panic!("Expected ValidationError, got {:?}", other),
    }
}

#[test]
fn test_wrong_version() {
    let yaml = r#"
version: "1.0"
answering:
  base_url: http://localhost:8000
"#;

    let temp_dir = TempDir::new().unwrap();
    let path = create_test_file(&temp_dir, "studyhall.yaml", yaml);

    match load_from_yaml(&path) {
        Err(ConfigError::ValidationError(err)) => {
            assert_eq!(err.field_path, "version");
            assert_eq!(
                err.kind,
                ValidationErrorKind::InvalidVersion {
                    expected: "0.1".to_string(),
                    actual: "1.0".to_string(),
                }
            );
        }
        other => panic!("Expected ValidationError, got {:?}", other),
    }
}

#[test]
fn test_unknown_field() {
    let yaml = r#"
version: "0.1"
answering:
  base_url: http://localhost:8000
session:
  max_retries: 3
"#;

    let temp_dir = TempDir::new().unwrap();
    let path = create_test_file(&temp_dir, "studyhall.yaml", yaml);

    match load_from_yaml(&path) {
        Err(ConfigError::ParseError { message, .. }) => assert!(message.contains("max_retries")),
        other => panic!("Expected ParseError, got {:?}", other),
    }
}

#[test]
fn test_blank_greeting_rejected() {
    let yaml = r#"
version: "0.1"
answering:
  base_url: http://localhost:8000
session:
  greeting: "   "
"#;

    let temp_dir = TempDir::new().unwrap();
    let path = create_test_file(&temp_dir, "studyhall.yaml", yaml);

    match load_from_yaml(&path) {
        Err(ConfigError::ValidationError(err)) => assert_eq!(err.field_path, "session.greeting"),
        other => panic!("Expected ValidationError, got {:?}", other),
    }
}

#[test]
fn test_missing_file() {
    let result = load_from_yaml("/nonexistent/studyhall.yaml");
    assert!(matches!(result, Err(ConfigError::IoError { .. })));
}
