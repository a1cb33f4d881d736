//! Configuration validation utilities

use super::error::ValidationError;
use super::schema::StudyhallConfig;
use tracing::warn;

/// Configuration validator with rules that span several sections
#[derive(Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a configuration with extended rules
    pub fn validate(&self, config: &StudyhallConfig) -> Result<(), ValidationError> {
        config.validate()?;

        self.validate_greeting(config)?;
        self.check_token_transport(config);

        Ok(())
    }

    /// A greeting that is present must have visible text; `null` disables it
    fn validate_greeting(&self, config: &StudyhallConfig) -> Result<(), ValidationError> {
        match &config.session.greeting {
            Some(greeting) if greeting.trim().is_empty() => Err(ValidationError::invalid_format(
                "session.greeting",
                "Greeting is blank",
            )
            .with_context("Use null to start sessions without a greeting")),
            _ => Ok(()),
        }
    }

    /// Warn when a bearer token would travel over plain HTTP to a remote host
    fn check_token_transport(&self, config: &StudyhallConfig) {
        let Some(persistence) = &config.persistence else {
            return;
        };
        if persistence.auth_token.is_none() {
            return;
        }
        if let Ok(url) = url::Url::parse(&persistence.base_url) {
            if url.scheme() == "http" && !is_loopback(&url) {
                warn!(
                    "persistence.auth_token will be sent unencrypted to {}",
                    persistence.base_url
                );
            }
        }
    }
}

fn is_loopback(url: &url::Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain == "localhost",
        Some(url::Host::Ipv4(addr)) => addr.is_loopback(),
        Some(url::Host::Ipv6(addr)) => addr.is_loopback(),
        None => false,
    }
}
