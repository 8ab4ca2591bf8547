//! Token service configuration.
//!
//! Configuration for the token lifecycle core: the issuer identity and
//! the lifetimes applied to stored records and issued claim sets.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the token service.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// issuer = "https://id.example.com"
///
/// [auth.oauth]
/// token_ttl = "1h"
/// id_token_lifetime = "30m"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Server issuer URL (used in the `iss` claim).
    pub issuer: String,

    /// OAuth 2.0 configuration.
    pub oauth: OAuthConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            oauth: OAuthConfig::default(),
        }
    }
}

/// OAuth 2.0 token lifetime configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// How long stored authorization codes and access tokens live before
    /// the expiration sweep removes them. A record that outlives its TTL
    /// but has not been swept yet is still considered valid until swept.
    #[serde(with = "humantime_serde")]
    pub token_ttl: Duration,

    /// Validity window stamped into issued ID token claim sets
    /// (`exp` − `iat`).
    #[serde(with = "humantime_serde")]
    pub id_token_lifetime: Duration,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            token_ttl: Duration::from_secs(3600),          // 1 hour
            id_token_lifetime: Duration::from_secs(1800),  // 30 minutes
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the issuer is empty or any
    /// lifetime is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::InvalidValue(
                "issuer cannot be empty".to_string(),
            ));
        }

        if self.oauth.token_ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "token_ttl must be > 0".to_string(),
            ));
        }

        if self.oauth.id_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "id_token_lifetime must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
