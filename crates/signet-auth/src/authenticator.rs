//! Authenticator capability interface.
//!
//! The token core does not authenticate users itself; it consumes an
//! [`Authenticator`] capability that resolves a username to user
//! attributes and can mint anonymous guest identities. Implementations
//! typically wrap a user directory, an upstream identity provider, or a
//! database.
//!
//! # Implementation Notes
//!
//! Implementations should:
//!
//! - Wrap any underlying failure in [`AuthError::AuthenticatorFailure`]
//!   so the cause stays available for diagnostics
//! - Return a fresh, globally unique identifier from every
//!   [`Authenticator::next_guest_id`] call
//! - Treat supplemental claims as extension data only; reserved ID token
//!   claims supplied here are dropped by the claims builder

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AuthResult;
use crate::error::AuthError;

/// User attributes resolved by an [`Authenticator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    /// Stable unique identifier for the user (becomes the `sub` claim).
    pub user_id: String,

    /// Email address, if the directory knows one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Whether the email address has been verified.
    #[serde(default)]
    pub email_verified: bool,

    /// Human-friendly display name. May or may not be unique or stable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    /// Extension claims supplied by the directory, merged into claim sets
    /// unless they collide with a reserved claim name.
    #[serde(default)]
    pub supplemental_claims: serde_json::Map<String, serde_json::Value>,
}

impl UserInfo {
    /// Creates user info with the given subject id and no optional fields.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            email_verified: false,
            preferred_username: None,
            supplemental_claims: serde_json::Map::new(),
        }
    }

    /// Sets the email address and its verification status.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>, verified: bool) -> Self {
        self.email = Some(email.into());
        self.email_verified = verified;
        self
    }

    /// Sets the preferred username.
    #[must_use]
    pub fn with_preferred_username(mut self, name: impl Into<String>) -> Self {
        self.preferred_username = Some(name.into());
        self
    }

    /// Adds a supplemental claim.
    #[must_use]
    pub fn with_supplemental_claim(
        mut self,
        name: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        self.supplemental_claims.insert(name.into(), value);
        self
    }
}

/// Capability that resolves usernames to user attributes and mints guest
/// identities.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolves a username to its user attributes.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AuthenticatorFailure`] wrapping the underlying
    /// cause when the lookup fails.
    async fn user_info(&self, username: &str) -> AuthResult<UserInfo>;

    /// Returns `true` if this authenticator can mint guest identities.
    fn supports_guests(&self) -> bool;

    /// Mints a fresh, globally unique guest identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AuthenticatorFailure`] when the identifier
    /// cannot be produced.
    async fn next_guest_id(&self) -> AuthResult<String>;
}

/// In-memory authenticator backed by a static username table.
///
/// Intended for tests and embedded deployments without a user directory.
/// Guest identifiers are UUID-based and unique across calls.
pub struct StaticAuthenticator {
    users: RwLock<HashMap<String, UserInfo>>,
    guests_enabled: bool,
}

impl StaticAuthenticator {
    /// Creates an empty authenticator with guest support enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            guests_enabled: true,
        }
    }

    /// Enables or disables guest identity support.
    #[must_use]
    pub fn with_guests_enabled(mut self, enabled: bool) -> Self {
        self.guests_enabled = enabled;
        self
    }

    /// Registers a user under the given username.
    ///
    /// Replaces any previous registration for the same username.
    pub fn insert_user(&self, username: impl Into<String>, info: UserInfo) {
        self.users
            .write()
            .expect("user table lock poisoned")
            .insert(username.into(), info);
    }
}

impl Default for StaticAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn user_info(&self, username: &str) -> AuthResult<UserInfo> {
        self.users
            .read()
            .expect("user table lock poisoned")
            .get(username)
            .cloned()
            .ok_or_else(|| {
                AuthError::authenticator_failure(format!("no such user: {username}"))
            })
    }

    fn supports_guests(&self) -> bool {
        self.guests_enabled
    }

    async fn next_guest_id(&self) -> AuthResult<String> {
        Ok(format!("guest-{}", Uuid::new_v4()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_user_lookup() {
        let auth = StaticAuthenticator::new();
        auth.insert_user(
            "alice",
            UserInfo::new("u-1001")
                .with_email("alice@example.com", true)
                .with_preferred_username("Alice"),
        );

        let info = auth.user_info("alice").await.unwrap();
        assert_eq!(info.user_id, "u-1001");
        assert_eq!(info.email.as_deref(), Some("alice@example.com"));
        assert!(info.email_verified);
        assert_eq!(info.preferred_username.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_unknown_user_fails_with_cause() {
        let auth = StaticAuthenticator::new();

        let err = auth.user_info("nobody").await.unwrap_err();
        assert!(matches!(err, AuthError::AuthenticatorFailure { .. }));
        assert!(err.to_string().contains("nobody"));
    }

    #[tokio::test]
    async fn test_guest_ids_are_unique() {
        let auth = StaticAuthenticator::new();

        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            let id = auth.next_guest_id().await.unwrap();
            assert!(id.starts_with("guest-"));
            assert!(seen.insert(id), "guest id repeated");
        }
    }

    #[test]
    fn test_guest_support_flag() {
        let auth = StaticAuthenticator::new();
        assert!(auth.supports_guests());

        let auth = StaticAuthenticator::new().with_guests_enabled(false);
        assert!(!auth.supports_guests());
    }

    #[test]
    fn test_user_info_serde_roundtrip() {
        let info = UserInfo::new("u-42")
            .with_email("x@example.com", false)
            .with_supplemental_claim("organization", serde_json::json!("acme"));

        let json = serde_json::to_string(&info).unwrap();
        let parsed: UserInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.user_id, "u-42");
        assert_eq!(parsed.email.as_deref(), Some("x@example.com"));
        assert_eq!(
            parsed.supplemental_claims.get("organization"),
            Some(&serde_json::json!("acme"))
        );
    }
}
