//! ID token claim set construction.
//!
//! This module turns a stored access token (plus data resolved through the
//! [`Authenticator`] capability) into a claim set ready for an external
//! signer. No encoding, signing, or transport happens here; the output is
//! a plain JSON object.
//!
//! # Reserved claims
//!
//! The claim names in [`IdTokenClaim`] are protocol-controlled. When an
//! authenticator supplies a supplemental claim under a reserved name, the
//! supplemental value is dropped (never substituted) and a warning is
//! logged.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use time::{Duration, OffsetDateTime};
use tracing::warn;

use crate::AuthResult;
use crate::authenticator::Authenticator;
use crate::error::AuthError;
use crate::store::AccessToken;

/// A claim set: claim name to JSON value. Built on demand, never persisted.
pub type ClaimSet = Map<String, Value>;

/// OpenID Connect claims controlled by this server.
///
/// Supplemental authenticator data may never override these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdTokenClaim {
    /// Issuer of the token.
    Iss,
    /// Subject (unique user id).
    Sub,
    /// Audience (client id of the consumer).
    Aud,
    /// Authorized party (same as `aud` here).
    Azp,
    /// Time of authentication, Unix seconds.
    AuthTime,
    /// Time of issuance, Unix seconds.
    Iat,
    /// Time of expiration, Unix seconds.
    Exp,
    /// Links the original authorization request with the ID token.
    Nonce,
    /// User's email address.
    Email,
    /// Whether the email address is verified.
    EmailVerified,
    /// Human-friendly display name for the user.
    PreferredUsername,
    /// Whether this token represents a guest rather than a registered user.
    IsGuest,
}

impl IdTokenClaim {
    /// All reserved claims.
    pub const ALL: [IdTokenClaim; 12] = [
        Self::Iss,
        Self::Sub,
        Self::Aud,
        Self::Azp,
        Self::AuthTime,
        Self::Iat,
        Self::Exp,
        Self::Nonce,
        Self::Email,
        Self::EmailVerified,
        Self::PreferredUsername,
        Self::IsGuest,
    ];

    /// Returns the wire name of the claim.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Iss => "iss",
            Self::Sub => "sub",
            Self::Aud => "aud",
            Self::Azp => "azp",
            Self::AuthTime => "auth_time",
            Self::Iat => "iat",
            Self::Exp => "exp",
            Self::Nonce => "nonce",
            Self::Email => "email",
            Self::EmailVerified => "email_verified",
            Self::PreferredUsername => "preferred_username",
            Self::IsGuest => "is_guest",
        }
    }

    /// Returns `true` if `name` is a reserved claim name.
    #[must_use]
    pub fn is_reserved(name: &str) -> bool {
        Self::ALL.iter().any(|claim| claim.as_str() == name)
    }
}

impl fmt::Display for IdTokenClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Builds signed-claim-ready ID token claim sets.
///
/// Stateless apart from the authenticator handle; every call reads its
/// inputs and produces a fresh claim set.
pub struct ClaimsBuilder {
    authenticator: Arc<dyn Authenticator>,
}

impl ClaimsBuilder {
    /// Creates a builder over the given authenticator.
    #[must_use]
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }

    /// Builds the ID token claim set for an access token.
    ///
    /// The base claims come from the token's originating authorization
    /// code (`aud`/`azp` from the client id, `auth_time` from the code's
    /// issuance time, `nonce` only if the authorization carried one). The
    /// subject and optional identity claims come from the authenticator.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidUserId`] if the authenticator resolves the
    ///   username to an empty subject id
    /// - [`AuthError::AuthenticatorFailure`] propagated from the lookup
    pub async fn id_token_claims(
        &self,
        token: &AccessToken,
        issuer: &str,
        expires_in: Duration,
    ) -> AuthResult<ClaimSet> {
        let mut claims = base_claims(
            issuer,
            token.client_id(),
            token.auth_code.issued_at,
            token.auth_code.nonce.as_deref(),
            expires_in,
            false,
        );

        let user = self.authenticator.user_info(token.username()).await?;
        if user.user_id.is_empty() {
            return Err(AuthError::invalid_user_id(format!(
                "authenticator returned an empty user id for username '{}'",
                token.username()
            )));
        }
        claims.insert(IdTokenClaim::Sub.as_str().to_owned(), json!(user.user_id));

        if let Some(email) = user.email.filter(|e| !e.is_empty()) {
            claims.insert(IdTokenClaim::Email.as_str().to_owned(), json!(email));
            claims.insert(
                IdTokenClaim::EmailVerified.as_str().to_owned(),
                json!(user.email_verified),
            );
        }

        if let Some(name) = user.preferred_username.filter(|n| !n.is_empty()) {
            claims.insert(
                IdTokenClaim::PreferredUsername.as_str().to_owned(),
                json!(name),
            );
        }

        for (name, value) in user.supplemental_claims {
            if IdTokenClaim::is_reserved(&name) {
                warn!(claim = %name, "authenticator tried to override a reserved ID token claim, dropping");
                continue;
            }
            claims.insert(name, value);
        }

        Ok(claims)
    }

    /// Builds a claim set for an anonymous guest identity.
    ///
    /// Guest issuance bypasses the authorization code flow, so
    /// `auth_time` is the issuance instant and no nonce is attached. The
    /// subject is a freshly minted guest identifier.
    ///
    /// # Errors
    ///
    /// - [`AuthError::GuestUnsupported`] if the authenticator does not
    ///   support guest identities
    /// - [`AuthError::AuthenticatorFailure`] propagated from guest id
    ///   minting
    pub async fn guest_token_claims(
        &self,
        client_id: &str,
        issuer: &str,
        expires_in: Duration,
    ) -> AuthResult<ClaimSet> {
        if !self.authenticator.supports_guests() {
            return Err(AuthError::GuestUnsupported);
        }

        let mut claims = base_claims(
            issuer,
            client_id,
            OffsetDateTime::now_utc(),
            None,
            expires_in,
            true,
        );
        let guest_id = self.authenticator.next_guest_id().await?;
        claims.insert(IdTokenClaim::Sub.as_str().to_owned(), json!(guest_id));

        Ok(claims)
    }
}

/// Claims common to ID and guest tokens.
fn base_claims(
    issuer: &str,
    client_id: &str,
    auth_time: OffsetDateTime,
    nonce: Option<&str>,
    expires_in: Duration,
    is_guest: bool,
) -> ClaimSet {
    let now = OffsetDateTime::now_utc().unix_timestamp();

    let mut claims = ClaimSet::new();
    claims.insert(IdTokenClaim::Iss.as_str().to_owned(), json!(issuer));
    claims.insert(IdTokenClaim::Aud.as_str().to_owned(), json!(client_id));
    claims.insert(IdTokenClaim::Azp.as_str().to_owned(), json!(client_id));
    claims.insert(
        IdTokenClaim::AuthTime.as_str().to_owned(),
        json!(auth_time.unix_timestamp()),
    );
    claims.insert(IdTokenClaim::Iat.as_str().to_owned(), json!(now));
    claims.insert(
        IdTokenClaim::Exp.as_str().to_owned(),
        json!(now + expires_in.whole_seconds()),
    );
    claims.insert(IdTokenClaim::IsGuest.as_str().to_owned(), json!(is_guest));

    if let Some(nonce) = nonce.filter(|n| !n.is_empty()) {
        claims.insert(IdTokenClaim::Nonce.as_str().to_owned(), json!(nonce));
    }

    claims
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authenticator::{StaticAuthenticator, UserInfo};
    use crate::store::{AuthCode, TokenStore};

    fn exchanged_token(store: &TokenStore, code: AuthCode) -> AccessToken {
        let value = code.code.clone();
        store.add_auth_code(code).unwrap();
        store.add_access_token("tok1", &value).unwrap();
        store.access_token("tok1").unwrap()
    }

    fn builder_with(users: Vec<(&str, UserInfo)>) -> ClaimsBuilder {
        let auth = StaticAuthenticator::new();
        for (username, info) in users {
            auth.insert_user(username, info);
        }
        ClaimsBuilder::new(Arc::new(auth))
    }

    #[test]
    fn test_reserved_claim_vocabulary() {
        assert_eq!(IdTokenClaim::ALL.len(), 12);
        for claim in IdTokenClaim::ALL {
            assert!(IdTokenClaim::is_reserved(claim.as_str()));
        }
        assert!(!IdTokenClaim::is_reserved("organization"));
        assert_eq!(IdTokenClaim::AuthTime.to_string(), "auth_time");
        assert_eq!(IdTokenClaim::IsGuest.to_string(), "is_guest");
    }

    #[tokio::test]
    async fn test_claim_completeness() {
        let store = TokenStore::new();
        let token = exchanged_token(&store, AuthCode::new("abc123", "portal", "alice"));
        let builder = builder_with(vec![("alice", UserInfo::new("u-1001"))]);

        let claims = builder
            .id_token_claims(&token, "https://id.example.com", Duration::hours(1))
            .await
            .unwrap();

        for name in ["iss", "sub", "aud", "azp", "auth_time", "iat", "exp", "is_guest"] {
            assert!(claims.contains_key(name), "missing base claim {name}");
        }
        assert_eq!(claims["iss"], json!("https://id.example.com"));
        assert_eq!(claims["sub"], json!("u-1001"));
        assert_eq!(claims["aud"], json!("portal"));
        assert_eq!(claims["azp"], json!("portal"));
        assert_eq!(claims["is_guest"], json!(false));
        // No optional data was supplied.
        assert!(!claims.contains_key("email"));
        assert!(!claims.contains_key("email_verified"));
        assert!(!claims.contains_key("preferred_username"));
        assert!(!claims.contains_key("nonce"));
    }

    #[tokio::test]
    async fn test_auth_time_comes_from_the_code() {
        let store = TokenStore::new();
        let mut code = AuthCode::new("abc123", "portal", "alice");
        code.issued_at = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let token = exchanged_token(&store, code);
        let builder = builder_with(vec![("alice", UserInfo::new("u-1001"))]);

        let claims = builder
            .id_token_claims(&token, "https://id.example.com", Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(claims["auth_time"], json!(1_700_000_000));
        let iat = claims["iat"].as_i64().unwrap();
        let exp = claims["exp"].as_i64().unwrap();
        assert_eq!(exp - iat, 3600);
        assert!(iat > 1_700_000_000);
    }

    #[tokio::test]
    async fn test_optional_identity_claims() {
        let store = TokenStore::new();
        let token = exchanged_token(&store, AuthCode::new("abc123", "portal", "alice"));
        let builder = builder_with(vec![(
            "alice",
            UserInfo::new("u-1001")
                .with_email("alice@example.com", true)
                .with_preferred_username("Alice"),
        )]);

        let claims = builder
            .id_token_claims(&token, "https://id.example.com", Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(claims["email"], json!("alice@example.com"));
        assert_eq!(claims["email_verified"], json!(true));
        assert_eq!(claims["preferred_username"], json!("Alice"));
    }

    #[tokio::test]
    async fn test_nonce_propagates_when_present() {
        let store = TokenStore::new();
        let token = exchanged_token(
            &store,
            AuthCode::new("abc123", "portal", "alice").with_nonce("n-0S6_WzA2Mj"),
        );
        let builder = builder_with(vec![("alice", UserInfo::new("u-1001"))]);

        let claims = builder
            .id_token_claims(&token, "https://id.example.com", Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(claims["nonce"], json!("n-0S6_WzA2Mj"));
    }

    #[tokio::test]
    async fn test_supplemental_claims_merge() {
        let store = TokenStore::new();
        let token = exchanged_token(&store, AuthCode::new("abc123", "portal", "alice"));
        let builder = builder_with(vec![(
            "alice",
            UserInfo::new("u-1001")
                .with_supplemental_claim("organization", json!("acme"))
                .with_supplemental_claim("roles", json!(["editor", "admin"])),
        )]);

        let claims = builder
            .id_token_claims(&token, "https://id.example.com", Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(claims["organization"], json!("acme"));
        assert_eq!(claims["roles"], json!(["editor", "admin"]));
    }

    #[tokio::test]
    async fn test_reserved_claims_cannot_be_overridden() {
        let store = TokenStore::new();
        let token = exchanged_token(&store, AuthCode::new("abc123", "portal", "alice"));
        let builder = builder_with(vec![(
            "alice",
            UserInfo::new("u-1001")
                .with_supplemental_claim("exp", json!(0))
                .with_supplemental_claim("sub", json!("forged"))
                .with_supplemental_claim("organization", json!("acme")),
        )]);

        let claims = builder
            .id_token_claims(&token, "https://id.example.com", Duration::hours(1))
            .await
            .unwrap();

        // Protocol-computed values win; colliding supplementals are dropped.
        assert_eq!(claims["sub"], json!("u-1001"));
        let iat = claims["iat"].as_i64().unwrap();
        assert_eq!(claims["exp"], json!(iat + 3600));
        // Non-colliding supplementals still merge.
        assert_eq!(claims["organization"], json!("acme"));
    }

    #[tokio::test]
    async fn test_empty_user_id_rejected() {
        let store = TokenStore::new();
        let token = exchanged_token(&store, AuthCode::new("abc123", "portal", "alice"));
        let builder = builder_with(vec![("alice", UserInfo::new(""))]);

        let err = builder
            .id_token_claims(&token, "https://id.example.com", Duration::hours(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidUserId { .. }));
        assert!(err.to_string().contains("alice"));
    }

    #[tokio::test]
    async fn test_authenticator_failure_propagates() {
        let store = TokenStore::new();
        let token = exchanged_token(&store, AuthCode::new("abc123", "portal", "alice"));
        // No users registered: the lookup itself fails.
        let builder = builder_with(vec![]);

        let err = builder
            .id_token_claims(&token, "https://id.example.com", Duration::hours(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AuthenticatorFailure { .. }));
    }

    #[tokio::test]
    async fn test_guest_claims() {
        let builder = builder_with(vec![]);

        let claims = builder
            .guest_token_claims("portal", "https://id.example.com", Duration::minutes(30))
            .await
            .unwrap();

        assert_eq!(claims["is_guest"], json!(true));
        assert_eq!(claims["aud"], json!("portal"));
        assert_eq!(claims["azp"], json!("portal"));
        assert!(claims["sub"].as_str().unwrap().starts_with("guest-"));
        // Guests have no prior authentication event and no nonce.
        assert!(!claims.contains_key("nonce"));
        let iat = claims["iat"].as_i64().unwrap();
        let auth_time = claims["auth_time"].as_i64().unwrap();
        assert!((auth_time - iat).abs() <= 1);
        assert_eq!(claims["exp"], json!(iat + 1800));
    }

    #[tokio::test]
    async fn test_guest_gating() {
        let auth = StaticAuthenticator::new().with_guests_enabled(false);
        let builder = ClaimsBuilder::new(Arc::new(auth));

        let err = builder
            .guest_token_claims("portal", "https://id.example.com", Duration::minutes(30))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::GuestUnsupported));
    }
}
