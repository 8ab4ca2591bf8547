//! Token service tying the store, the claims builder, and configuration
//! together.
//!
//! The [`TokenService`] is the convenience entry point for the full
//! lifecycle: issue a code after authentication, exchange it for an
//! opaque access token, derive claim sets for the external signer, revoke
//! a user, and drive the expiration sweep. Callers that need finer
//! control can use [`TokenStore`] and [`ClaimsBuilder`] directly.

use std::sync::Arc;

use crate::AuthResult;
use crate::authenticator::Authenticator;
use crate::claims::{ClaimSet, ClaimsBuilder};
use crate::config::{AuthConfig, ConfigError};
use crate::error::AuthError;
use crate::store::{AccessToken, AuthCode, TokenStore};

/// High-level facade over the token lifecycle core.
pub struct TokenService {
    store: Arc<TokenStore>,
    claims: ClaimsBuilder,
    config: AuthConfig,
}

impl TokenService {
    /// Creates a token service over the given store and authenticator.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid.
    pub fn new(
        store: Arc<TokenStore>,
        authenticator: Arc<dyn Authenticator>,
        config: AuthConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store,
            claims: ClaimsBuilder::new(authenticator),
            config,
        })
    }

    /// The underlying token store.
    #[must_use]
    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Issues and registers a fresh authorization code for an
    /// authenticated user.
    ///
    /// Returns the registered record; its `code` field is the value to
    /// hand back to the client.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::DuplicateAuthCode`] in the (practically
    /// impossible) case of a generated value collision.
    pub fn issue_code(
        &self,
        client_id: &str,
        username: &str,
        nonce: Option<&str>,
    ) -> AuthResult<AuthCode> {
        let mut code = AuthCode::new(AuthCode::generate_value(), client_id, username);
        if let Some(nonce) = nonce {
            code = code.with_nonce(nonce);
        }
        self.store.add_auth_code(code.clone())?;
        Ok(code)
    }

    /// Exchanges an authorization code for a freshly minted access token
    /// value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownAuthCode`] if the code is not
    /// registered or was issued to a different client. Which of the two
    /// failed is deliberately not distinguished.
    pub fn exchange_code(&self, code: &str, client_id: &str) -> AuthResult<String> {
        if !self.store.is_valid_auth_code(code, client_id) {
            return Err(AuthError::UnknownAuthCode);
        }
        let token = AccessToken::generate_value();
        self.store.add_access_token(&token, code)?;
        Ok(token)
    }

    /// Derives the ID token claim set for a registered access token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownAccessToken`] if the token is not
    /// registered; otherwise propagates claims-builder errors.
    pub async fn id_token_claims(&self, token: &str) -> AuthResult<ClaimSet> {
        let record = self
            .store
            .access_token(token)
            .ok_or(AuthError::UnknownAccessToken)?;
        self.claims
            .id_token_claims(&record, &self.config.issuer, self.id_token_lifetime())
            .await
    }

    /// Derives a guest claim set for the given client.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::GuestUnsupported`] if the authenticator does
    /// not support guest identities.
    pub async fn guest_token_claims(&self, client_id: &str) -> AuthResult<ClaimSet> {
        self.claims
            .guest_token_claims(client_id, &self.config.issuer, self.id_token_lifetime())
            .await
    }

    /// Revokes every code and token owned by `username`.
    ///
    /// Returns the number of codes and tokens removed.
    pub fn revoke_user(&self, username: &str) -> (u64, u64) {
        self.store.clear_objects_for_user(username)
    }

    /// Removes records older than the configured TTL.
    ///
    /// Intended to be called at a bounded cadence by an external
    /// scheduler. Returns the number of codes and tokens removed.
    pub fn sweep_expired(&self) -> (u64, u64) {
        let ttl = time::Duration::try_from(self.config.oauth.token_ttl)
            .unwrap_or(time::Duration::MAX);
        self.store.remove_expired_tokens(ttl)
    }

    fn id_token_lifetime(&self) -> time::Duration {
        time::Duration::try_from(self.config.oauth.id_token_lifetime)
            .unwrap_or(time::Duration::MAX)
    }
}
