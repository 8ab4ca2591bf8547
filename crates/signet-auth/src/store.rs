//! Authorization code and access token registry.
//!
//! This module provides the [`TokenStore`], the authoritative in-memory
//! registry for the OAuth 2.0 authorization code flow. It tracks issued
//! authorization codes, the access tokens minted by exchanging them, and a
//! per-user secondary index used for bulk revocation.
//!
//! # Lifecycle
//!
//! 1. A code is registered after the user authenticates
//! 2. The client exchanges the code for an access token
//! 3. Records are removed by the periodic expiration sweep or by
//!    revoking everything owned by a user
//!
//! Records are immutable once created; the store only ever inserts or
//! removes them.
//!
//! # Concurrency
//!
//! All four internal maps (code-by-value, token-by-value, user→codes,
//! user→tokens) live behind a single lock, taken for the whole critical
//! section of every mutation. A concurrent reader observes either the
//! pre- or post-state of a mutation, never an intermediate one. The store
//! performs no I/O; everything is process-lifetime, in-memory state.
//!
//! # Security
//!
//! - Code and token values are never logged; sweep and revocation report
//!   counts only
//! - Generated values carry 256 bits of entropy

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::AuthResult;
use crate::error::AuthError;

/// An issued authorization code and the context it was issued under.
#[derive(Debug, Clone)]
pub struct AuthCode {
    /// Opaque code value (unique key).
    pub code: String,

    /// Client the code was issued to. Exchange is only valid for this
    /// client.
    pub client_id: String,

    /// Username of the authenticated resource owner.
    pub username: String,

    /// OpenID Connect nonce from the authorization request, if the client
    /// sent one. Propagated into the ID token claims.
    pub nonce: Option<String>,

    /// When the code was issued. Assigned once, at creation.
    pub issued_at: OffsetDateTime,
}

impl AuthCode {
    /// Creates a new authorization code record issued now.
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        client_id: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            client_id: client_id.into(),
            username: username.into(),
            nonce: None,
            issued_at: OffsetDateTime::now_utc(),
        }
    }

    /// Attaches the nonce from the authorization request.
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Generates a new cryptographically secure code value.
    ///
    /// The value is 32 bytes of random data, base64url-encoded without
    /// padding (43 characters).
    #[must_use]
    pub fn generate_value() -> String {
        generate_opaque_value()
    }

    fn is_expired(&self, ttl: Duration, now: OffsetDateTime) -> bool {
        now - self.issued_at > ttl
    }
}

/// An access token minted by exchanging an authorization code.
///
/// The token owns an immutable snapshot of the code it was exchanged for;
/// the snapshot is taken at creation and never changes, even if the code
/// record is later swept or revoked.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// Opaque token value (unique key).
    pub token: String,

    /// Snapshot of the authorization code this token was exchanged for.
    pub auth_code: AuthCode,

    /// When the token was issued. Assigned once, at creation.
    pub issued_at: OffsetDateTime,
}

impl AccessToken {
    /// Username of the resource owner, from the originating code.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.auth_code.username
    }

    /// Client the originating code was issued to.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.auth_code.client_id
    }

    /// Generates a new cryptographically secure token value.
    #[must_use]
    pub fn generate_value() -> String {
        generate_opaque_value()
    }

    fn is_expired(&self, ttl: Duration, now: OffsetDateTime) -> bool {
        now - self.issued_at > ttl
    }
}

/// Mints a 256-bit random value, base64url-encoded without padding.
fn generate_opaque_value() -> String {
    let mut bytes = [0u8; 32];
    rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Default)]
struct StoreInner {
    codes: HashMap<String, AuthCode>,
    tokens: HashMap<String, AccessToken>,
    codes_by_user: HashMap<String, HashSet<String>>,
    tokens_by_user: HashMap<String, HashSet<String>>,
}

/// Removes `key` from `username`'s index entry, dropping the entry when it
/// becomes empty.
fn remove_from_index(index: &mut HashMap<String, HashSet<String>>, username: &str, key: &str) {
    let emptied = match index.get_mut(username) {
        Some(keys) => {
            keys.remove(key);
            keys.is_empty()
        }
        None => false,
    };
    if emptied {
        index.remove(username);
    }
}

/// Concurrency-safe registry of authorization codes and access tokens.
///
/// Owned by the serving process and shared with request handlers as an
/// `Arc<TokenStore>`; there are no process-wide singletons.
pub struct TokenStore {
    inner: RwLock<StoreInner>,
}

impl TokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Registers an issued authorization code.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::DuplicateAuthCode`] if a code with the same
    /// value is already registered; the store is left unchanged.
    pub fn add_auth_code(&self, code: AuthCode) -> AuthResult<()> {
        let mut inner = self.inner.write().expect("token store lock poisoned");
        if inner.codes.contains_key(&code.code) {
            return Err(AuthError::DuplicateAuthCode);
        }
        inner
            .codes_by_user
            .entry(code.username.clone())
            .or_default()
            .insert(code.code.clone());
        inner.codes.insert(code.code.clone(), code);
        Ok(())
    }

    /// Exchanges a registered authorization code for an access token.
    ///
    /// The new token snapshots the code record and is indexed under the
    /// code's username. The code itself stays registered: codes are not
    /// single-use here, so a second exchange within the TTL window also
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownAuthCode`] if `code` is not currently
    /// registered, or [`AuthError::DuplicateAccessToken`] if `token` is
    /// already in use. In both cases no token is registered.
    pub fn add_access_token(&self, token: &str, code: &str) -> AuthResult<()> {
        let mut inner = self.inner.write().expect("token store lock poisoned");
        if inner.tokens.contains_key(token) {
            return Err(AuthError::DuplicateAccessToken);
        }
        let auth_code = inner
            .codes
            .get(code)
            .cloned()
            .ok_or(AuthError::UnknownAuthCode)?;

        inner
            .tokens_by_user
            .entry(auth_code.username.clone())
            .or_default()
            .insert(token.to_owned());
        inner.tokens.insert(
            token.to_owned(),
            AccessToken {
                token: token.to_owned(),
                auth_code,
                issued_at: OffsetDateTime::now_utc(),
            },
        );
        Ok(())
    }

    /// Returns `true` iff `code` is registered and was issued to
    /// `client_id`.
    #[must_use]
    pub fn is_valid_auth_code(&self, code: &str, client_id: &str) -> bool {
        let inner = self.inner.read().expect("token store lock poisoned");
        inner
            .codes
            .get(code)
            .is_some_and(|c| c.client_id == client_id)
    }

    /// Looks up the username an access token belongs to.
    #[must_use]
    pub fn user_for_token(&self, token: &str) -> Option<String> {
        let inner = self.inner.read().expect("token store lock poisoned");
        inner.tokens.get(token).map(|t| t.username().to_owned())
    }

    /// Looks up an access token record by value.
    #[must_use]
    pub fn access_token(&self, token: &str) -> Option<AccessToken> {
        let inner = self.inner.read().expect("token store lock poisoned");
        inner.tokens.get(token).cloned()
    }

    /// Atomically removes every code and token owned by `username`.
    ///
    /// Used on logout or account deactivation. Returns the number of
    /// codes and tokens removed.
    pub fn clear_objects_for_user(&self, username: &str) -> (u64, u64) {
        let mut inner = self.inner.write().expect("token store lock poisoned");

        let mut codes_removed = 0u64;
        if let Some(codes) = inner.codes_by_user.remove(username) {
            for code in codes {
                inner.codes.remove(&code);
                codes_removed += 1;
            }
        }

        let mut tokens_removed = 0u64;
        if let Some(tokens) = inner.tokens_by_user.remove(username) {
            for token in tokens {
                inner.tokens.remove(&token);
                tokens_removed += 1;
            }
        }

        debug!(username, codes_removed, tokens_removed, "cleared token state for user");
        (codes_removed, tokens_removed)
    }

    /// Removes every record whose age exceeds `ttl`.
    ///
    /// Codes and tokens are swept independently: a token stays registered
    /// until its own age exceeds the TTL, even if its originating code has
    /// already been swept. Safe to call concurrently with other operations
    /// and idempotent once nothing expired remains. Intended to be driven
    /// at a bounded cadence by an external scheduler; the store keeps no
    /// timers of its own.
    ///
    /// Returns the number of codes and tokens removed.
    pub fn remove_expired_tokens(&self, ttl: Duration) -> (u64, u64) {
        let mut inner = self.inner.write().expect("token store lock poisoned");
        let now = OffsetDateTime::now_utc();

        let expired_codes: Vec<(String, String)> = inner
            .codes
            .iter()
            .filter(|(_, c)| c.is_expired(ttl, now))
            .map(|(value, c)| (value.clone(), c.username.clone()))
            .collect();
        for (value, username) in &expired_codes {
            inner.codes.remove(value);
            remove_from_index(&mut inner.codes_by_user, username, value);
        }

        let expired_tokens: Vec<(String, String)> = inner
            .tokens
            .iter()
            .filter(|(_, t)| t.is_expired(ttl, now))
            .map(|(value, t)| (value.clone(), t.username().to_owned()))
            .collect();
        for (value, username) in &expired_tokens {
            inner.tokens.remove(value);
            remove_from_index(&mut inner.tokens_by_user, username, value);
        }

        let codes_removed = expired_codes.len() as u64;
        let tokens_removed = expired_tokens.len() as u64;
        debug!(codes_removed, tokens_removed, "swept expired records");
        (codes_removed, tokens_removed)
    }

    /// Number of registered authorization codes.
    #[must_use]
    pub fn code_count(&self) -> usize {
        self.inner
            .read()
            .expect("token store lock poisoned")
            .codes
            .len()
    }

    /// Number of registered access tokens.
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.inner
            .read()
            .expect("token store lock poisoned")
            .tokens
            .len()
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}
