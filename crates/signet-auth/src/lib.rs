//! # signet-auth
//!
//! Token lifecycle core for an OAuth 2.0 / OpenID Connect authorization
//! server.
//!
//! This crate provides:
//! - In-memory registry of authorization codes and access tokens
//! - Per-user secondary index for bulk revocation
//! - TTL-based expiration sweep driven by an external scheduler
//! - ID token and guest claim set construction for an external signer
//! - Authenticator capability trait for identity resolution
//!
//! ## Overview
//!
//! The crate covers the state-holding middle of the authorization code
//! flow: codes are registered after authentication, exchanged for opaque
//! access tokens, and turned into claim sets when an ID token is needed.
//! Encoding, signing, and HTTP transport live outside this crate.
//!
//! ## Modules
//!
//! - [`authenticator`] - Identity resolution capability and a static
//!   in-memory implementation
//! - [`claims`] - ID token and guest claim set construction
//! - [`config`] - Issuer and token lifetime configuration
//! - [`error`] - Token lifecycle error types
//! - [`service`] - High-level facade over the full lifecycle
//! - [`store`] - Authorization code and access token registry

pub mod authenticator;
pub mod claims;
pub mod config;
pub mod error;
pub mod service;
pub mod store;

pub use authenticator::{Authenticator, StaticAuthenticator, UserInfo};
pub use claims::{ClaimSet, ClaimsBuilder, IdTokenClaim};
pub use config::{AuthConfig, ConfigError, OAuthConfig};
pub use error::AuthError;
pub use service::TokenService;
pub use store::{AccessToken, AuthCode, TokenStore};

/// Type alias for token lifecycle results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use signet_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::authenticator::{Authenticator, StaticAuthenticator, UserInfo};
    pub use crate::claims::{ClaimSet, ClaimsBuilder, IdTokenClaim};
    pub use crate::config::{AuthConfig, ConfigError, OAuthConfig};
    pub use crate::error::AuthError;
    pub use crate::service::TokenService;
    pub use crate::store::{AccessToken, AuthCode, TokenStore};
}
