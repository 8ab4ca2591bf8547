//! Token lifecycle error types.
//!
//! This module defines all error types that can occur while issuing,
//! exchanging, and deriving claims from tokens.

/// Errors that can occur during token lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// An access token exchange referenced an authorization code that is
    /// not registered (never issued, already swept, or revoked).
    #[error("Unknown authorization code")]
    UnknownAuthCode,

    /// An authorization code with the same value is already registered.
    ///
    /// Codes are 256-bit random values, so in practice this indicates a
    /// caller bug or a replayed issuance request rather than a collision.
    #[error("Authorization code is already registered")]
    DuplicateAuthCode,

    /// An access token with the same value is already registered.
    #[error("Access token is already registered")]
    DuplicateAccessToken,

    /// A claims derivation referenced an access token that is not
    /// registered (never issued, already swept, or revoked).
    #[error("Unknown access token")]
    UnknownAccessToken,

    /// A guest claim set was requested but the authenticator does not
    /// support guest identities.
    #[error("Guest tokens are not supported by this authenticator")]
    GuestUnsupported,

    /// The authenticator resolved a user to an empty or missing subject id.
    #[error("Invalid user id: {message}")]
    InvalidUserId {
        /// Description of why the user id is invalid.
        message: String,
    },

    /// The authenticator call itself failed. The underlying cause is
    /// preserved for diagnostics.
    #[error("Authenticator failure: {source}")]
    AuthenticatorFailure {
        /// The underlying error reported by the authenticator.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl AuthError {
    /// Creates a new `InvalidUserId` error.
    #[must_use]
    pub fn invalid_user_id(message: impl Into<String>) -> Self {
        Self::InvalidUserId {
            message: message.into(),
        }
    }

    /// Creates a new `AuthenticatorFailure` error wrapping the given cause.
    #[must_use]
    pub fn authenticator_failure(
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::AuthenticatorFailure {
            source: source.into(),
        }
    }

    /// Returns `true` if this error was caused by the caller (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownAuthCode
                | Self::DuplicateAuthCode
                | Self::DuplicateAccessToken
                | Self::UnknownAccessToken
                | Self::GuestUnsupported
        )
    }

    /// Returns `true` if this error originated in the server or an
    /// upstream capability (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidUserId { .. } | Self::AuthenticatorFailure { .. }
        )
    }

    /// Returns the OAuth 2.0 error code for this error (RFC 6749).
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::UnknownAuthCode | Self::UnknownAccessToken => "invalid_grant",
            Self::DuplicateAuthCode | Self::DuplicateAccessToken => "invalid_request",
            Self::GuestUnsupported => "access_denied",
            Self::InvalidUserId { .. } | Self::AuthenticatorFailure { .. } => "server_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::UnknownAuthCode;
        assert_eq!(err.to_string(), "Unknown authorization code");

        let err = AuthError::invalid_user_id("empty subject for username 'alice'");
        assert_eq!(
            err.to_string(),
            "Invalid user id: empty subject for username 'alice'"
        );

        let err = AuthError::authenticator_failure("directory unreachable");
        assert_eq!(
            err.to_string(),
            "Authenticator failure: directory unreachable"
        );
    }

    #[test]
    fn test_error_predicates() {
        assert!(AuthError::UnknownAuthCode.is_client_error());
        assert!(!AuthError::UnknownAuthCode.is_server_error());

        assert!(AuthError::DuplicateAuthCode.is_client_error());
        assert!(AuthError::GuestUnsupported.is_client_error());

        let err = AuthError::authenticator_failure("boom");
        assert!(err.is_server_error());
        assert!(!err.is_client_error());

        assert!(AuthError::invalid_user_id("x").is_server_error());
    }

    #[test]
    fn test_oauth_error_code() {
        assert_eq!(AuthError::UnknownAuthCode.oauth_error_code(), "invalid_grant");
        assert_eq!(
            AuthError::DuplicateAuthCode.oauth_error_code(),
            "invalid_request"
        );
        assert_eq!(
            AuthError::GuestUnsupported.oauth_error_code(),
            "access_denied"
        );
        assert_eq!(
            AuthError::authenticator_failure("boom").oauth_error_code(),
            "server_error"
        );
    }

    #[test]
    fn test_authenticator_failure_preserves_cause() {
        let cause = std::io::Error::new(std::io::ErrorKind::TimedOut, "ldap timeout");
        let err = AuthError::authenticator_failure(cause);

        let source = std::error::Error::source(&err).expect("cause should be preserved");
        assert!(source.to_string().contains("ldap timeout"));
    }
}
