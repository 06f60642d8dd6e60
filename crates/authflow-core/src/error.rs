//! Error types for the authflow core library.

use thiserror::Error;

/// Result type alias using [`AuthError`].
pub type Result<T> = std::result::Result<T, AuthError>;

/// Failures surfaced by token, session and resource operations.
///
/// Every variant carries a human-readable reason so callers can show it
/// as-is. The enum is `Clone` because outcomes are embedded in
/// [`ApiResponse`](crate::resource::ApiResponse) values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Token has the wrong number of segments or a segment is not encoded JSON.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Login credentials did not match the known identity.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Refresh token was invalid or expired at refresh time.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// A protected call had no usable token after all refresh attempts.
    #[error("{0}")]
    Unauthenticated(String),

    /// Authenticated, but the endpoint's access policy said no.
    #[error("{0}")]
    Forbidden(String),

    /// Key-value store read/write failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for AuthError {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(format!("JSON error: {e}"))
    }
}

impl AuthError {
    /// Whether this failure means the user has to log in again.
    pub const fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated(_) | Self::RefreshFailed(_) | Self::InvalidCredentials
        )
    }
}
