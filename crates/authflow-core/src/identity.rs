//! The single known identity and credential checking.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::error::{AuthError, Result};

/// Password accepted for the test user.
const TEST_USER_PASSWORD: &str = "password";

/// A user as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
}

impl Identity {
    /// The one identity this system knows about.
    pub fn test_user() -> Self {
        Self {
            id: "1".to_string(),
            email: "test@example.com".to_string(),
            name: "Test User".to_string(),
            role: "user".to_string(),
        }
    }
}

/// Login input. Never persisted.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Checks credentials against a single identity/password pair.
#[derive(Debug, Clone)]
pub struct Authenticator {
    identity: Identity,
    password: String,
}

impl Default for Authenticator {
    fn default() -> Self {
        Self::new(Identity::test_user(), TEST_USER_PASSWORD)
    }
}

impl Authenticator {
    pub fn new(identity: Identity, password: impl Into<String>) -> Self {
        Self {
            identity,
            password: password.into(),
        }
    }

    /// Return the identity if `credentials` match, else `InvalidCredentials`.
    pub fn authenticate(&self, credentials: &Credentials) -> Result<Identity> {
        info!(email = %credentials.email, "Login attempt");

        let email_ok = credentials.email == self.identity.email;
        let password_ok: bool = credentials
            .password
            .as_bytes()
            .ct_eq(self.password.as_bytes())
            .into();

        if email_ok && password_ok {
            Ok(self.identity.clone())
        } else {
            warn!(email = %credentials.email, "Login failed: invalid credentials");
            Err(AuthError::InvalidCredentials)
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn known_credentials_authenticate() {
        let identity = Authenticator::default()
            .authenticate(&Credentials::new("test@example.com", "password"))
            .unwrap();
        assert_eq!(identity, Identity::test_user());
    }

    #[test]
    fn wrong_password_rejected() {
        let err = Authenticator::default()
            .authenticate(&Credentials::new("test@example.com", "hunter2"))
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
    }

    #[test]
    fn unknown_email_rejected() {
        let err = Authenticator::default()
            .authenticate(&Credentials::new("someone@example.com", "password"))
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
    }

    #[test]
    fn debug_output_hides_password() {
        let creds = Credentials::new("test@example.com", "password");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("test@example.com"));
        assert!(!rendered.contains("\"password\""));
    }
}
