//! Token header, payload claims and the access/refresh pair.

use serde::{Deserialize, Serialize};

use crate::identity::Identity;

/// JWT header. Format only: nothing checks `alg`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub alg: String,
    pub typ: String,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Claims carried in the payload segment of every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    /// Subject (user ID).
    pub sub: String,
    pub email: String,
    pub name: String,
    pub role: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
}

impl TokenPayload {
    /// Claims for `identity`, issued at `iat` and living for `ttl_secs`.
    pub fn for_identity(identity: &Identity, iat: i64, ttl_secs: i64) -> Self {
        Self {
            sub: identity.id.clone(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            role: identity.role.clone(),
            iat,
            exp: iat + ttl_secs,
        }
    }

    /// The identity these claims describe.
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.sub.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role.clone(),
        }
    }
}

/// Which half of a [`TokenPair`] a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Access and refresh tokens issued together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    /// The refresh token, or `None` when the slot is empty.
    pub fn refresh(&self) -> Option<&str> {
        Some(self.refresh_token.as_str()).filter(|t| !t.is_empty())
    }
}
