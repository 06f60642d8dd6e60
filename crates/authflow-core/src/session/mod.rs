//! Client-side session: persisted slots and the manager that owns them.

mod manager;
mod store;

pub use manager::{SessionManager, TokenStatus};
pub use store::{ACCESS_TOKEN_KEY, LoadOutcome, REFRESH_TOKEN_KEY, SessionStore, USER_KEY};

use crate::error::Result;
use crate::identity::Identity;
use crate::token::TokenPair;
use crate::token::codec::decode_payload;

/// The signed-in user and the tokens that prove it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: Identity,
    pub tokens: TokenPair,
}

impl Session {
    /// Build a session from freshly accepted tokens; the identity comes from
    /// the access token's claims.
    pub fn from_tokens(tokens: TokenPair) -> Result<Self> {
        let identity = decode_payload(&tokens.access_token)?.identity();
        Ok(Self { identity, tokens })
    }

    pub fn access_token(&self) -> &str {
        &self.tokens.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.refresh()
    }
}
