//! Persisted session slots.
//!
//! The access token, refresh token and user record live under three
//! independent keys. Writes are not atomic across slots, so `load` validates
//! each slot on its own and treats anything missing or corrupt as absent.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::Session;
use crate::error::Result;
use crate::identity::Identity;
use crate::store::KeyValueStore;
use crate::token::{TokenPair, is_valid, remaining_seconds};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_KEY: &str = "auth_user";

/// What a startup load found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Access token valid and user record intact.
    Active(Session),
    /// Access token unusable but this refresh token is still valid; the
    /// caller decides whether to refresh.
    RefreshRequired(String),
    /// Nothing usable persisted.
    Absent,
}

/// Reads and writes the session slots of a [`KeyValueStore`].
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Persist all three slots.
    pub fn save(&self, session: &Session) -> Result<()> {
        self.kv.set(ACCESS_TOKEN_KEY, &session.tokens.access_token)?;
        match session.refresh_token() {
            Some(token) => self.kv.set(REFRESH_TOKEN_KEY, token)?,
            None => self.kv.remove(REFRESH_TOKEN_KEY)?,
        }
        self.kv
            .set(USER_KEY, &serde_json::to_string(&session.identity)?)?;
        debug!(sub = %session.identity.id, "Session saved");
        Ok(())
    }

    /// Reconstruct whatever is usable at `now`.
    pub fn load(&self, now: i64) -> LoadOutcome {
        let access = self.slot(ACCESS_TOKEN_KEY);
        let refresh = self.slot(REFRESH_TOKEN_KEY);
        let user = self.slot(USER_KEY).and_then(|raw| {
            serde_json::from_str::<Identity>(&raw)
                .inspect_err(|e| warn!(error = %e, "Stored user record is corrupt"))
                .ok()
        });

        info!(
            access = access.as_ref().map(|t| remaining_seconds(t, now)),
            refresh = refresh.as_ref().map(|t| remaining_seconds(t, now)),
            user = user.is_some(),
            "Loading stored session"
        );

        if let (Some(access_token), Some(identity)) = (&access, user) {
            if is_valid(access_token, now) {
                return LoadOutcome::Active(Session {
                    identity,
                    tokens: TokenPair {
                        access_token: access_token.clone(),
                        refresh_token: refresh.unwrap_or_default(),
                    },
                });
            }
        }

        match refresh {
            Some(token) if is_valid(&token, now) => LoadOutcome::RefreshRequired(token),
            _ => LoadOutcome::Absent,
        }
    }

    /// Remove every slot. Clearing an empty store is a no-op.
    pub fn clear(&self) -> Result<()> {
        self.kv.remove(ACCESS_TOKEN_KEY)?;
        self.kv.remove(REFRESH_TOKEN_KEY)?;
        self.kv.remove(USER_KEY)?;
        info!("Stored session cleared");
        Ok(())
    }

    fn slot(&self, key: &str) -> Option<String> {
        match self.kv.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key, error = %e, "Unreadable session slot treated as absent");
                None
            }
        }
    }
}
