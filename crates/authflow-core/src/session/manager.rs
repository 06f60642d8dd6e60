//! The session manager: the one place session state is mutated.
//!
//! Every mutation goes through the state lock and is tagged with a
//! generation. Login, logout and expiry start a new generation; refreshes
//! keep it. Anything computed against an older generation is dropped instead
//! of committed, which is what keeps a periodic tick that was in flight
//! during logout from resurrecting the session.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{LoadOutcome, Session, SessionStore};
use crate::clock::Clock;
use crate::config::Config;
use crate::error::{AuthError, Result};
use crate::identity::{Authenticator, Credentials};
use crate::refresh::{CheckOutcome, RefreshOrchestrator, RefreshTarget, SessionSnapshot};
use crate::resource::{ApiResponse, Endpoint, MockResourceServer};
use crate::scheduler::CancelHandle;
use crate::store::KeyValueStore;
use crate::token::{TokenIssuer, TokenPair};

/// Remaining lifetime of the held tokens, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenStatus {
    pub access_remaining: Option<i64>,
    pub refresh_remaining: Option<i64>,
}

#[derive(Debug, Default)]
struct State {
    session: Option<Session>,
    generation: u64,
}

struct Inner {
    store: SessionStore,
    clock: Arc<dyn Clock>,
    authenticator: Authenticator,
    issuer: TokenIssuer,
    orchestrator: Arc<RefreshOrchestrator>,
    server: MockResourceServer,
    check_interval: Duration,
    state: RwLock<State>,
    checker: Mutex<Option<CancelHandle>>,
}

/// Owns the client session: login, logout, restore, API calls and the
/// periodic refresh check.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("check_interval", &self.inner.check_interval)
            .field("server", &self.inner.server)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Manager persisting to `kv`, with every policy taken from `config`.
    pub fn new(kv: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, config: &Config) -> Result<Self> {
        config.validate()?;
        let orchestrator = Arc::new(RefreshOrchestrator::from_config(config));
        let server = MockResourceServer::from_config(config, Arc::clone(&orchestrator))?;
        Ok(Self::assemble(kv, clock, config, orchestrator, server))
    }

    /// Like [`new`](Self::new) but serving calls from `server`, e.g. one with
    /// a seeded random source.
    pub fn with_resource_server(
        kv: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: &Config,
        server: MockResourceServer,
    ) -> Result<Self> {
        config.validate()?;
        let orchestrator = Arc::new(RefreshOrchestrator::from_config(config));
        Ok(Self::assemble(kv, clock, config, orchestrator, server))
    }

    fn assemble(
        kv: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: &Config,
        orchestrator: Arc<RefreshOrchestrator>,
        server: MockResourceServer,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: SessionStore::new(kv),
                clock,
                authenticator: Authenticator::default(),
                issuer: TokenIssuer::from_policy(&config.tokens),
                orchestrator,
                server,
                check_interval: config.tokens.check_interval(),
                state: RwLock::new(State::default()),
                checker: Mutex::new(None),
            }),
        }
    }

    /// Authenticate, issue a fresh pair and make it the current session.
    ///
    /// Replaces any existing session and restarts the periodic check.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair> {
        info!(email, "Login attempt");
        let identity = self
            .inner
            .authenticator
            .authenticate(&Credentials::new(email, password))?;

        let now = self.inner.clock.now();
        let tokens = self.inner.issuer.issue(&identity, now)?;
        let session = Session {
            identity,
            tokens: tokens.clone(),
        };

        self.stop_periodic_check();
        self.inner.install(session).await?;
        self.start_periodic_check();

        info!(email, "Login successful");
        Ok(tokens)
    }

    /// Cancel the periodic check and clear the session, in memory and on
    /// disk. Safe to call when already logged out.
    pub async fn logout(&self) -> Result<()> {
        self.stop_periodic_check();

        let mut state = self.inner.state.write().await;
        state.session = None;
        state.generation += 1;
        self.inner.store.clear()?;
        info!("Logged out");
        Ok(())
    }

    /// Pick up a persisted session, refreshing it first if only the refresh
    /// token is still usable. Starts the periodic check when a session
    /// results.
    pub async fn restore(&self) -> Result<Option<Session>> {
        let now = self.inner.clock.now();
        let session = match self.inner.store.load(now) {
            LoadOutcome::Active(session) => {
                info!(sub = %session.identity.id, "Restored stored session");
                session
            }
            LoadOutcome::RefreshRequired(refresh_token) => {
                info!("Stored access token unusable, refreshing");
                match self.inner.orchestrator.refresh(&refresh_token, now).await {
                    Ok(tokens) => Session::from_tokens(tokens)?,
                    Err(e) => {
                        warn!(error = %e, "Refresh on restore failed");
                        self.inner.store.clear()?;
                        return Ok(None);
                    }
                }
            }
            LoadOutcome::Absent => {
                debug!("No stored session");
                self.inner.store.clear()?;
                return Ok(None);
            }
        };

        self.stop_periodic_check();
        self.inner.install(session.clone()).await?;
        self.start_periodic_check();
        Ok(Some(session))
    }

    /// Call `endpoint` with the held tokens. A pair refreshed during the call
    /// becomes the current session.
    ///
    /// Fails only if a refreshed pair could not be persisted; the held
    /// session is then left as it was.
    pub async fn call_endpoint(&self, endpoint: Endpoint) -> Result<ApiResponse> {
        let snapshot = self.inner.snapshot().await;
        let (generation, access, refresh) = match &snapshot {
            Some(s) => (
                s.generation,
                Some(s.session.access_token()),
                s.session.refresh_token(),
            ),
            None => (0, None, None),
        };

        let now = self.inner.clock.now();
        let response = self.inner.server.call(endpoint, access, refresh, now).await;

        if let Some(tokens) = &response.new_tokens {
            if self.inner.commit(generation, tokens.clone()).await? {
                info!(%endpoint, "Session updated with tokens refreshed during call");
            }
        }
        Ok(response)
    }

    /// Run the periodic check once, right now.
    pub async fn check_tokens(&self) -> CheckOutcome {
        let target = ManagerTarget {
            inner: Arc::downgrade(&self.inner),
        };
        self.inner.orchestrator.check(&target).await
    }

    /// Seconds until `token` expires, at the manager's clock.
    pub fn remaining_seconds(&self, token: &str) -> i64 {
        crate::token::remaining_seconds(token, self.inner.clock.now())
    }

    pub async fn token_status(&self) -> TokenStatus {
        let state = self.inner.state.read().await;
        let Some(session) = &state.session else {
            return TokenStatus::default();
        };
        TokenStatus {
            access_remaining: Some(self.remaining_seconds(session.access_token())),
            refresh_remaining: session.refresh_token().map(|t| self.remaining_seconds(t)),
        }
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.inner.state.read().await.session.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.state.read().await.session.is_some()
    }

    /// Whether the periodic check is currently scheduled.
    pub fn is_checking(&self) -> bool {
        self.inner
            .checker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_cancelled())
    }

    fn start_periodic_check(&self) {
        let target = Arc::new(ManagerTarget {
            inner: Arc::downgrade(&self.inner),
        });
        let handle = self
            .inner
            .orchestrator
            .schedule_periodic_check(target, self.inner.check_interval);
        let previous = self
            .inner
            .checker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    fn stop_periodic_check(&self) {
        self.inner.stop_periodic_check();
    }
}

impl Inner {
    async fn snapshot(&self) -> Option<SessionSnapshot> {
        let state = self.state.read().await;
        state.session.clone().map(|session| SessionSnapshot {
            generation: state.generation,
            session,
        })
    }

    /// Persist `session` and make it current under a new generation.
    async fn install(&self, session: Session) -> Result<()> {
        let mut state = self.state.write().await;
        self.store.save(&session)?;
        state.session = Some(session);
        state.generation += 1;
        Ok(())
    }

    /// Replace the session with a refreshed pair if `generation` is still
    /// current. Last write wins among refreshes of the same generation.
    ///
    /// The pair is persisted before the in-memory session moves, so a failed
    /// write leaves both on the old pair.
    async fn commit(&self, generation: u64, tokens: TokenPair) -> Result<bool> {
        let session = Session::from_tokens(tokens)?;

        let mut state = self.state.write().await;
        if state.generation != generation || state.session.is_none() {
            debug!(
                generation,
                current = state.generation,
                "Discarding refresh for a replaced session"
            );
            return Ok(false);
        }
        self.store.save(&session)?;
        state.session = Some(session);
        Ok(true)
    }

    async fn expire(&self, generation: u64, reason: &AuthError) {
        let mut state = self.state.write().await;
        if state.generation != generation {
            return;
        }
        state.session = None;
        state.generation += 1;
        // Still under the lock, so a login racing this cannot have started
        // its own check yet.
        self.stop_periodic_check();
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear expired session");
        }
        info!(%reason, "Session expired, login required");
    }

    fn stop_periodic_check(&self) {
        let handle = self
            .checker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.cancel();
            debug!("Periodic token check stopped");
        }
    }
}

/// What the periodic task holds. Weak, so a running check never keeps a
/// dropped manager alive.
struct ManagerTarget {
    inner: Weak<Inner>,
}

#[async_trait]
impl RefreshTarget for ManagerTarget {
    fn now(&self) -> i64 {
        self.inner.upgrade().map_or(0, |inner| inner.clock.now())
    }

    async fn snapshot(&self) -> Option<SessionSnapshot> {
        self.inner.upgrade()?.snapshot().await
    }

    async fn commit_refresh(&self, generation: u64, tokens: TokenPair) -> bool {
        match self.inner.upgrade() {
            Some(inner) => inner
                .commit(generation, tokens)
                .await
                .inspect_err(|e| warn!(error = %e, "Failed to commit refreshed session"))
                .unwrap_or(false),
            None => false,
        }
    }

    async fn expire(&self, generation: u64, reason: &AuthError) {
        if let Some(inner) = self.inner.upgrade() {
            inner.expire(generation, reason).await;
        }
    }
}
