//! Refresh orchestration: exchanging refresh tokens and the periodic check.
//!
//! The periodic check is proactive: it refreshes while the access token
//! still has a little life left instead of waiting for a call to fail.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AuthError, Result};
use crate::scheduler::{CancelHandle, schedule};
use crate::session::Session;
use crate::token::codec::decode_payload;
use crate::token::{REFRESH_THRESHOLD_SECS, TokenIssuer, TokenPair, is_valid, remaining_seconds};

/// A session as observed at one instant, tagged with the generation it
/// belonged to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub generation: u64,
    pub session: Session,
}

/// Whatever holds the live session the periodic check acts on.
///
/// The generation changes whenever the session is torn down or replaced by a
/// new login. Commits and expiries carry the generation of the snapshot they
/// were derived from, so a target can drop results computed for a session
/// that no longer exists.
#[async_trait]
pub trait RefreshTarget: Send + Sync {
    fn now(&self) -> i64;

    async fn snapshot(&self) -> Option<SessionSnapshot>;

    /// Install a refreshed pair. Returns `false` if the result was stale.
    async fn commit_refresh(&self, generation: u64, tokens: TokenPair) -> bool;

    /// The refresh token is no longer usable; tear the session down.
    async fn expire(&self, generation: u64, reason: &AuthError);
}

/// Result of one periodic tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    NoSession,
    NotNeeded { access_remaining: i64 },
    Refreshed,
    /// Refreshed, but the session changed meanwhile and the target refused it.
    Discarded,
    /// Refresh failed and the session was cleared.
    Expired(AuthError),
}

/// Exchanges refresh tokens for new pairs and decides when to do so.
#[derive(Debug, Clone)]
pub struct RefreshOrchestrator {
    issuer: TokenIssuer,
    threshold_secs: i64,
    latency: Duration,
}

impl Default for RefreshOrchestrator {
    fn default() -> Self {
        Self::new(TokenIssuer::default(), REFRESH_THRESHOLD_SECS, Duration::ZERO)
    }
}

impl RefreshOrchestrator {
    pub const fn new(issuer: TokenIssuer, threshold_secs: i64, latency: Duration) -> Self {
        Self {
            issuer,
            threshold_secs,
            latency,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            TokenIssuer::from_policy(&config.tokens),
            config.tokens.refresh_threshold_secs,
            config.simulation.latency(),
        )
    }

    /// Exchange `refresh_token` for a brand-new pair issued at `now`.
    ///
    /// Both tokens are replaced; the old refresh token's expiry is not
    /// carried over.
    pub async fn refresh(&self, refresh_token: &str, now: i64) -> Result<TokenPair> {
        info!("Attempting to refresh token");

        if !is_valid(refresh_token, now) {
            warn!("Refresh token is invalid or expired");
            return Err(AuthError::RefreshFailed(
                "refresh token is invalid or expired".into(),
            ));
        }
        let claims =
            decode_payload(refresh_token).map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let tokens = self.issuer.issue(&claims.identity(), now)?;
        info!(sub = %claims.sub, "Token refresh successful");
        Ok(tokens)
    }

    /// Whether `session` should be refreshed proactively at `now`.
    pub fn needs_refresh(&self, session: &Session, now: i64) -> bool {
        session.refresh_token().is_some()
            && remaining_seconds(session.access_token(), now) < self.threshold_secs
    }

    /// Run one check against `target`'s current session.
    pub async fn check<T: RefreshTarget + ?Sized>(&self, target: &T) -> CheckOutcome {
        let Some(SessionSnapshot {
            generation,
            session,
        }) = target.snapshot().await
        else {
            return CheckOutcome::NoSession;
        };

        let now = target.now();
        let access_remaining = remaining_seconds(session.access_token(), now);
        debug!(
            access_remaining,
            refresh_remaining = session
                .refresh_token()
                .map(|t| remaining_seconds(t, now)),
            "Periodic token status check"
        );

        if !self.needs_refresh(&session, now) {
            return CheckOutcome::NotNeeded { access_remaining };
        }
        let Some(refresh_token) = session.refresh_token() else {
            return CheckOutcome::NotNeeded { access_remaining };
        };

        info!(access_remaining, "Access token expiring soon, attempting refresh");
        match self.refresh(refresh_token, now).await {
            Ok(tokens) => {
                if target.commit_refresh(generation, tokens).await {
                    CheckOutcome::Refreshed
                } else {
                    CheckOutcome::Discarded
                }
            }
            Err(e) => {
                warn!(error = %e, "Periodic refresh failed, clearing session");
                target.expire(generation, &e).await;
                CheckOutcome::Expired(e)
            }
        }
    }

    /// Check `target` every `interval` until the returned handle is cancelled.
    ///
    /// Every tick reads a fresh snapshot, so replacing the session never
    /// leaves the timer acting on an old one.
    pub fn schedule_periodic_check<T>(
        self: &Arc<Self>,
        target: Arc<T>,
        interval: Duration,
    ) -> CancelHandle
    where
        T: RefreshTarget + 'static,
    {
        info!(interval_secs = interval.as_secs(), "Setting up token check interval");
        let orchestrator = Arc::clone(self);
        schedule(interval, move || {
            let orchestrator = Arc::clone(&orchestrator);
            let target = Arc::clone(&target);
            async move {
                let outcome = orchestrator.check(target.as_ref()).await;
                debug!(?outcome, "Token check finished");
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

    use tokio::sync::Mutex;

    use super::*;
    use crate::identity::Identity;

    fn tokens_at(now: i64) -> TokenPair {
        TokenIssuer::default()
            .issue(&Identity::test_user(), now)
            .unwrap()
    }

    /// Minimal in-memory target recording what the orchestrator did.
    #[derive(Default)]
    struct RecordingTarget {
        now: AtomicI64,
        generation: AtomicU64,
        session: Mutex<Option<Session>>,
        expired: Mutex<Vec<AuthError>>,
    }

    impl RecordingTarget {
        fn with_tokens(tokens: TokenPair, now: i64) -> Self {
            let target = Self::default();
            target.now.store(now, Ordering::SeqCst);
            *target.session.try_lock().unwrap() = Some(Session::from_tokens(tokens).unwrap());
            target
        }
    }

    #[async_trait]
    impl RefreshTarget for RecordingTarget {
        fn now(&self) -> i64 {
            self.now.load(Ordering::SeqCst)
        }

        async fn snapshot(&self) -> Option<SessionSnapshot> {
            let session = self.session.lock().await.clone()?;
            Some(SessionSnapshot {
                generation: self.generation.load(Ordering::SeqCst),
                session,
            })
        }

        async fn commit_refresh(&self, generation: u64, tokens: TokenPair) -> bool {
            if generation != self.generation.load(Ordering::SeqCst) {
                return false;
            }
            *self.session.lock().await = Some(Session::from_tokens(tokens).unwrap());
            true
        }

        async fn expire(&self, _generation: u64, reason: &AuthError) {
            *self.session.lock().await = None;
            self.expired.lock().await.push(reason.clone());
        }
    }

    #[tokio::test]
    async fn refresh_issues_new_pair_at_refresh_time() {
        let orchestrator = RefreshOrchestrator::default();
        let old = tokens_at(0);

        let new = orchestrator.refresh(&old.refresh_token, 31).await.unwrap();
        let access = decode_payload(&new.access_token).unwrap();
        let refresh = decode_payload(&new.refresh_token).unwrap();
        assert_eq!(access.exp, 61);
        assert_eq!(refresh.exp, 91);
        assert_ne!(new.refresh_token, old.refresh_token);
    }

    #[tokio::test]
    async fn expired_refresh_token_fails() {
        let orchestrator = RefreshOrchestrator::default();
        let old = tokens_at(0);
        let err = orchestrator
            .refresh(&old.refresh_token, 61)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed(_)));
    }

    #[tokio::test]
    async fn malformed_refresh_token_fails() {
        let err = RefreshOrchestrator::default()
            .refresh("abc", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed(_)));
    }

    #[tokio::test]
    async fn proactive_refresh_when_under_threshold() {
        // 8s left on the access token, 38s on the refresh token.
        let target = RecordingTarget::with_tokens(tokens_at(0), 22);
        let outcome = RefreshOrchestrator::default().check(&target).await;
        assert_eq!(outcome, CheckOutcome::Refreshed);

        let session = target.session.lock().await.clone().unwrap();
        assert_eq!(
            decode_payload(session.access_token()).unwrap().exp,
            22 + 30
        );
    }

    #[tokio::test]
    async fn no_refresh_with_time_to_spare() {
        let target = RecordingTarget::with_tokens(tokens_at(0), 20);
        let outcome = RefreshOrchestrator::default().check(&target).await;
        assert_eq!(
            outcome,
            CheckOutcome::NotNeeded {
                access_remaining: 10
            }
        );
    }

    #[tokio::test]
    async fn no_refresh_without_refresh_token() {
        let mut tokens = tokens_at(0);
        tokens.refresh_token.clear();
        let target = RecordingTarget::with_tokens(tokens, 25);
        let outcome = RefreshOrchestrator::default().check(&target).await;
        assert!(matches!(outcome, CheckOutcome::NotNeeded { .. }));
    }

    #[tokio::test]
    async fn failed_refresh_expires_session() {
        let target = RecordingTarget::with_tokens(tokens_at(0), 70);
        let outcome = RefreshOrchestrator::default().check(&target).await;
        assert!(matches!(outcome, CheckOutcome::Expired(AuthError::RefreshFailed(_))));
        assert!(target.session.lock().await.is_none());
        assert_eq!(target.expired.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn empty_target_is_a_no_op() {
        let target = RecordingTarget::default();
        let outcome = RefreshOrchestrator::default().check(&target).await;
        assert_eq!(outcome, CheckOutcome::NoSession);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_commit_is_discarded() {
        let orchestrator = RefreshOrchestrator::new(
            TokenIssuer::default(),
            REFRESH_THRESHOLD_SECS,
            Duration::from_secs(1),
        );
        let target = Arc::new(RecordingTarget::with_tokens(tokens_at(0), 25));

        let check = {
            let target = Arc::clone(&target);
            tokio::spawn(async move { orchestrator.check(target.as_ref()).await })
        };
        tokio::task::yield_now().await;
        // Session replaced while the refresh is in flight.
        target.generation.fetch_add(1, Ordering::SeqCst);

        assert_eq!(check.await.unwrap(), CheckOutcome::Discarded);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_check_refreshes_on_tick() {
        let orchestrator = Arc::new(RefreshOrchestrator::default());
        let target = Arc::new(RecordingTarget::with_tokens(tokens_at(0), 25));
        let original = target.session.lock().await.clone().unwrap();

        let handle =
            orchestrator.schedule_periodic_check(Arc::clone(&target), Duration::from_secs(15));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        tokio::time::advance(Duration::from_secs(15)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        handle.cancel();

        let current = target.session.lock().await.clone().unwrap();
        assert_ne!(current, original);
    }
}
