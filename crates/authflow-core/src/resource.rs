//! In-process mock of a resource server with three endpoints.
//!
//! The server never touches session state. When it refreshes on the caller's
//! behalf it hands the new pair back in the response for the caller to
//! commit.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::distributions::{Bernoulli, Distribution};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AuthError, Result};
use crate::refresh::RefreshOrchestrator;
use crate::token::{TokenPair, is_valid};

const MSG_AUTH_REQUIRED: &str = "Authentication required";
const MSG_AUTH_EXPIRED: &str = "Authentication expired, please log in again";
const MSG_NEW_TOKEN_INVALID: &str = "New token validation failed";
const MSG_FORBIDDEN: &str = "Insufficient permissions";

/// The three mock endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    /// No token required.
    Public,
    /// Any valid access token.
    Protected,
    /// Valid access token plus a coin flip standing in for a role check.
    Admin,
}

impl Endpoint {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Protected => "protected",
            Self::Admin => "admin",
        }
    }

    pub const fn requires_auth(self) -> bool {
        !matches!(self, Self::Public)
    }

    /// Fixed payload returned on success.
    pub fn mock_data(self) -> Value {
        let message = match self {
            Self::Public => "This is public data, no auth required",
            Self::Protected => "This is protected data, authenticated user access only",
            Self::Admin => "This is admin data, admin role required",
        };
        json!({ "message": message })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "protected" => Ok(Self::Protected),
            "admin" => Ok(Self::Admin),
            other => Err(format!(
                "unknown endpoint '{other}' (expected public, protected or admin)"
            )),
        }
    }
}

/// What one call produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub endpoint: Endpoint,
    pub result: std::result::Result<Value, AuthError>,
    /// A refresh happened during this call.
    pub token_refreshed: bool,
    /// Pair issued by that refresh. Present even if the retry then failed.
    pub new_tokens: Option<TokenPair>,
}

impl ApiResponse {
    fn plain(endpoint: Endpoint, result: std::result::Result<Value, AuthError>) -> Self {
        Self {
            endpoint,
            result,
            token_refreshed: false,
            new_tokens: None,
        }
    }

    fn refreshed(
        endpoint: Endpoint,
        result: std::result::Result<Value, AuthError>,
        tokens: TokenPair,
    ) -> Self {
        Self {
            endpoint,
            result,
            token_refreshed: true,
            new_tokens: Some(tokens),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn data(&self) -> Option<&Value> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&AuthError> {
        self.result.as_ref().err()
    }
}

/// Serves the mock endpoints.
pub struct MockResourceServer {
    orchestrator: Arc<RefreshOrchestrator>,
    admin_policy: Bernoulli,
    rng: Mutex<Box<dyn RngCore + Send>>,
    latency: Duration,
}

impl fmt::Debug for MockResourceServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockResourceServer")
            .field("admin_policy", &self.admin_policy)
            .field("latency", &self.latency)
            .finish_non_exhaustive()
    }
}

impl MockResourceServer {
    /// Server seeded from OS entropy.
    pub fn new(
        orchestrator: Arc<RefreshOrchestrator>,
        admin_grant_probability: f64,
        latency: Duration,
    ) -> Result<Self> {
        Self::with_rng(
            orchestrator,
            admin_grant_probability,
            latency,
            StdRng::from_entropy(),
        )
    }

    /// Server whose admin decisions come from `rng`.
    pub fn with_rng(
        orchestrator: Arc<RefreshOrchestrator>,
        admin_grant_probability: f64,
        latency: Duration,
        rng: impl RngCore + Send + 'static,
    ) -> Result<Self> {
        let admin_policy = Bernoulli::new(admin_grant_probability).map_err(|e| {
            AuthError::Config(format!(
                "admin grant probability {admin_grant_probability}: {e}"
            ))
        })?;
        Ok(Self {
            orchestrator,
            admin_policy,
            rng: Mutex::new(Box::new(rng)),
            latency,
        })
    }

    pub fn from_config(config: &Config, orchestrator: Arc<RefreshOrchestrator>) -> Result<Self> {
        Self::new(
            orchestrator,
            config.simulation.admin_grant_probability,
            config.simulation.latency(),
        )
    }

    /// Serve `endpoint` for the given tokens at `now`.
    ///
    /// An expired access token with a valid refresh token is refreshed and the
    /// call retried once; the response then carries the new pair. The retry
    /// only re-checks the new token's expiry and skips the admin policy.
    pub async fn call(
        &self,
        endpoint: Endpoint,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
        now: i64,
    ) -> ApiResponse {
        info!(%endpoint, "Handling API call");
        self.simulate_latency().await;

        if !endpoint.requires_auth() {
            return ApiResponse::plain(endpoint, Ok(endpoint.mock_data()));
        }

        let Some(access_token) = access_token.filter(|t| !t.is_empty()) else {
            warn!(%endpoint, "No access token");
            return ApiResponse::plain(
                endpoint,
                Err(AuthError::Unauthenticated(MSG_AUTH_REQUIRED.into())),
            );
        };

        if is_valid(access_token, now) {
            return ApiResponse::plain(endpoint, self.authorize(endpoint));
        }

        info!(%endpoint, "Access token invalid, trying refresh");
        let Some(refresh_token) = refresh_token.filter(|t| !t.is_empty()) else {
            warn!(%endpoint, "No refresh token available");
            return ApiResponse::plain(
                endpoint,
                Err(AuthError::Unauthenticated(MSG_AUTH_EXPIRED.into())),
            );
        };

        match self.orchestrator.refresh(refresh_token, now).await {
            Ok(tokens) => {
                let result = self.retry(endpoint, &tokens.access_token, now).await;
                ApiResponse::refreshed(endpoint, result, tokens)
            }
            Err(e) => {
                warn!(%endpoint, error = %e, "Refresh during API call failed");
                ApiResponse::plain(
                    endpoint,
                    Err(AuthError::Unauthenticated(MSG_AUTH_EXPIRED.into())),
                )
            }
        }
    }

    async fn retry(
        &self,
        endpoint: Endpoint,
        access_token: &str,
        now: i64,
    ) -> std::result::Result<Value, AuthError> {
        info!(%endpoint, "Retrying API call with new token");
        self.simulate_latency().await;
        if !is_valid(access_token, now) {
            warn!(%endpoint, "Refreshed access token failed validation");
            return Err(AuthError::Unauthenticated(MSG_NEW_TOKEN_INVALID.into()));
        }
        Ok(endpoint.mock_data())
    }

    /// Endpoint policy once a valid token is in hand. The admin decision
    /// ignores the role claim entirely.
    fn authorize(&self, endpoint: Endpoint) -> std::result::Result<Value, AuthError> {
        if endpoint == Endpoint::Admin {
            let granted = {
                let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
                self.admin_policy.sample(&mut *rng)
            };
            debug!(granted, "Admin policy decision");
            if !granted {
                warn!("Admin access denied");
                return Err(AuthError::Forbidden(MSG_FORBIDDEN.into()));
            }
        }
        Ok(endpoint.mock_data())
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}
