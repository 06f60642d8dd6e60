//! Resource subcommands: call an endpoint, watch the session live.

use std::io::{self, Write};
use std::time::Duration;

use tracing::info;

use authflow_core::{ApiResponse, AuthError, Endpoint, SessionManager};

use crate::auth_cmd::write_remaining;

/// Call `endpoint` with whatever session is stored.
pub async fn call(manager: &SessionManager, endpoint: Endpoint) -> anyhow::Result<()> {
    manager.restore().await?;
    let response = manager.call_endpoint(endpoint).await?;

    let mut out = io::stdout();
    write_response(&mut out, &response)?;
    match response.result {
        Ok(_) => Ok(()),
        Err(e) => Err(anyhow::anyhow!(failure_message(endpoint, &e))),
    }
}

fn failure_message(endpoint: Endpoint, error: &AuthError) -> String {
    if error.requires_login() {
        format!("{endpoint} call failed: {error}. Run `authflow login` to sign in again")
    } else {
        format!("{endpoint} call failed: {error}")
    }
}

pub fn write_response(out: &mut impl Write, response: &ApiResponse) -> anyhow::Result<()> {
    if response.token_refreshed {
        writeln!(out, "Token refreshed during call")?;
    }
    if let Some(data) = response.data() {
        writeln!(out, "{}", serde_json::to_string_pretty(data)?)?;
    }
    Ok(())
}

/// Keep the session alive in the foreground, printing both countdowns every
/// `every` until `duration` elapses, the session expires or Ctrl-C.
pub async fn watch(
    manager: &SessionManager,
    duration: Duration,
    every: Duration,
) -> anyhow::Result<()> {
    let mut out = io::stdout();
    if manager.restore().await?.is_none() {
        writeln!(out, "Not logged in")?;
        return Ok(());
    }

    info!(secs = duration.as_secs(), "Watching session");
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);
    let mut ticker = tokio::time::interval(every);

    loop {
        tokio::select! {
            () = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = ticker.tick() => {
                if !manager.is_authenticated().await {
                    writeln!(out, "Session expired, please log in again")?;
                    break;
                }
                write_remaining(&mut out, manager.token_status().await)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use authflow_core::token::TokenIssuer;

    use super::*;

    fn render(response: &ApiResponse) -> String {
        let mut buf = Vec::new();
        write_response(&mut buf, response).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn success_prints_payload() {
        let response = ApiResponse {
            endpoint: Endpoint::Public,
            result: Ok(Endpoint::Public.mock_data()),
            token_refreshed: false,
            new_tokens: None,
        };
        let out = render(&response);
        assert!(out.contains("This is public data, no auth required"));
        assert!(!out.contains("refreshed"));
    }

    #[test]
    fn refresh_is_announced_even_on_failure() {
        let tokens = TokenIssuer::default()
            .issue(&authflow_core::Identity::test_user(), 0)
            .unwrap();
        let response = ApiResponse {
            endpoint: Endpoint::Admin,
            result: Err(AuthError::Forbidden("Insufficient permissions".into())),
            token_refreshed: true,
            new_tokens: Some(tokens),
        };
        assert_eq!(render(&response), "Token refreshed during call\n");
    }

    #[test]
    fn expired_session_failure_points_to_login() {
        let err = AuthError::Unauthenticated("Authentication expired, please log in again".into());
        let msg = failure_message(Endpoint::Protected, &err);
        assert!(msg.ends_with("Run `authflow login` to sign in again"));

        let denied = failure_message(
            Endpoint::Admin,
            &AuthError::Forbidden("Insufficient permissions".into()),
        );
        assert!(!denied.contains("authflow login"));
    }
}
