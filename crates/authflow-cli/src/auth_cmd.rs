//! Auth subcommands: login, logout, status.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::{self, Write};

use authflow_core::{Session, SessionManager, TokenStatus};

pub async fn login(manager: &SessionManager, email: &str, password: &str) -> anyhow::Result<()> {
    let tokens = manager
        .login(email, password)
        .await
        .map_err(|e| anyhow::anyhow!("Login failed: {e}"))?;

    let mut out = io::stdout();
    writeln!(out, "Logged in as {email}")?;
    writeln!(
        out,
        "Access token valid for {}s, refresh token for {}s",
        manager.remaining_seconds(&tokens.access_token),
        manager.remaining_seconds(&tokens.refresh_token)
    )?;
    Ok(())
}

pub async fn logout(manager: &SessionManager) -> anyhow::Result<()> {
    manager.logout().await?;
    let mut out = io::stdout();
    writeln!(out, "Logged out")?;
    Ok(())
}

/// Restore the stored session (refreshing it if needed) and describe it.
pub async fn status(manager: &SessionManager) -> anyhow::Result<()> {
    let session = manager.restore().await?;
    let status = manager.token_status().await;
    write_status(&mut io::stdout(), session.as_ref(), status)?;
    Ok(())
}

pub fn write_status(
    out: &mut impl Write,
    session: Option<&Session>,
    status: TokenStatus,
) -> io::Result<()> {
    let Some(session) = session else {
        return writeln!(out, "Not logged in");
    };
    writeln!(
        out,
        "Logged in as: {} <{}>",
        session.identity.name, session.identity.email
    )?;
    writeln!(out, "User ID: {}", session.identity.id)?;
    writeln!(out, "Role: {}", session.identity.role)?;
    write_remaining(out, status)
}

/// One line with both countdowns.
pub fn write_remaining(out: &mut impl Write, status: TokenStatus) -> io::Result<()> {
    let fmt = |remaining: Option<i64>| {
        remaining.map_or_else(|| "none".to_string(), |s| format!("{s}s"))
    };
    writeln!(
        out,
        "Access token: {} | Refresh token: {}",
        fmt(status.access_remaining),
        fmt(status.refresh_remaining)
    )
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use authflow_core::Identity;
    use authflow_core::token::TokenIssuer;

    use super::*;

    fn render(session: Option<&Session>, status: TokenStatus) -> String {
        let mut buf = Vec::new();
        write_status(&mut buf, session, status).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn logged_out_status() {
        assert_eq!(render(None, TokenStatus::default()), "Not logged in\n");
    }

    #[test]
    fn logged_in_status_shows_identity_and_countdowns() {
        let tokens = TokenIssuer::default()
            .issue(&Identity::test_user(), 0)
            .unwrap();
        let session = Session::from_tokens(tokens).unwrap();
        let out = render(
            Some(&session),
            TokenStatus {
                access_remaining: Some(12),
                refresh_remaining: None,
            },
        );

        assert!(out.contains("Logged in as: Test User <test@example.com>"));
        assert!(out.contains("Role: user"));
        assert!(out.contains("Access token: 12s | Refresh token: none"));
    }
}
