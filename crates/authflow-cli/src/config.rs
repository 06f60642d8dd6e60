//! CLI configuration management.
//!
//! Resolves the core configuration, layers command-line flags on top and
//! opens a session manager over the on-disk session directory
//! (`~/.authflow/session` unless overridden).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use authflow_core::config::load_config;
use authflow_core::{Config, FileStore, SessionManager, SystemClock};

/// Flags that override resolved configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// Explicit config file (`--config`).
    pub config_path: Option<PathBuf>,
    /// Session directory (`--state-dir`).
    pub state_dir: Option<PathBuf>,
}

impl CliOverrides {
    /// Resolve the full configuration: files, then environment, then flags.
    pub fn resolve(&self) -> anyhow::Result<Config> {
        let mut config = load_config(self.config_path.as_deref())?;
        if let Some(dir) = &self.state_dir {
            config.storage.state_dir = Some(dir.clone());
        }
        Ok(config)
    }
}

/// Directory the session slots live in.
pub fn state_dir(config: &Config) -> anyhow::Result<PathBuf> {
    config.storage.resolved_state_dir().ok_or_else(|| {
        anyhow::anyhow!("Cannot determine home directory. Use --state-dir <path>")
    })
}

/// Session manager persisting under `dir`, driven by the system clock.
pub fn open_manager(config: &Config, dir: &Path) -> anyhow::Result<SessionManager> {
    let manager = SessionManager::new(
        Arc::new(FileStore::new(dir)),
        Arc::new(SystemClock),
        config,
    )?;
    Ok(manager)
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn state_dir_flag_wins() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("settings.json");
        std::fs::write(
            &config_path,
            r#"{"storage": {"state_dir": "/from/file"}, "simulation": {"latency_ms": 250}}"#,
        )
        .unwrap();

        let overrides = CliOverrides {
            config_path: Some(config_path),
            state_dir: Some(dir.path().join("flag")),
        };
        let config = overrides.resolve().unwrap();
        assert_eq!(state_dir(&config).unwrap(), dir.path().join("flag"));
        assert_eq!(config.simulation.latency_ms, 250);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let overrides = CliOverrides {
            config_path: Some(PathBuf::from("/nonexistent/authflow.json")),
            state_dir: None,
        };
        let err = overrides.resolve().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/authflow.json"));
    }

    #[test]
    fn invalid_explicit_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("settings.json");
        std::fs::write(&config_path, r#"{"tokens": {"check_interval_secs": 0}}"#).unwrap();

        let overrides = CliOverrides {
            config_path: Some(config_path),
            state_dir: None,
        };
        assert!(overrides.resolve().is_err());
    }

    #[tokio::test]
    async fn manager_persists_under_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let manager = open_manager(&Config::default(), dir.path()).unwrap();
        manager.login("test@example.com", "password").await.unwrap();

        assert!(dir.path().join("access_token").exists());
        assert!(dir.path().join("auth_user").exists());
        manager.logout().await.unwrap();
        assert!(!dir.path().join("access_token").exists());
    }
}
