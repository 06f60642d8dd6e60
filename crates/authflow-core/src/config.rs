//! Configuration resolution for authflow.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults (the token contract constants)
//! 2. Global config (~/.config/authflow/settings.json)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (applied by the caller, highest priority)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};
use crate::token::{
    ACCESS_TTL_SECS, PERIODIC_CHECK_INTERVAL_SECS, REFRESH_THRESHOLD_SECS, REFRESH_TTL_SECS,
};

/// Complete authflow configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub tokens: TokenPolicy,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Token lifetimes and refresh policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenPolicy {
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
    /// Refresh proactively once the access token has less than this left.
    pub refresh_threshold_secs: i64,
    pub check_interval_secs: u64,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            access_ttl_secs: ACCESS_TTL_SECS,
            refresh_ttl_secs: REFRESH_TTL_SECS,
            refresh_threshold_secs: REFRESH_THRESHOLD_SECS,
            check_interval_secs: PERIODIC_CHECK_INTERVAL_SECS,
        }
    }
}

impl TokenPolicy {
    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

/// Knobs for the in-process mock server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Artificial delay applied to refreshes and resource calls.
    pub latency_ms: u64,
    /// Chance that the admin endpoint's policy check lets a caller through.
    pub admin_grant_probability: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            latency_ms: 0,
            admin_grant_probability: 0.5,
        }
    }
}

impl SimulationConfig {
    pub const fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

/// Where the session slots live on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Configured state directory, falling back to `~/.authflow/session`.
    pub fn resolved_state_dir(&self) -> Option<PathBuf> {
        self.state_dir.clone().or_else(default_state_dir)
    }
}

impl Config {
    /// Reject policies that would break the token lifecycle invariants.
    pub fn validate(&self) -> Result<()> {
        let t = &self.tokens;
        if t.access_ttl_secs <= 0 || t.refresh_ttl_secs <= 0 {
            return Err(AuthError::Config("token TTLs must be positive".into()));
        }
        if t.access_ttl_secs >= t.refresh_ttl_secs {
            return Err(AuthError::Config(format!(
                "access TTL ({}s) must be shorter than refresh TTL ({}s)",
                t.access_ttl_secs, t.refresh_ttl_secs
            )));
        }
        if t.refresh_threshold_secs < 0 || t.refresh_threshold_secs >= t.access_ttl_secs {
            return Err(AuthError::Config(format!(
                "refresh threshold ({}s) must be within the access TTL ({}s)",
                t.refresh_threshold_secs, t.access_ttl_secs
            )));
        }
        if t.check_interval_secs == 0 {
            return Err(AuthError::Config("check interval must be at least 1s".into()));
        }
        let p = self.simulation.admin_grant_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(AuthError::Config(format!(
                "admin grant probability {p} is outside [0, 1]"
            )));
        }
        Ok(())
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            config = load_config_file(&global_path)?;
        }
    }

    // An explicit file replaces the global one wholesale; every section
    // carries serde defaults so partial files are fine.
    if let Some(path) = explicit {
        config = load_config_file(path)?;
    }

    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".authflow").join("settings.json"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/authflow/settings.json"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("authflow").join("settings.json"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

/// Default directory for the persisted session slots: `~/.authflow/session`.
pub fn default_state_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".authflow").join("session"))
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AuthError::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        AuthError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn apply_env_overrides(config: &mut Config) {
    apply_overrides(config, |key| std::env::var(key).ok());
}

fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(n) = lookup("AUTHFLOW_ACCESS_TTL").and_then(|v| v.parse().ok()) {
        config.tokens.access_ttl_secs = n;
    }
    if let Some(n) = lookup("AUTHFLOW_REFRESH_TTL").and_then(|v| v.parse().ok()) {
        config.tokens.refresh_ttl_secs = n;
    }
    if let Some(n) = lookup("AUTHFLOW_REFRESH_THRESHOLD").and_then(|v| v.parse().ok()) {
        config.tokens.refresh_threshold_secs = n;
    }
    if let Some(n) = lookup("AUTHFLOW_CHECK_INTERVAL").and_then(|v| v.parse().ok()) {
        config.tokens.check_interval_secs = n;
    }
    if let Some(n) = lookup("AUTHFLOW_LATENCY_MS").and_then(|v| v.parse().ok()) {
        config.simulation.latency_ms = n;
    }
    if let Some(dir) = lookup("AUTHFLOW_STATE_DIR") {
        config.storage.state_dir = Some(PathBuf::from(dir));
    }
}
