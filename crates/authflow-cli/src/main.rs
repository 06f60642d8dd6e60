//! Authflow CLI
//!
//! Log in against the mock backend, inspect token lifetimes and call the
//! mock resource server. The session persists between invocations.

mod api_cmd;
mod auth_cmd;
mod config;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use authflow_core::Endpoint;
use authflow_core::tracing_init::init_tracing;

use crate::config::{CliOverrides, open_manager, state_dir};

#[derive(Parser, Debug)]
#[command(name = "authflow")]
#[command(
    version,
    about = "authflow - JWT session lifecycle with automatic refresh",
    long_about = None
)]
struct Cli {
    /// Explicit config file (JSON).
    #[arg(long, global = true, env = "AUTHFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the persisted session.
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store a fresh token pair.
    Login {
        /// Email.
        #[arg(short, long)]
        email: String,
        /// Password.
        #[arg(short, long)]
        password: String,
    },
    /// Clear the stored session.
    Logout,
    /// Show the current session and token lifetimes.
    Status,
    /// Call a mock endpoint: public, protected or admin.
    Call {
        endpoint: Endpoint,
    },
    /// Keep the session refreshed in the foreground and print countdowns.
    Watch {
        /// Seconds to keep watching.
        #[arg(long, default_value_t = 60)]
        duration: u64,
        /// Seconds between status lines.
        #[arg(long, default_value_t = 1)]
        every: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing("authflow_core=warn,authflow=warn", cli.log_json);

    let overrides = CliOverrides {
        config_path: cli.config,
        state_dir: cli.state_dir,
    };
    let config = overrides.resolve()?;
    let dir = state_dir(&config)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        state_dir = %dir.display(),
        "Starting authflow"
    );
    let manager = open_manager(&config, &dir)?;

    match cli.command {
        Command::Login { email, password } => auth_cmd::login(&manager, &email, &password).await,
        Command::Logout => auth_cmd::logout(&manager).await,
        Command::Status => auth_cmd::status(&manager).await,
        Command::Call { endpoint } => api_cmd::call(&manager, endpoint).await,
        Command::Watch { duration, every } => {
            api_cmd::watch(
                &manager,
                Duration::from_secs(duration),
                Duration::from_secs(every.max(1)),
            )
            .await
        }
    }
}
