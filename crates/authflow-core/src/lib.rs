//! `Authflow` Core Library
//!
//! Client-side token lifecycle against an in-process mock backend:
//! - JWT-shaped token codec, issuer and verifier
//! - Persisted session slots over a pluggable key-value store
//! - Refresh orchestration, on demand and on a periodic timer
//! - A mock resource server with public, protected and admin endpoints
//!
//! Token signatures are placeholders. Nothing here is fit to guard real data.

pub mod clock;
pub mod config;
pub mod error;
pub mod identity;
pub mod refresh;
pub mod resource;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod token;
pub mod tracing_init;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{AuthError, Result};
pub use identity::{Credentials, Identity};
pub use refresh::{CheckOutcome, RefreshOrchestrator};
pub use resource::{ApiResponse, Endpoint, MockResourceServer};
pub use scheduler::{CancelHandle, schedule};
pub use session::{Session, SessionManager, TokenStatus};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use token::{TokenPair, is_valid, remaining_seconds};
