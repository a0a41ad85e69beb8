//! Academy Core Library
//!
//! Client-side session and API layer for the Plasturgie-Nous Academy
//! training platform:
//! - REST request client with bearer-token injection and error normalization
//! - Session manager (login, registration, logout, profile refresh)
//! - Persisted session storage (OS keyring, file, or memory)
//! - Configuration loading

pub mod api;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::api::{ApiClient, Credentials, RegisterRequest, Role, User};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::session::{RefreshOutcome, SessionManager, SessionSnapshot};
    pub use crate::storage::{KeyValueStore, open_store};
}
