//! Session lifecycle
//!
//! [`SessionManager`] is the single owner of who is signed in. It restores
//! the persisted record at startup, runs login, registration, logout, and
//! profile refresh, and publishes every change as a [`SessionSnapshot`].
//!
//! # Example
//!
//! ```ignore
//! use academy_core::api::{ApiClient, Credentials};
//! use academy_core::session::SessionManager;
//! use academy_core::storage::open_store;
//!
//! let api = ApiClient::new(&config.api)?;
//! let store = open_store(&config.storage)?;
//! let session = SessionManager::launch(api, store).await;
//!
//! session
//!     .perform_login(&Credentials::new("marie", "secret"))
//!     .await?;
//! assert!(session.is_authenticated());
//! ```

mod manager;
mod state;

pub use manager::SessionManager;
pub use state::{RefreshOutcome, SessionPhase, SessionSnapshot};
