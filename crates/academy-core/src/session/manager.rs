//! Session manager for orchestrating the sign-in lifecycle
//!
//! Owns the authoritative session, keeps the API client's in-memory token in
//! step with it, and mirrors it into the persisted record.
//!
//! Concurrency: login and logout bump a generation counter when they start,
//! refresh captures it. Every commit (storage writes plus the in-memory
//! update) runs under one mutex after re-checking the generation, and a
//! commit that replaces or clears the session bumps it again. A late refresh
//! can therefore neither bring back a logged-out session nor overwrite a
//! newer login. Refresh sends its token per request and only hands it to the
//! shared API client when it commits.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::{Mutex, OnceCell, watch};
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, Credentials, RegisterRequest, User};
use crate::error::{Error, Result};
use crate::storage::{KeyValueStore, TOKEN_KEY, USER_KEY};

use super::state::{RefreshOutcome, SessionSnapshot};

/// What the persisted record held at startup
enum Restored {
    Empty,
    TokenOnly(String),
    Complete(String, User),
    CorruptUser(String),
}

/// Manager for session lifecycle operations
///
/// Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Shared>,
}

struct Shared {
    api: ApiClient,
    store: Arc<dyn KeyValueStore>,
    state: watch::Sender<SessionSnapshot>,
    init: OnceCell<()>,
    generation: AtomicU64,
    in_flight: AtomicUsize,
    /// Held while storage and in-memory state are being committed
    commit: Mutex<()>,
    /// Held for the whole of a refresh
    refresh_gate: Mutex<()>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("api", &self.inner.api)
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}

/// Keeps `is_loading` raised while an operation runs
struct LoadingGuard<'a> {
    manager: &'a SessionManager,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.manager.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.manager.publish(|_| {});
    }
}

impl SessionManager {
    /// Create a manager in the uninitialized state
    ///
    /// The persisted record is read on the first call to [`ready`](Self::ready)
    /// or to any operation.
    pub fn new(api: ApiClient, store: Arc<dyn KeyValueStore>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::uninitialized());
        Self {
            inner: Arc::new(Shared {
                api,
                store,
                state,
                init: OnceCell::new(),
                generation: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
                commit: Mutex::new(()),
                refresh_gate: Mutex::new(()),
            }),
        }
    }

    /// Create a manager and restore the persisted session before returning
    pub async fn launch(api: ApiClient, store: Arc<dyn KeyValueStore>) -> Self {
        let manager = Self::new(api, store);
        manager.ready().await;
        manager
    }

    /// Create a manager and restore the persisted session in the background
    ///
    /// Observers see `is_loading` until the restore finishes. Must be called
    /// from within a Tokio runtime.
    pub fn spawn(api: ApiClient, store: Arc<dyn KeyValueStore>) -> Self {
        let manager = Self::new(api, store);
        let background = manager.clone();
        tokio::spawn(async move { background.ready().await });
        manager
    }

    /// Wait until initialization has run; it runs exactly once
    pub async fn ready(&self) {
        self.inner.init.get_or_init(|| self.initialize()).await;
    }

    /// The shared API client, carrying the session's token
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    // ========== Observed state ==========

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Receive every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn user(&self) -> Option<User> {
        self.inner.state.borrow().user.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.inner.state.borrow().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading
    }

    // ========== Lifecycle ==========

    async fn initialize(&self) {
        let _loading = self.begin_operation();
        info!("Initializing session");

        let restored = self.restore().await;
        let mut repair_token = None;
        {
            let _commit = self.inner.commit.lock().await;
            match restored {
                Ok(Restored::Empty) => {
                    info!("No token found in storage");
                    self.inner.api.clear_token();
                    self.publish(|s| {
                        s.user = None;
                        s.token = None;
                        s.persisted = true;
                    });
                }
                Ok(Restored::Complete(token, user)) => {
                    info!(user_id = user.id, username = %user.username, "Restored session from storage");
                    self.inner.api.set_token(Some(&token));
                    self.publish(|s| {
                        s.user = Some(user);
                        s.token = Some(token);
                        s.persisted = true;
                    });
                }
                Ok(Restored::TokenOnly(token)) => {
                    // Anonymous until the server vouches for the token
                    warn!("Stored token has no user record, refreshing from server");
                    self.inner.api.clear_token();
                    self.publish(|s| {
                        s.user = None;
                        s.token = None;
                        s.persisted = false;
                    });
                    repair_token = Some(token);
                }
                Ok(Restored::CorruptUser(reason)) => {
                    error!(reason = %reason, "Failed to parse stored user record, clearing session");
                    self.clear_locked().await;
                }
                Err(e) => {
                    // Storage is left as it is; only memory is reset
                    error!(error = %e, "Error during session initialization");
                    self.inner.api.clear_token();
                    self.publish(|s| {
                        s.user = None;
                        s.token = None;
                        s.persisted = false;
                    });
                }
            }
        }

        if let Some(token) = repair_token {
            match self.refresh_inner(Some(token)).await {
                Ok(outcome) => debug!(?outcome, "Startup refresh finished"),
                Err(e) => warn!(error = %e, "Startup refresh failed, keeping stored token"),
            }
        }

        self.publish(|s| s.initialized = true);
        info!(authenticated = self.is_authenticated(), "Session initialization finished");
    }

    async fn restore(&self) -> Result<Restored> {
        let token = self
            .inner
            .store
            .get(TOKEN_KEY)
            .await?
            .filter(|t| !t.trim().is_empty());
        let Some(token) = token else {
            return Ok(Restored::Empty);
        };

        match self.inner.store.get(USER_KEY).await? {
            None => Ok(Restored::TokenOnly(token)),
            Some(raw) => match serde_json::from_str::<User>(&raw) {
                Ok(user) => Ok(Restored::Complete(token, user)),
                Err(e) => Ok(Restored::CorruptUser(e.to_string())),
            },
        }
    }

    /// Sign in with credentials
    ///
    /// On any failure the session is cleared and the error is returned for
    /// the caller to show. The caller validates that both fields are
    /// non-empty.
    pub async fn perform_login(&self, credentials: &Credentials) -> Result<()> {
        self.ready().await;
        let _loading = self.begin_operation();
        let generation = self.bump_generation();
        info!(login = %credentials.username_or_email, "Performing login");

        let auth = match self.inner.api.login(credentials).await {
            Ok(auth) => auth,
            Err(e) => {
                warn!(status = ?e.status(), error = %e.message(), "Login failed");
                let _commit = self.inner.commit.lock().await;
                if self.is_current(generation) {
                    self.clear_locked().await;
                }
                return Err(e);
            }
        };

        let _commit = self.inner.commit.lock().await;
        if !self.is_current(generation) {
            warn!(user_id = auth.user_id, "Login overtaken by a newer session change, discarding");
            return Err(Error::Superseded);
        }
        self.bump_generation();

        let user = auth.user();
        let persisted = self.persist(&auth.token, &user).await;
        self.inner.api.set_token(Some(&auth.token));
        info!(user_id = user.id, username = %user.username, persisted, "User logged in");
        let token = auth.token.clone();
        self.publish(|s| {
            s.user = Some(user);
            s.token = Some(token);
            s.persisted = persisted;
        });
        Ok(())
    }

    /// Create an account
    ///
    /// Does not sign in; the server expects a separate login afterwards.
    pub async fn register(&self, request: &RegisterRequest) -> Result<()> {
        self.ready().await;
        let _loading = self.begin_operation();
        info!(username = %request.username, "Performing registration");

        match self.inner.api.register(request).await {
            Ok(()) => {
                info!(username = %request.username, "Registration successful");
                Ok(())
            }
            Err(e) => {
                warn!(status = ?e.status(), error = %e.message(), "Registration failed");
                Err(e)
            }
        }
    }

    /// Sign out
    ///
    /// The server call is best effort; local cleanup always happens.
    pub async fn logout(&self) {
        self.ready().await;
        let _loading = self.begin_operation();
        let generation = self.bump_generation();
        info!("Performing logout");

        if self.inner.api.has_token() {
            if let Err(e) = self.inner.api.logout().await {
                warn!(
                    status = ?e.status(),
                    error = %e.message(),
                    "Server logout failed, proceeding with client-side logout"
                );
            }
        } else {
            debug!("No token held, skipping server logout");
        }

        let _commit = self.inner.commit.lock().await;
        if !self.is_current(generation) {
            info!("Session changed during logout, keeping the newer state");
            return;
        }
        self.clear_locked().await;
        info!("User logged out");
    }

    /// Refresh the user profile from the server, logging any failure
    pub async fn refresh_user_data(&self) {
        match self.try_refresh_user_data().await {
            Ok(outcome) => debug!(?outcome, "Refresh finished"),
            Err(e) => warn!(status = ?e.status(), error = %e.message(), "Failed to refresh user data"),
        }
    }

    /// Refresh the user profile with the session's token
    ///
    /// A 401 clears the session and reports [`RefreshOutcome::LoggedOut`].
    /// Other failures leave the session untouched and are returned. If a
    /// login or logout commits while the request is out, the result is
    /// dropped and [`RefreshOutcome::Discarded`] is reported.
    pub async fn try_refresh_user_data(&self) -> Result<RefreshOutcome> {
        self.ready().await;
        self.refresh_inner(None).await
    }

    /// Refresh the user profile with an explicit token
    pub async fn try_refresh_with_token(&self, token: &str) -> Result<RefreshOutcome> {
        self.ready().await;
        let token = Some(token.to_string()).filter(|t| !t.trim().is_empty());
        match token {
            Some(token) => self.refresh_inner(Some(token)).await,
            None => self.refresh_inner(None).await,
        }
    }

    async fn refresh_inner(&self, explicit_token: Option<String>) -> Result<RefreshOutcome> {
        let Ok(_gate) = self.inner.refresh_gate.try_lock() else {
            debug!("Refresh already in flight, skipping");
            return Ok(RefreshOutcome::InFlight);
        };

        let Some(token) = explicit_token.or_else(|| self.token()) else {
            debug!("No token available, cannot refresh");
            // A user without a token is not a session
            self.publish(|s| {
                if s.token.is_none() {
                    s.user = None;
                }
            });
            return Ok(RefreshOutcome::NoToken);
        };

        let _loading = self.begin_operation();
        let generation = self.generation();
        debug!("Refreshing user data");

        match self.inner.api.current_user_as(&token).await {
            Ok(user) => {
                let _commit = self.inner.commit.lock().await;
                if !self.is_current(generation) {
                    debug!(user_id = user.id, "Session changed during refresh, discarding result");
                    return Ok(RefreshOutcome::Discarded);
                }

                let mut persisted = true;
                if self.token().as_deref() != Some(token.as_str()) {
                    persisted &= self.store_entry(TOKEN_KEY, &token).await;
                }
                persisted &= self.store_user(&user).await;
                self.inner.api.set_token(Some(&token));

                info!(user_id = user.id, username = %user.username, persisted, "User data refreshed");
                let fresh = user.clone();
                self.publish(|s| {
                    s.user = Some(fresh);
                    s.token = Some(token);
                    s.persisted = persisted;
                });
                Ok(RefreshOutcome::Refreshed(user))
            }
            Err(e) if e.is_unauthorized() => {
                {
                    let _commit = self.inner.commit.lock().await;
                    if !self.is_current(generation) {
                        debug!("Session changed during refresh, ignoring rejected token");
                        return Ok(RefreshOutcome::Discarded);
                    }
                    warn!("Token expired or invalid during refresh, logging out");
                    self.clear_locked().await;
                }

                if let Err(e) = self.inner.api.logout_as(&token).await {
                    debug!(status = ?e.status(), "Server logout of rejected token failed");
                }
                info!("User logged out");
                Ok(RefreshOutcome::LoggedOut)
            }
            // Transient failure; the session is kept as it is
            Err(e) => Err(e),
        }
    }

    // ========== Internals ==========

    fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    fn bump_generation(&self) -> u64 {
        self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    fn begin_operation(&self) -> LoadingGuard<'_> {
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        self.publish(|_| {});
        LoadingGuard { manager: self }
    }

    /// Apply a change and recompute `is_loading`
    fn publish(&self, change: impl FnOnce(&mut SessionSnapshot)) {
        let in_flight = self.inner.in_flight.load(Ordering::SeqCst);
        self.inner.state.send_if_modified(|state| {
            let before = state.clone();
            change(state);
            state.is_loading = in_flight > 0 || !state.initialized;
            *state != before
        });
    }

    /// Write token then user; the gap between the two writes is repaired at
    /// startup by refreshing a token that has no user record
    async fn persist(&self, token: &str, user: &User) -> bool {
        self.store_entry(TOKEN_KEY, token).await && self.store_user(user).await
    }

    async fn store_user(&self, user: &User) -> bool {
        match serde_json::to_string(user) {
            Ok(json) => self.store_entry(USER_KEY, &json).await,
            Err(e) => {
                error!(error = %e, "Failed to serialize user record");
                false
            }
        }
    }

    async fn store_entry(&self, key: &str, value: &str) -> bool {
        match self.inner.store.set(key, value).await {
            Ok(()) => true,
            Err(e) => {
                error!(key, error = %e, "Failed to persist session entry, continuing in memory");
                false
            }
        }
    }

    /// Clear storage, API token, and memory. Caller holds the commit lock.
    async fn clear_locked(&self) {
        debug!("Clearing auth data from storage and state");
        self.bump_generation();
        let persisted = match self.inner.store.remove_many(&[TOKEN_KEY, USER_KEY]).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to clear persisted session");
                false
            }
        };
        self.inner.api.clear_token();
        self.publish(|s| {
            s.user = None;
            s.token = None;
            s.persisted = persisted;
        });
    }
}
