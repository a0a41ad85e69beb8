//! Observable session state
//!
//! Defines the snapshot the UI layer reads and the phases derived from it.

use std::fmt;

use crate::api::User;

/// Coarse lifecycle phase, derived from a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Persisted record not loaded yet
    Uninitialized,
    /// No signed-in user; neither user nor token is held
    Anonymous,
    /// User and token both present
    Authenticated,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Anonymous => "anonymous",
            Self::Authenticated => "authenticated",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only copy of the session
///
/// `is_authenticated` and `phase` are computed from the fields every time;
/// nothing stores them.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub token: Option<String>,
    /// True while any auth operation runs, and before initialization ends
    pub is_loading: bool,
    /// Initialization has finished
    pub initialized: bool,
    /// The persisted record matches this state
    pub persisted: bool,
}

impl SessionSnapshot {
    /// State before the persisted record is read
    pub fn uninitialized() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.token.is_some()
    }

    pub fn phase(&self) -> SessionPhase {
        if !self.initialized {
            SessionPhase::Uninitialized
        } else if self.is_authenticated() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Anonymous
        }
    }
}

impl fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("phase", &self.phase())
            .field("user", &self.user)
            .field("has_token", &self.token.is_some())
            .field("is_loading", &self.is_loading)
            .field("persisted", &self.persisted)
            .finish()
    }
}

/// What a refresh ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Fresh profile adopted and stored
    Refreshed(User),
    /// No token to refresh with
    NoToken,
    /// Another refresh was already running
    InFlight,
    /// A login or logout happened meanwhile; the result was dropped
    Discarded,
    /// The server rejected the token and the session was cleared
    LoggedOut,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Role;

    fn user() -> User {
        User {
            id: 1,
            username: "marie".to_string(),
            email: "marie@example.com".to_string(),
            role: Role::Learner,
        }
    }

    #[test]
    fn test_uninitialized_is_loading() {
        let snapshot = SessionSnapshot::uninitialized();
        assert!(snapshot.is_loading);
        assert_eq!(snapshot.phase(), SessionPhase::Uninitialized);
        assert!(!snapshot.is_authenticated());
    }

    #[test]
    fn test_authenticated_needs_user_and_token() {
        let mut snapshot = SessionSnapshot {
            initialized: true,
            ..SessionSnapshot::default()
        };
        assert_eq!(snapshot.phase(), SessionPhase::Anonymous);

        snapshot.token = Some("abc".to_string());
        assert!(!snapshot.is_authenticated());

        snapshot.user = Some(user());
        assert!(snapshot.is_authenticated());
        assert_eq!(snapshot.phase(), SessionPhase::Authenticated);

        snapshot.token = None;
        assert!(!snapshot.is_authenticated());
    }

    #[test]
    fn test_debug_hides_token() {
        let snapshot = SessionSnapshot {
            user: Some(user()),
            token: Some("super-secret".to_string()),
            initialized: true,
            ..SessionSnapshot::default()
        };
        let debug = format!("{:?}", snapshot);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("has_token: true"));
    }
}
