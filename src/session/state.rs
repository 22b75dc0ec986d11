use serde::{Deserialize, Serialize};

use crate::types::User;

/// Authentication status of the running app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Not yet checked. Only valid before the first restore resolves.
    #[default]
    Unknown,
    Authenticated,
    Unauthenticated,
}

/// In-memory session snapshot.
///
/// Fields are private so the pairing invariants hold by construction:
/// `user` and `token` are present iff `status` is `Authenticated`, and
/// `resolved` is false only while `status` is `Unknown`.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Session {
    status: SessionStatus,
    token: Option<String>,
    refresh_token: Option<String>,
    user: Option<User>,
    resolved: bool,
}

impl Session {
    pub(super) fn authenticated(token: String, refresh_token: Option<String>, user: User) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            token: Some(token),
            refresh_token,
            user: Some(user),
            resolved: true,
        }
    }

    pub(super) fn unauthenticated() -> Self {
        Self {
            status: SessionStatus::Unauthenticated,
            resolved: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    /// Whether the cold-start restore (or a login/logout) has settled the session.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }
}

// Credentials never reach logs.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("status", &self.status)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("user", &self.user)
            .field("resolved", &self.resolved)
            .finish()
    }
}
