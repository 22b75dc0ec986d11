use tokio::sync::{Mutex, OnceCell, watch};

use super::state::Session;
use super::traits::{IdentityVerifier, REFRESH_TOKEN_KEY, TOKEN_KEY, TokenStore};
use crate::types::User;

/// Owner of the authentication token lifecycle.
///
/// The only writer of persisted credentials. Everything else reads the
/// in-memory snapshot through [`session`](Self::session),
/// [`token`](Self::token) or a [`subscribe`](Self::subscribe) receiver.
///
/// ```rust,ignore
/// let manager = Arc::new(SessionManager::new(PlatformStore::detect(), client.clone()));
/// let guard = NavigationGuard::new(GuardConfig::default());
/// tokio::spawn(guard.run(manager.subscribe(), route_rx, router));
///
/// manager.restore().await;
/// ```
pub struct SessionManager<S, V> {
    store: S,
    verifier: V,
    state: watch::Sender<Session>,
    restored: OnceCell<()>,
    // Held by every credential write and the state publish that follows it.
    writes: Mutex<()>,
}

impl<S: TokenStore, V: IdentityVerifier> SessionManager<S, V> {
    /// Creates a manager in the `Unknown` state.
    #[must_use]
    pub fn new(store: S, verifier: V) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            store,
            verifier,
            state,
            restored: OnceCell::new(),
            writes: Mutex::new(()),
        }
    }

    /// Receiver notified on every session transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Current session snapshot.
    #[must_use]
    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Bearer token for request authorization, from memory only.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.state.borrow().token().map(str::to_owned)
    }

    /// Resolves the session from stored credentials.
    ///
    /// The restore runs once per manager. Concurrent and later calls await
    /// that same run and return the current snapshot. A missing token
    /// resolves to `Unauthenticated` without touching the network. A token
    /// the server does not confirm, for any reason including network
    /// failure, is purged from storage.
    pub async fn restore(&self) -> Session {
        self.restored
            .get_or_init(|| self.restore_from_store())
            .await;
        self.session()
    }

    async fn restore_from_store(&self) {
        let token = match self.store.get(TOKEN_KEY).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::info!("No stored credentials, session unauthenticated");
                self.settle(Session::unauthenticated());
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored token, clearing credentials");
                self.reject_stored().await;
                return;
            }
        };

        let refresh_token = self.store.get(REFRESH_TOKEN_KEY).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read stored refresh token");
            None
        });

        match self.verifier.verify(&token).await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "Session restored");
                let _writes = self.writes.lock().await;
                self.settle(Session::authenticated(token, refresh_token, user));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Stored token rejected, clearing credentials");
                self.reject_stored().await;
            }
        }
    }

    /// Purges stored credentials and resolves `Unauthenticated`, unless a
    /// login or logout already owns the store.
    async fn reject_stored(&self) {
        let _writes = self.writes.lock().await;
        if self.state.borrow().is_resolved() {
            tracing::debug!("Session resolved during restore, keeping stored credentials");
            return;
        }
        self.purge().await;
        self.settle(Session::unauthenticated());
    }

    /// Publishes a restore result unless login/logout already resolved the session.
    fn settle(&self, session: Session) {
        let applied = self.state.send_if_modified(|current| {
            if current.is_resolved() {
                return false;
            }
            *current = session;
            true
        });
        if !applied {
            tracing::debug!("Restore result discarded, session already resolved");
        }
    }

    /// Stores credentials obtained from a login or registration mutation and
    /// marks the session authenticated. The token is trusted, not re-validated.
    ///
    /// Storage failures are logged and do not block the transition; the
    /// session then lasts only until the process exits.
    pub async fn login(&self, token: String, user: User, refresh_token: Option<String>) {
        let _writes = self.writes.lock().await;
        if let Err(e) = self.store.set(TOKEN_KEY, &token).await {
            tracing::error!(error = %e, "Failed to persist token");
        }
        let refresh_result = match &refresh_token {
            Some(refresh) => self.store.set(REFRESH_TOKEN_KEY, refresh).await,
            None => self.store.delete(REFRESH_TOKEN_KEY).await,
        };
        if let Err(e) = refresh_result {
            tracing::error!(error = %e, "Failed to persist refresh token");
        }

        tracing::info!(user_id = %user.id, "Logged in");
        self.state
            .send_replace(Session::authenticated(token, refresh_token, user));
        let _ = self.restored.set(());
    }

    /// Erases stored credentials (best effort) and marks the session
    /// unauthenticated. Always succeeds in memory.
    pub async fn logout(&self) {
        let _writes = self.writes.lock().await;
        self.purge().await;
        tracing::info!("Logged out");
        self.state.send_replace(Session::unauthenticated());
        let _ = self.restored.set(());
    }

    async fn purge(&self) {
        for key in [TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.store.delete(key).await {
                tracing::warn!(error = %e, key, "Failed to delete stored credential");
            }
        }
    }
}
