//! Authentication session lifecycle and the navigation guard derived from it.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use redbit_client::session::{GuardConfig, NavigationGuard, PlatformStore, SessionManager};
//!
//! // 1. Pick the credential store for this platform
//! let manager = Arc::new(SessionManager::new(PlatformStore::detect(), client.clone()));
//!
//! // 2. Let the guard react to session and route changes
//! let guard = NavigationGuard::new(GuardConfig::default());
//! tokio::spawn(guard.run(manager.subscribe(), route_rx, router));
//!
//! // 3. Resolve the stored session once per cold start
//! let session = manager.restore().await;
//! ```

mod error;
mod guard;
mod manager;
mod state;
mod store;
mod traits;

pub use error::StoreError;
pub use guard::{GuardConfig, NavigationGuard, Redirect, Route, Router};
pub use manager::SessionManager;
pub use state::{Session, SessionStatus};
pub use store::{FileTokenStore, MemoryTokenStore, PlatformStore};
pub use traits::{IdentityVerifier, REFRESH_TOKEN_KEY, TOKEN_KEY, TokenStore};
