use tokio::sync::watch;

use super::state::{Session, SessionStatus};

/// A navigation location split into path segments.
///
/// `"/auth/login"` has segments `["auth", "login"]`; `"/"` has none.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Route {
    segments: Vec<String>,
}

impl Route {
    /// Splits `path` on `/`, ignoring empty segments and any query or
    /// fragment.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }

    /// Top-level route group.
    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// True for `/` and the empty path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Path segments in order.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl From<&str> for Route {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

/// Redirect required by the current session and route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirect {
    ToLogin,
    ToLanding,
}

/// Imperative, non-stacking navigation.
pub trait Router: Send + Sync + 'static {
    fn replace(&self, route: &str);
}

/// Route names the guard works with.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    auth_group: String,
    login_route: String,
    landing_route: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            auth_group: "auth".into(),
            login_route: "/auth/login".into(),
            landing_route: "/(tabs)".into(),
        }
    }
}

impl GuardConfig {
    /// Top-level segment reachable without a session (default `auth`).
    #[must_use]
    pub fn with_auth_group(mut self, group: impl Into<String>) -> Self {
        self.auth_group = group.into();
        self
    }

    /// Where unauthenticated users are sent (default `/auth/login`).
    #[must_use]
    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    /// Where authenticated users are sent (default `/(tabs)`).
    #[must_use]
    pub fn with_landing_route(mut self, route: impl Into<String>) -> Self {
        self.landing_route = route.into();
        self
    }

    /// Route a redirect navigates to.
    #[must_use]
    pub fn target(&self, redirect: Redirect) -> &str {
        match redirect {
            Redirect::ToLogin => &self.login_route,
            Redirect::ToLanding => &self.landing_route,
        }
    }
}

/// Decides which route group the user may be in.
#[derive(Debug, Clone, Default)]
pub struct NavigationGuard {
    config: GuardConfig,
}

impl NavigationGuard {
    /// Guard over the given route names.
    #[must_use]
    pub fn new(config: GuardConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Redirect required for `session` at `route`, if any.
    ///
    /// Never redirects before the session is resolved; the UI shows a
    /// loading indicator meanwhile.
    #[must_use]
    pub fn decide(&self, session: &Session, route: &Route) -> Option<Redirect> {
        if !session.is_resolved() {
            return None;
        }

        let in_auth_group = route.group() == Some(self.config.auth_group.as_str());
        match session.status() {
            SessionStatus::Unauthenticated if !in_auth_group => Some(Redirect::ToLogin),
            SessionStatus::Authenticated if in_auth_group || route.is_root() => {
                Some(Redirect::ToLanding)
            }
            _ => None,
        }
    }

    /// Re-evaluates on every session and route change until either sender
    /// is dropped.
    pub async fn run<R: Router>(
        self,
        mut sessions: watch::Receiver<Session>,
        mut routes: watch::Receiver<Route>,
        router: R,
    ) {
        loop {
            let decision = {
                let session = sessions.borrow_and_update();
                let route = routes.borrow_and_update();
                self.decide(&session, &route)
            };

            if let Some(redirect) = decision {
                let target = self.config.target(redirect);
                tracing::debug!(?redirect, route = target, "Navigation guard redirect");
                router.replace(target);
            }

            tokio::select! {
                changed = sessions.changed() => if changed.is_err() { break },
                changed = routes.changed() => if changed.is_err() { break },
            }
        }
        tracing::debug!("Navigation guard stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::types::User;

    fn authenticated() -> Session {
        Session::authenticated("abc".into(), None, User::new("1", "bob", "b@x.com"))
    }

    struct ChannelRouter(mpsc::UnboundedSender<String>);

    impl Router for ChannelRouter {
        fn replace(&self, route: &str) {
            let _ = self.0.send(route.to_owned());
        }
    }

    #[test]
    fn route_parsing() {
        assert!(Route::parse("/").is_root());
        assert!(Route::parse("").is_root());
        assert_eq!(Route::parse("/auth/login").group(), Some("auth"));
        assert_eq!(Route::parse("(tabs)/explore").group(), Some("(tabs)"));
        assert_eq!(Route::parse("/post/7?ref=feed").segments(), ["post", "7"]);
    }

    #[test]
    fn silent_while_unresolved() {
        let guard = NavigationGuard::default();
        for path in ["/", "/auth/login", "/(tabs)"] {
            assert_eq!(guard.decide(&Session::default(), &Route::parse(path)), None);
        }
    }

    #[test]
    fn unauthenticated_outside_auth_group_goes_to_login() {
        let guard = NavigationGuard::default();
        let session = Session::unauthenticated();

        assert_eq!(guard.decide(&session, &"/(tabs)".into()), Some(Redirect::ToLogin));
        assert_eq!(guard.decide(&session, &"/".into()), Some(Redirect::ToLogin));
        assert_eq!(guard.decide(&session, &"/auth/register".into()), None);
    }

    #[test]
    fn authenticated_in_auth_group_or_root_goes_to_landing() {
        let guard = NavigationGuard::default();
        let session = authenticated();

        assert_eq!(guard.decide(&session, &"/auth/login".into()), Some(Redirect::ToLanding));
        assert_eq!(guard.decide(&session, &"/".into()), Some(Redirect::ToLanding));
        assert_eq!(guard.decide(&session, &"/(tabs)".into()), None);
        assert_eq!(guard.decide(&session, &"/post/7".into()), None);
    }

    #[test]
    fn custom_route_names() {
        let guard = NavigationGuard::new(
            GuardConfig::default()
                .with_auth_group("welcome")
                .with_login_route("/welcome/sign-in")
                .with_landing_route("/feed"),
        );

        let redirect = guard.decide(&Session::unauthenticated(), &"/feed".into());
        assert_eq!(redirect, Some(Redirect::ToLogin));
        assert_eq!(guard.config().target(Redirect::ToLogin), "/welcome/sign-in");
        assert_eq!(guard.decide(&authenticated(), &"/welcome".into()), Some(Redirect::ToLanding));
        assert_eq!(guard.config().target(Redirect::ToLanding), "/feed");
    }

    #[tokio::test]
    async fn run_reacts_to_session_and_route_changes() {
        let (session_tx, session_rx) = watch::channel(Session::default());
        let (route_tx, route_rx) = watch::channel(Route::parse("/(tabs)"));
        let (nav_tx, mut nav_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(NavigationGuard::default().run(
            session_rx,
            route_rx,
            ChannelRouter(nav_tx),
        ));

        // Pending session: route changes alone never redirect.
        route_tx.send_replace(Route::parse("/post/1"));
        let idle = tokio::time::timeout(Duration::from_millis(50), nav_rx.recv()).await;
        assert!(idle.is_err());

        session_tx.send_replace(Session::unauthenticated());
        assert_eq!(nav_rx.recv().await.as_deref(), Some("/auth/login"));

        route_tx.send_replace(Route::parse("/auth/login"));
        session_tx.send_replace(authenticated());
        assert_eq!(nav_rx.recv().await.as_deref(), Some("/(tabs)"));

        session_tx.send_replace(Session::unauthenticated());
        route_tx.send_replace(Route::parse("/(tabs)"));
        assert_eq!(nav_rx.recv().await.as_deref(), Some("/auth/login"));

        drop(session_tx);
        task.await.unwrap();
    }
}
