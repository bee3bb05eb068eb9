//! Auth-expired notifications.
//!
//! The HTTP layer never navigates anywhere itself. When the server rejects
//! the stored credentials it emits an auth-expired event, and whatever hosts
//! the client decides what that means.

use log::debug;
use std::sync::{Arc, PoisonError, RwLock};

/// Something that reacts to the stored credentials being rejected.
pub trait AuthListener: Send + Sync {
    fn auth_expired(&self);
}

impl<F> AuthListener for F
where
    F: Fn() + Send + Sync,
{
    fn auth_expired(&self) {
        self()
    }
}

/// Subscriber list for auth-expired events. Clones share subscribers.
#[derive(Clone, Default)]
pub struct AuthEvents {
    listeners: Arc<RwLock<Vec<Arc<dyn AuthListener>>>>,
}

impl AuthEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl AuthListener + 'static) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    pub fn emit_auth_expired(&self) {
        // Listeners run without the lock held so they may subscribe others.
        let listeners: Vec<Arc<dyn AuthListener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        debug!("Auth expired, notifying {} listener(s)", listeners.len());
        for listener in listeners {
            listener.auth_expired();
        }
    }
}

/// Routing surface of the hosting application.
#[cfg_attr(test, mockall::automock)]
pub trait Navigator: Send + Sync {
    fn current_route(&self) -> String;
    fn navigate(&self, route: &str);
}

/// Sends the user to the login route unless they are already on it.
pub struct LoginRedirect<N: Navigator> {
    navigator: N,
    login_route: String,
}

impl<N: Navigator> LoginRedirect<N> {
    pub fn new(navigator: N, login_route: impl Into<String>) -> Self {
        Self {
            navigator,
            login_route: login_route.into(),
        }
    }
}

impl<N: Navigator> AuthListener for LoginRedirect<N> {
    fn auth_expired(&self) {
        if self.navigator.current_route() != self.login_route {
            self.navigator.navigate(&self.login_route);
        }
    }
}
