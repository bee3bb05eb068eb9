//! Where auth-expired events land in the terminal.

use std::sync::{Mutex, PoisonError};

use crate::session::Navigator;

/// The CLI has no pages. "Navigating" to the login route means telling the
/// user how to sign in again, once per run.
pub struct TerminalNavigator {
    route: Mutex<String>,
}

impl TerminalNavigator {
    pub fn new() -> Self {
        Self {
            route: Mutex::new("/".to_string()),
        }
    }
}

impl Default for TerminalNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for TerminalNavigator {
    fn current_route(&self) -> String {
        self.route
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn navigate(&self, route: &str) {
        *self.route.lock().unwrap_or_else(PoisonError::into_inner) = route.to_string();
        eprintln!(
            "Session expired. Sign in again and store the new token with `collectdesk token set <TOKEN>`."
        );
    }
}
