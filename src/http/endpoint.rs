//! Base URLs and the currently active endpoint.

use log::debug;
use std::sync::{PoisonError, RwLock};

/// The primary base URL, its ordered fallbacks, and the one currently in use.
///
/// The active endpoint starts as the primary and only changes through
/// [`Endpoints::set_active_endpoint`]. It is never reverted automatically.
#[derive(Debug)]
pub struct Endpoints {
    primary: String,
    fallbacks: Vec<String>,
    active: RwLock<String>,
}

impl Endpoints {
    pub fn new(primary: impl Into<String>, fallbacks: Vec<String>) -> Self {
        let primary = primary.into();
        Self {
            active: RwLock::new(primary.clone()),
            primary,
            fallbacks,
        }
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn fallbacks(&self) -> &[String] {
        &self.fallbacks
    }

    pub fn active(&self) -> String {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_active_endpoint(&self, endpoint: &str) {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        if *active != endpoint {
            debug!("Active endpoint changed from {} to {}", active, endpoint);
            *active = endpoint.to_string();
        }
    }

    /// Primary followed by the fallbacks, without duplicates.
    pub fn all(&self) -> Vec<String> {
        let mut all: Vec<String> = Vec::with_capacity(self.fallbacks.len() + 1);
        for endpoint in std::iter::once(&self.primary).chain(&self.fallbacks) {
            if !all.contains(endpoint) {
                all.push(endpoint.clone());
            }
        }
        all
    }
}

/// Joins a base URL and a relative path with exactly one `/` between them.
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        format!("{}/", base)
    } else {
        format!("{}/{}", base, path)
    }
}
