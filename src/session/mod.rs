//! Client-side session state: the stored token and auth-expired events.

mod events;
mod store;

pub use events::{AuthEvents, AuthListener, LoginRedirect, Navigator};
pub use store::{FileStore, MemoryStore, TOKEN_KEY, TokenStore};

#[cfg(test)]
pub use events::MockNavigator;
