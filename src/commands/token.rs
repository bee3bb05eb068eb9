//! Storing and clearing the bearer token.

use anyhow::{Result, bail};
use log::info;

use crate::session::{TOKEN_KEY, TokenStore};

/// Store a token obtained from the login flow.
pub fn token_set(store: &dyn TokenStore, token: &str) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        bail!("Token must not be empty");
    }

    store.set(TOKEN_KEY, token)?;
    info!("Stored token {}", mask_token(token));
    println!("Token saved.");
    Ok(())
}

/// Log out locally.
pub fn token_clear(store: &dyn TokenStore) -> Result<()> {
    store.remove(TOKEN_KEY)?;
    println!("Token removed.");
    Ok(())
}

pub fn token_status(store: &dyn TokenStore) -> Result<()> {
    match store.get(TOKEN_KEY)? {
        Some(token) if !token.is_empty() => println!("Token stored: {}", mask_token(&token)),
        _ => println!("No token stored."),
    }
    Ok(())
}

/// Shows the first and last four characters of long tokens only.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}
