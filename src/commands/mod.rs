use anyhow::{Result, bail};
use log::debug;
use serde::Serialize;
use serde_json::{Value, json};

use crate::http::ApiClient;

mod navigator;
mod resources;
pub mod services;
mod token;

pub use navigator::TerminalNavigator;
pub use resources::{
    accounts, change_password, collect, collections, customer, customers, officers, reassign,
};
pub use services::Services;
pub use token::{mask_token, token_clear, token_set, token_status};

/// Pretty-prints a value as JSON on stdout.
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Probe the health path on the active endpoint.
#[tracing::instrument(skip(client))]
pub async fn health(client: &ApiClient) -> Result<()> {
    let connectivity = client.test_connectivity().await;
    print_json(&connectivity.to_json())?;

    if !connectivity.success() {
        bail!("The API at {} is unreachable", client.active_endpoint());
    }
    Ok(())
}

/// Probe every configured endpoint at once.
#[tracing::instrument(skip(client))]
pub async fn endpoints(client: &ApiClient) -> Result<()> {
    let active = client.active_endpoint();
    let results = client.probe_endpoints().await;
    debug!("Probed {} endpoint(s)", results.len());

    let report: Vec<Value> = results
        .iter()
        .map(|(endpoint, connectivity)| {
            let mut entry = connectivity.to_json();
            entry["endpoint"] = json!(endpoint);
            entry["active"] = json!(*endpoint == active);
            entry
        })
        .collect();
    print_json(&report)?;

    if !results.iter().any(|(_, connectivity)| connectivity.success()) {
        bail!("No configured endpoint is reachable");
    }
    Ok(())
}

/// GET an arbitrary path and print the JSON body.
#[tracing::instrument(skip(client))]
pub async fn get(client: &ApiClient, path: &str) -> Result<()> {
    let value: Value = client.get_json(path).await?;
    print_json(&value)
}
