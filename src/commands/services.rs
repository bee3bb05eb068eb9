//! Service factory for building command dependencies.
//!
//! Configuration says where things are; this module turns it into the
//! token store, the API client and the typed backend the commands use.

use std::sync::Arc;

use anyhow::Result;
use log::debug;
use reqwest::Client;

use crate::{
    backend::Backend,
    config::Config,
    http::{ApiClient, Endpoints},
    runtime::Runtime,
    session::{AuthEvents, FileStore, LoginRedirect, TokenStore},
};

use super::navigator::TerminalNavigator;

const USER_AGENT: &str = "collectdesk-cli";

/// Build the underlying reqwest client. Timeouts are applied per request.
pub fn build_http_client() -> Result<Client> {
    Ok(Client::builder().user_agent(USER_AGENT).build()?)
}

/// Build the on-disk token store for this configuration.
pub fn build_token_store<R: Runtime + 'static>(runtime: R, config: &Config) -> Arc<dyn TokenStore> {
    Arc::new(FileStore::new(runtime, config.storage_path()))
}

/// Build the API client with the standard interceptors over `store`.
pub fn build_api_client(
    config: &Config,
    store: Arc<dyn TokenStore>,
    events: AuthEvents,
) -> Result<ApiClient> {
    let endpoints = Endpoints::new(config.api_url.clone(), config.fallback_urls.clone());
    debug!("API endpoints: {:?}", endpoints.all());

    Ok(
        ApiClient::with_session(build_http_client()?, endpoints, store, events)
            .with_timeout(config.timeout)
            .with_health_path(config.health_path.clone()),
    )
}

/// Everything a command may need.
pub struct Services {
    pub client: ApiClient,
    pub backend: Backend,
    pub store: Arc<dyn TokenStore>,
}

impl Services {
    pub fn from_config<R: Runtime + 'static>(runtime: R, config: &Config) -> Result<Self> {
        let store = build_token_store(runtime, config);

        let events = AuthEvents::new();
        events.subscribe(LoginRedirect::new(
            TerminalNavigator::new(),
            config.login_route.clone(),
        ));

        let client = build_api_client(config, store.clone(), events)?;
        Ok(Self {
            backend: Backend::new(client.clone()),
            client,
            store,
        })
    }
}
