//! Typed access to the back-office REST resources.
//!
//! All business rules (interest, EMI schedules, officer assignment,
//! collection aggregation) live on the server. This layer only maps
//! operations to paths and decodes what comes back.

mod types;

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use serde_json::{Value, json};

use crate::http::ApiClient;

pub use types::{
    AccountKind, CollectionPeriod, Customer, Officer, OfficerCollectionUpdate, PasswordChange,
};

const OFFICERS: &str = "officers";
const USERS: &str = "users/";
const OFFICER_COLLECTION_DATA: &str = "officerCollectionData";
const CHANGE_PASSWORD: &str = "changePassword";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BackOffice: Send + Sync {
    async fn officers(&self) -> Result<Vec<Officer>>;
    async fn customers(&self) -> Result<Vec<Customer>>;
    async fn customer(&self, id: &str) -> Result<Customer>;
    async fn update_customer(&self, id: &str, fields: Value) -> Result<Customer>;
    async fn accounts(&self, kind: AccountKind) -> Result<Vec<Value>>;
    async fn collections(&self, period: CollectionPeriod) -> Result<Value>;
    async fn update_officer_collection(&self, update: OfficerCollectionUpdate) -> Result<Value>;
    async fn reassign_officer(&self, customer_id: &str, officer_id: &str) -> Result<Customer>;
    async fn change_password(&self, change: PasswordChange) -> Result<()>;
}

/// [`BackOffice`] over the HTTP client facade.
#[derive(Clone)]
pub struct Backend {
    client: ApiClient,
}

impl Backend {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

fn customer_path(id: &str) -> String {
    format!("{}{}", USERS, id)
}

#[async_trait]
impl BackOffice for Backend {
    #[tracing::instrument(skip(self))]
    async fn officers(&self) -> Result<Vec<Officer>> {
        Ok(self.client.get_json(OFFICERS).await?)
    }

    #[tracing::instrument(skip(self))]
    async fn customers(&self) -> Result<Vec<Customer>> {
        Ok(self.client.get_json(USERS).await?)
    }

    #[tracing::instrument(skip(self))]
    async fn customer(&self, id: &str) -> Result<Customer> {
        Ok(self.client.get_json(&customer_path(id)).await?)
    }

    #[tracing::instrument(skip(self, fields))]
    async fn update_customer(&self, id: &str, fields: Value) -> Result<Customer> {
        Ok(self.client.put_json(&customer_path(id), &fields).await?)
    }

    #[tracing::instrument(skip(self))]
    async fn accounts(&self, kind: AccountKind) -> Result<Vec<Value>> {
        Ok(self.client.get_json(kind.path()).await?)
    }

    #[tracing::instrument(skip(self))]
    async fn collections(&self, period: CollectionPeriod) -> Result<Value> {
        debug!("Fetching {} collections...", period);
        Ok(self.client.get_json(period.path()).await?)
    }

    #[tracing::instrument(skip(self))]
    async fn update_officer_collection(&self, update: OfficerCollectionUpdate) -> Result<Value> {
        update.validate()?;
        Ok(self
            .client
            .post_json(OFFICER_COLLECTION_DATA, &update)
            .await?)
    }

    #[tracing::instrument(skip(self))]
    async fn reassign_officer(&self, customer_id: &str, officer_id: &str) -> Result<Customer> {
        let path = format!("{}/officer", customer_path(customer_id));
        Ok(self
            .client
            .put_json(&path, &json!({ "officerId": officer_id }))
            .await?)
    }

    #[tracing::instrument(skip(self, change))]
    async fn change_password(&self, change: PasswordChange) -> Result<()> {
        change.validate()?;
        self.client.post(CHANGE_PASSWORD, serde_json::to_value(&change)?).await?;
        Ok(())
    }
}
