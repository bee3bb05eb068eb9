//! Commands over back-office resources.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};

use super::print_json;
use crate::backend::{
    AccountKind, BackOffice, CollectionPeriod, OfficerCollectionUpdate, PasswordChange,
};

#[tracing::instrument(skip(backend))]
pub async fn officers(backend: &dyn BackOffice) -> Result<()> {
    print_json(&backend.officers().await?)
}

#[tracing::instrument(skip(backend))]
pub async fn customers(backend: &dyn BackOffice) -> Result<()> {
    print_json(&backend.customers().await?)
}

#[tracing::instrument(skip(backend))]
pub async fn customer(backend: &dyn BackOffice, id: &str) -> Result<()> {
    print_json(&backend.customer(id).await?)
}

#[tracing::instrument(skip(backend))]
pub async fn accounts(backend: &dyn BackOffice, kind: &str) -> Result<()> {
    let kind: AccountKind = kind.parse()?;
    print_json(&backend.accounts(kind).await?)
}

#[tracing::instrument(skip(backend))]
pub async fn collections(backend: &dyn BackOffice, period: &str) -> Result<()> {
    let period: CollectionPeriod = period.parse()?;
    print_json(&backend.collections(period).await?)
}

/// Move a customer to another officer.
#[tracing::instrument(skip(backend))]
pub async fn reassign(backend: &dyn BackOffice, customer_id: &str, officer_id: &str) -> Result<()> {
    print_json(&backend.reassign_officer(customer_id, officer_id).await?)
}

/// Record what an officer collected. `date` defaults to today.
#[tracing::instrument(skip(backend))]
pub async fn collect(
    backend: &dyn BackOffice,
    officer_id: &str,
    amount: f64,
    date: Option<&str>,
) -> Result<()> {
    let date = match date {
        Some(date) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .with_context(|| format!("Invalid date {:?}, expected YYYY-MM-DD", date))?,
        None => Local::now().date_naive(),
    };

    let update = OfficerCollectionUpdate {
        officer_id: officer_id.to_string(),
        amount,
        date,
    };
    update.validate()?;
    print_json(&backend.update_officer_collection(update).await?)
}

#[tracing::instrument(skip_all)]
pub async fn change_password(backend: &dyn BackOffice, change: PasswordChange) -> Result<()> {
    change.validate()?;
    backend.change_password(change).await?;
    println!("Password changed.");
    Ok(())
}
