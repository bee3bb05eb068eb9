//! Records exchanged with the back-office API.
//!
//! Only the fields the client relies on are typed. Everything else the
//! server sends is kept in `extra` and written back untouched.

use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRecord")]
pub struct Officer {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A loan or savings customer (the backend calls them users).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRecord")]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    Loan,
    Saving,
}

impl AccountKind {
    pub fn path(self) -> &'static str {
        match self {
            AccountKind::Loan => "accounts/loan",
            AccountKind::Saving => "accounts/saving",
        }
    }
}

impl FromStr for AccountKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "loan" | "loans" => Ok(AccountKind::Loan),
            "saving" | "savings" => Ok(AccountKind::Saving),
            _ => bail!("Unknown account kind: {}. Expected loan or saving.", s),
        }
    }
}

/// Aggregation window for collection totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl CollectionPeriod {
    pub fn path(self) -> &'static str {
        match self {
            CollectionPeriod::Daily => "dailyCollections",
            CollectionPeriod::Weekly => "weeklyCollections",
            CollectionPeriod::Monthly => "monthlyCollections",
        }
    }
}

impl fmt::Display for CollectionPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionPeriod::Daily => write!(f, "daily"),
            CollectionPeriod::Weekly => write!(f, "weekly"),
            CollectionPeriod::Monthly => write!(f, "monthly"),
        }
    }
}

impl FromStr for CollectionPeriod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" | "day" => Ok(CollectionPeriod::Daily),
            "weekly" | "week" => Ok(CollectionPeriod::Weekly),
            "monthly" | "month" => Ok(CollectionPeriod::Monthly),
            _ => bail!(
                "Unknown collection period: {}. Expected daily, weekly, or monthly.",
                s
            ),
        }
    }
}

/// An amount an officer collected on a given day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficerCollectionUpdate {
    pub officer_id: String,
    pub amount: f64,
    pub date: NaiveDate,
}

impl OfficerCollectionUpdate {
    pub fn validate(&self) -> Result<()> {
        if self.officer_id.trim().is_empty() {
            bail!("Officer id must not be empty");
        }
        if !self.amount.is_finite() || self.amount < 0.0 {
            bail!("Collected amount must be a non-negative number");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
    #[serde(skip)]
    pub confirm_password: String,
}

impl PasswordChange {
    /// Checked locally so an obviously bad change never reaches the server.
    pub fn validate(&self) -> Result<()> {
        if self.current_password.is_empty() {
            bail!("Current password must not be empty");
        }
        if self.new_password.is_empty() {
            bail!("New password must not be empty");
        }
        if self.new_password != self.confirm_password {
            bail!("New password and confirmation do not match");
        }
        if self.new_password == self.current_password {
            bail!("New password must differ from the current one");
        }
        Ok(())
    }
}

/// Wire shape of an officer or customer. Documents may carry `id`, the
/// database `_id`, or both.
#[derive(Deserialize)]
struct RawRecord {
    #[serde(default, deserialize_with = "optional_id")]
    id: Option<String>,
    #[serde(rename = "_id", default, deserialize_with = "optional_id")]
    db_id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl RawRecord {
    /// `id` wins over `_id`. A `_id` that is not used as the id stays in
    /// `extra` so it is written back.
    fn into_parts(self) -> Result<(String, String, Map<String, Value>), String> {
        let mut extra = self.extra;
        let id = match (self.id, self.db_id) {
            (Some(id), Some(db_id)) => {
                extra.insert("_id".to_string(), Value::String(db_id));
                id
            }
            (Some(id), None) | (None, Some(id)) => id,
            (None, None) => return Err("record has neither `id` nor `_id`".to_string()),
        };
        Ok((id, self.name, extra))
    }
}

impl TryFrom<RawRecord> for Officer {
    type Error = String;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let (id, name, extra) = raw.into_parts()?;
        Ok(Officer { id, name, extra })
    }
}

impl TryFrom<RawRecord> for Customer {
    type Error = String;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let (id, name, extra) = raw.into_parts()?;
        Ok(Customer { id, name, extra })
    }
}

/// Ids come back as strings from some endpoints and numbers from others.
fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}
