//! Bank account models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Placeholder stored in place of account and routing numbers.
pub const REDACTED: &str = "[REDACTED]";

/// Lifecycle status of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Archived,
}

/// Kind of deposit account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Checking,
    Savings,
    /// Any kind this crate does not know about yet.
    #[serde(other)]
    Other,
}

/// A Mercury bank account.
///
/// Account and routing numbers are replaced with [`REDACTED`] while
/// deserializing, so they never leave the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    #[serde(deserialize_with = "redact")]
    pub account_number: String,
    #[serde(deserialize_with = "redact")]
    pub routing_number: String,
    pub name: String,
    pub status: AccountStatus,
    #[serde(rename = "type")]
    pub account_type: String,
    pub created_at: DateTime<Utc>,
    pub available_balance: f64,
    pub current_balance: f64,
    pub kind: AccountKind,
    pub legal_business_name: String,
    pub dashboard_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

impl Account {
    pub fn is_archived(&self) -> bool {
        self.status == AccountStatus::Archived
    }
}

/// Response of `GET /accounts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListAccountsResponse {
    pub accounts: Vec<Account>,
}

impl ListAccountsResponse {
    /// Drop archived accounts.
    pub fn without_archived(mut self) -> Self {
        self.accounts.retain(|account| !account.is_archived());
        self
    }
}

fn redact<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let _ = String::deserialize(deserializer)?;
    Ok(REDACTED.to_string())
}
