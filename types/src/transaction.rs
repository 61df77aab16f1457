//! Account transaction models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Settlement status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Sent,
    Cancelled,
    Failed,
    Reversed,
    Blocked,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 6] = [
        TransactionStatus::Pending,
        TransactionStatus::Sent,
        TransactionStatus::Cancelled,
        TransactionStatus::Failed,
        TransactionStatus::Reversed,
        TransactionStatus::Blocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Sent => "sent",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Reversed => "reversed",
            TransactionStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of money movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionKind {
    DebitCardTransaction,
    InternalTransfer,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebitCardInfo {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debit_card_info: Option<DebitCardInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Merchant {
    pub category_code: String,
    pub id: String,
}

/// A single transaction on a Mercury account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(default)]
    pub fee_id: Option<String>,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub posted_at: Option<DateTime<Utc>>,
    pub estimated_delivery_date: DateTime<Utc>,
    pub status: TransactionStatus,
    #[serde(default)]
    pub note: Option<String>,
    pub bank_description: String,
    #[serde(default)]
    pub external_memo: Option<String>,
    pub counterparty_id: String,
    #[serde(default)]
    pub details: TransactionDetails,
    #[serde(default)]
    pub reason_for_failure: Option<String>,
    #[serde(default)]
    pub failed_at: Option<DateTime<Utc>>,
    pub dashboard_link: String,
    pub counterparty_name: String,
    #[serde(default)]
    pub counterparty_nickname: Option<String>,
    pub kind: TransactionKind,
    #[serde(default)]
    pub currency_exchange_info: Option<Value>,
    pub compliant_with_receipt_policy: bool,
    pub has_generated_receipt: bool,
    #[serde(default)]
    pub credit_account_period_id: Option<String>,
    #[serde(default)]
    pub mercury_category: Option<String>,
    #[serde(default)]
    pub general_ledger_code_name: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Value>,
    #[serde(default)]
    pub related_transactions: Vec<Value>,
    #[serde(default)]
    pub category_data: Option<Value>,
    #[serde(default)]
    pub check_number: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    pub account_id: String,
    #[serde(default)]
    pub merchant: Option<Merchant>,
}

/// Response of `GET /account/{id}/transactions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListAccountTransactionsResponse {
    pub total: u64,
    pub transactions: Vec<Transaction>,
}

/// Optional filters for a transaction listing, serialized as query parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TransactionStatus>,
}
