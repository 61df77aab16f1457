//! Shared types for the Mercury MCP server.
//!
//! This crate contains the Mercury banking API models returned by the
//! upstream client and surfaced through the MCP tools.

/// Default port for the HTTP binding.
pub const DEFAULT_PORT: u16 = 9236;

pub mod account;
pub mod transaction;

// Re-export commonly used types
pub use account::{Account, AccountKind, AccountStatus, ListAccountsResponse, REDACTED};
pub use transaction::{
    DebitCardInfo, ListAccountTransactionsResponse, Merchant, Transaction, TransactionDetails,
    TransactionKind, TransactionQuery, TransactionStatus,
};
