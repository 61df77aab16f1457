//! MCP tool catalogue and argument parsing.

use chrono::NaiveDate;
use mercury_types::{TransactionQuery, TransactionStatus};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

pub const LIST_ACCOUNTS: &str = "list_accounts";
pub const GET_ACCOUNT_TRANSACTIONS: &str = "get_account_transactions";

/// Errors turning a `tools/call` request into a [`ToolCall`].
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool {0} not found")]
    UnknownTool(String),

    #[error("Invalid arguments for tool {tool}: {reason}")]
    InvalidArguments { tool: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAccountsArgs {
    #[serde(default)]
    pub include_archived: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAccountTransactionsArgs {
    pub account_id: Uuid,
    #[serde(default)]
    pub status: Option<TransactionStatus>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl GetAccountTransactionsArgs {
    pub fn query(&self) -> TransactionQuery {
        TransactionQuery {
            start_date: self.start_date,
            end_date: self.end_date,
            status: self.status,
        }
    }
}

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    ListAccounts(ListAccountsArgs),
    GetAccountTransactions(GetAccountTransactionsArgs),
}

impl ToolCall {
    /// Validate `arguments` against the named tool's input schema.
    pub fn parse(name: &str, arguments: Value) -> Result<Self, ToolError> {
        match name {
            LIST_ACCOUNTS => parse_args(LIST_ACCOUNTS, arguments).map(ToolCall::ListAccounts),
            GET_ACCOUNT_TRANSACTIONS => parse_args(GET_ACCOUNT_TRANSACTIONS, arguments)
                .map(ToolCall::GetAccountTransactions),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::ListAccounts(_) => LIST_ACCOUNTS,
            ToolCall::GetAccountTransactions(_) => GET_ACCOUNT_TRANSACTIONS,
        }
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(
    tool: &'static str,
    arguments: Value,
) -> Result<T, ToolError> {
    // A missing arguments object means "all defaults".
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
        tool,
        reason: e.to_string(),
    })
}

/// Successful tool result carrying `value` as text and structured content.
pub fn success_result<T: Serialize>(value: &T) -> Result<Value, serde_json::Error> {
    let structured = serde_json::to_value(value)?;
    Ok(json!({
        "content": [{ "type": "text", "text": structured.to_string() }],
        "structuredContent": structured
    }))
}

/// Tool result reporting a failed upstream call.
pub fn error_result(message: impl Into<String>) -> Value {
    json!({
        "content": [{ "type": "text", "text": message.into() }],
        "isError": true
    })
}

/// Tool definitions returned by `tools/list`.
pub fn definitions() -> Value {
    let statuses: Vec<&str> = TransactionStatus::ALL.iter().map(|s| s.as_str()).collect();

    json!([
        {
            "name": GET_ACCOUNT_TRANSACTIONS,
            "description": "Get the transactions for a given Mercury account.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "accountId": {
                        "type": "string",
                        "format": "uuid",
                        "description": "The ID of the Mercury account."
                    },
                    "status": {
                        "type": "string",
                        "enum": statuses,
                        "description": "The status of the transactions."
                    },
                    "startDate": {
                        "type": "string",
                        "format": "date",
                        "description": "The start date of the transactions."
                    },
                    "endDate": {
                        "type": "string",
                        "format": "date",
                        "description": "The end date of the transactions."
                    }
                },
                "required": ["accountId"]
            },
            "outputSchema": {
                "type": "object",
                "properties": {
                    "total": { "type": "integer" },
                    "transactions": {
                        "type": "array",
                        "items": transaction_schema(&statuses)
                    }
                },
                "required": ["transactions"]
            }
        },
        {
            "name": LIST_ACCOUNTS,
            "description": "List all Mercury accounts.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "includeArchived": {
                        "type": "boolean",
                        "default": false,
                        "description": "Include archived accounts in the list. By default, archived accounts are not included."
                    }
                },
                "required": []
            },
            "outputSchema": {
                "type": "object",
                "properties": {
                    "accounts": {
                        "type": "array",
                        "items": account_schema()
                    }
                },
                "required": ["accounts"]
            }
        }
    ])
}

fn account_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "string" },
            "accountNumber": { "type": "string" },
            "routingNumber": { "type": "string" },
            "name": { "type": "string" },
            "status": { "type": "string", "enum": ["active", "archived"] },
            "type": { "type": "string" },
            "createdAt": { "type": "string", "format": "date-time" },
            "availableBalance": { "type": "number" },
            "currentBalance": { "type": "number" },
            "kind": { "type": "string" },
            "legalBusinessName": { "type": "string" },
            "dashboardLink": { "type": "string" },
            "nickname": { "type": "string" }
        },
        "required": ["id", "name", "status", "availableBalance", "currentBalance", "kind"]
    })
}

fn transaction_schema(statuses: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "string" },
            "amount": { "type": "number" },
            "createdAt": { "type": "string", "format": "date-time" },
            "postedAt": { "type": ["string", "null"], "format": "date-time" },
            "estimatedDeliveryDate": { "type": "string", "format": "date-time" },
            "status": { "type": "string", "enum": statuses },
            "bankDescription": { "type": "string" },
            "externalMemo": { "type": ["string", "null"] },
            "counterpartyId": { "type": "string" },
            "counterpartyName": { "type": "string" },
            "counterpartyNickname": { "type": ["string", "null"] },
            "kind": { "type": "string" },
            "dashboardLink": { "type": "string" },
            "mercuryCategory": { "type": ["string", "null"] },
            "accountId": { "type": "string" }
        },
        "required": ["id", "amount", "createdAt", "status", "counterpartyName", "kind"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_accounts_defaults() {
        assert_eq!(
            ToolCall::parse(LIST_ACCOUNTS, json!({})).unwrap(),
            ToolCall::ListAccounts(ListAccountsArgs {
                include_archived: false
            })
        );
        assert_eq!(
            ToolCall::parse(LIST_ACCOUNTS, Value::Null).unwrap(),
            ToolCall::ListAccounts(ListAccountsArgs::default())
        );
        assert!(matches!(
            ToolCall::parse(LIST_ACCOUNTS, json!({"includeArchived": "yes"})),
            Err(ToolError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn test_transaction_args() {
        let id = Uuid::new_v4();
        let call = ToolCall::parse(
            GET_ACCOUNT_TRANSACTIONS,
            json!({ "accountId": id, "status": "failed", "startDate": "2024-02-01" }),
        )
        .unwrap();

        let ToolCall::GetAccountTransactions(args) = call else {
            panic!("wrong tool");
        };
        assert_eq!(args.account_id, id);
        assert_eq!(
            args.query(),
            TransactionQuery {
                start_date: NaiveDate::from_ymd_opt(2024, 2, 1),
                end_date: None,
                status: Some(TransactionStatus::Failed),
            }
        );
    }

    #[test]
    fn test_transaction_args_rejected() {
        let cases = [
            json!({}),
            json!({ "accountId": "not-a-uuid" }),
            json!({ "accountId": Uuid::new_v4(), "status": "settled" }),
            json!({ "accountId": Uuid::new_v4(), "endDate": "31/01/2024" }),
        ];
        for arguments in cases {
            assert!(
                ToolCall::parse(GET_ACCOUNT_TRANSACTIONS, arguments.clone()).is_err(),
                "{arguments}"
            );
        }
    }

    #[test]
    fn test_unknown_tool() {
        assert!(matches!(
            ToolCall::parse("transfer_money", json!({})),
            Err(ToolError::UnknownTool(name)) if name == "transfer_money"
        ));
    }

    #[test]
    fn test_definitions_cover_every_tool() {
        let definitions = definitions();
        let names: Vec<&str> = definitions
            .as_array()
            .unwrap()
            .iter()
            .map(|tool| tool["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec![GET_ACCOUNT_TRANSACTIONS, LIST_ACCOUNTS]);

        for tool in definitions.as_array().unwrap() {
            assert_eq!(tool["inputSchema"]["type"], "object");
            assert_eq!(tool["outputSchema"]["type"], "object");
        }
    }

    #[test]
    fn test_result_shapes() {
        let result = success_result(&json!({ "accounts": [] })).unwrap();
        assert_eq!(result["content"][0]["text"], r#"{"accounts":[]}"#);
        assert_eq!(result["structuredContent"], json!({ "accounts": [] }));

        let result = error_result("upstream down");
        assert_eq!(result["isError"], true);
        assert_eq!(result["content"][0]["text"], "upstream down");
    }
}
