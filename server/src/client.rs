//! HTTP client for the Mercury banking API.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use mercury_types::{ListAccountTransactionsResponse, ListAccountsResponse, TransactionQuery};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Default Mercury API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.mercury.com/api/v1";

/// Banking operations exposed as MCP tools.
#[async_trait]
pub trait BankingApi: Send + Sync {
    /// List every account visible to the configured key.
    async fn list_accounts(&self) -> Result<ListAccountsResponse>;

    /// List transactions of one account.
    async fn list_account_transactions(
        &self,
        account_id: Uuid,
        query: &TransactionQuery,
    ) -> Result<ListAccountTransactionsResponse>;
}

/// Client for the Mercury REST API.
#[derive(Clone)]
pub struct MercuryClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl MercuryClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Failed to send request to Mercury")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Mercury API returned {}: {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse Mercury response")
    }
}

#[async_trait]
impl BankingApi for MercuryClient {
    async fn list_accounts(&self) -> Result<ListAccountsResponse> {
        let url = format!("{}/accounts", self.base_url);
        debug!("GET {}", url);
        self.get_json(self.client.get(&url)).await
    }

    async fn list_account_transactions(
        &self,
        account_id: Uuid,
        query: &TransactionQuery,
    ) -> Result<ListAccountTransactionsResponse> {
        let url = format!("{}/account/{}/transactions", self.base_url, account_id);
        debug!("GET {} {:?}", url, query);
        self.get_json(self.client.get(&url).query(query)).await
    }
}

impl fmt::Debug for MercuryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MercuryClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, Query},
        http::{HeaderMap, StatusCode},
        routing::get,
        Json, Router,
    };
    use chrono::NaiveDate;
    use mercury_types::{TransactionStatus, REDACTED};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn account(id: &str, status: &str) -> Value {
        json!({
            "id": id,
            "accountNumber": "123456789",
            "routingNumber": "021000021",
            "name": "Operating",
            "status": status,
            "type": "mercury",
            "createdAt": "2023-05-01T12:00:00Z",
            "availableBalance": 1000.0,
            "currentBalance": 1200.5,
            "kind": "checking",
            "legalBusinessName": "Acme Inc",
            "dashboardLink": "https://app.mercury.com/accounts/1"
        })
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer secret")
    }

    type Seen = Arc<parking_lot::Mutex<Vec<String>>>;

    async fn spawn_fake() -> (String, Seen) {
        let seen: Seen = Arc::default();
        let recorded = seen.clone();
        let app = Router::new()
            .route(
                "/accounts",
                get(|headers: HeaderMap| async move {
                    if !authorized(&headers) {
                        return (StatusCode::UNAUTHORIZED, Json(json!({"errors": "bad key"})));
                    }
                    (
                        StatusCode::OK,
                        Json(json!({ "accounts": [account("a1", "active"), account("a2", "archived")] })),
                    )
                }),
            )
            .route(
                "/account/{id}/transactions",
                get(
                    move |Path(id): Path<String>, Query(query): Query<HashMap<String, String>>| {
                        let recorded = recorded.clone();
                        async move {
                            let mut filters: Vec<_> =
                                query.iter().map(|(k, v)| format!("{k}={v}")).collect();
                            filters.sort();
                            let mut seen = recorded.lock();
                            seen.push(id);
                            seen.extend(filters);
                            Json(json!({ "total": 0, "transactions": [] }))
                        }
                    },
                ),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/", addr), seen)
    }

    #[tokio::test]
    async fn test_list_accounts_redacts_numbers() {
        let (base_url, _) = spawn_fake().await;
        let client = MercuryClient::new(base_url, "secret");

        let response = client.list_accounts().await.unwrap();

        assert_eq!(response.accounts.len(), 2);
        assert_eq!(response.accounts[0].account_number, REDACTED);
        assert_eq!(response.accounts[0].routing_number, REDACTED);
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let (base_url, _) = spawn_fake().await;
        let client = MercuryClient::new(base_url, "wrong");

        let error = client.list_accounts().await.unwrap_err().to_string();

        assert!(error.contains("401"), "{error}");
        assert!(error.contains("bad key"), "{error}");
    }

    #[tokio::test]
    async fn test_transaction_filters_are_forwarded() {
        let (base_url, seen) = spawn_fake().await;
        let client = MercuryClient::new(base_url, "secret");
        let account_id = Uuid::new_v4();
        let query = TransactionQuery {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 31),
            status: Some(TransactionStatus::Sent),
        };

        let response = client
            .list_account_transactions(account_id, &query)
            .await
            .unwrap();

        assert_eq!(response.total, 0);
        assert_eq!(
            *seen.lock(),
            vec![
                account_id.to_string(),
                "endDate=2024-01-31".to_string(),
                "startDate=2024-01-01".to_string(),
                "status=sent".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_query_sends_no_filters() {
        let (base_url, seen) = spawn_fake().await;
        let client = MercuryClient::new(base_url, "secret");
        let account_id = Uuid::new_v4();

        client
            .list_account_transactions(account_id, &TransactionQuery::default())
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec![account_id.to_string()]);
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = MercuryClient::new(DEFAULT_BASE_URL, "super-secret");
        let debug = format!("{:?}", client);
        assert!(!debug.contains("super-secret"));
        assert_eq!(client.base_url(), "https://api.mercury.com/api/v1");
    }
}
