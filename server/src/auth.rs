//! Bearer token guard for the MCP routes.

use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
    Extension,
};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::error::ApiError;

/// Authentication configuration.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// The only accepted bearer token. With no key configured every request is rejected.
    pub api_key: Option<String>,
}

impl AuthConfig {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }

    /// Check if API key authentication is configured
    pub fn has_api_key_auth(&self) -> bool {
        self.api_key.is_some()
    }

    /// Verify API key
    pub fn verify_api_key(&self, key: &str) -> bool {
        self.api_key.as_deref().is_some_and(|k| k == key)
    }

    /// Check the `Authorization: Bearer <token>` header.
    pub fn verify_headers(&self, headers: &HeaderMap) -> bool {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|token| self.verify_api_key(token))
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Authentication middleware. Rejects the request before any handler runs.
pub async fn auth_middleware(
    Extension(config): Extension<Arc<AuthConfig>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if config.verify_headers(request.headers()) {
        return Ok(next.run(request).await);
    }

    warn!(
        "Rejected unauthenticated {} {}",
        request.method(),
        request.uri().path()
    );
    Err(ApiError::Unauthorized)
}
