//! Bearer API-key authentication for the request surface.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::Response,
};

const BEARER_PREFIX: &str = "Bearer ";

/// Set of accepted API keys.
///
/// An empty, enabled store rejects every request except `/health`.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyStore {
    enabled: bool,
    keys: HashSet<String>,
}

impl ApiKeyStore {
    /// Create a store that requires one of `keys`.
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            enabled: true,
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a store with authentication disabled.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Check if authentication is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of registered keys.
    pub fn count(&self) -> usize {
        self.keys.len()
    }

    /// Check an `Authorization` header value.
    pub fn authorizes(&self, header_value: &str) -> bool {
        header_value
            .strip_prefix(BEARER_PREFIX)
            .map(|key| self.keys.contains(key.trim()))
            .unwrap_or(false)
    }
}

/// Authentication middleware for axum.
pub async fn auth_middleware(
    State(store): State<Arc<ApiKeyStore>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if !store.is_enabled() || request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|header| store.authorizes(header))
        .unwrap_or(false);

    if authorized {
        Ok(next.run(request).await)
    } else {
        tracing::debug!(path = %request.uri().path(), "rejected unauthenticated request");
        Err(StatusCode::UNAUTHORIZED)
    }
}
