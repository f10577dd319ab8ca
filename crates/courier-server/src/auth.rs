// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer token authentication for the `/v1` API.
//!
//! When no token is configured, every request is rejected (fail-closed).

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

/// Authentication configuration for the API routes.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// Expected bearer token. `None` disables access entirely.
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

impl AuthConfig {
    pub fn bearer(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            bearer_token: (!token.is_empty()).then_some(token),
        }
    }

    fn accepts(&self, header: Option<&str>) -> bool {
        match (&self.bearer_token, header.and_then(|v| v.strip_prefix("Bearer "))) {
            (Some(expected), Some(token)) => token == expected,
            _ => false,
        }
    }
}

/// Middleware that checks `Authorization: Bearer <token>`.
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth.bearer_token.is_none() {
        tracing::error!("api has no bearer token configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok());
    if auth.accepts(header) {
        return Ok(next.run(request).await);
    }

    tracing::debug!(path = %request.uri().path(), "rejected unauthenticated request");
    Err(StatusCode::UNAUTHORIZED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_token_counts_as_unset() {
        assert!(AuthConfig::bearer("").bearer_token.is_none());
        assert!(AuthConfig::bearer("s3cret").bearer_token.is_some());
    }

    #[test]
    fn accepts_only_exact_bearer_token() {
        let auth = AuthConfig::bearer("s3cret");
        assert!(auth.accepts(Some("Bearer s3cret")));
        assert!(!auth.accepts(Some("Bearer s3cret2")));
        assert!(!auth.accepts(Some("Basic s3cret")));
        assert!(!auth.accepts(Some("s3cret")));
        assert!(!auth.accepts(None));
    }

    #[test]
    fn unset_token_accepts_nothing() {
        let auth = AuthConfig::default();
        assert!(!auth.accepts(Some("Bearer ")));
        assert!(!auth.accepts(Some("Bearer anything")));
    }

    #[test]
    fn debug_redacts_token() {
        let debug_output = format!("{:?}", AuthConfig::bearer("s3cret"));
        assert!(!debug_output.contains("s3cret"));
        assert!(debug_output.contains("[redacted]"));
    }
}
