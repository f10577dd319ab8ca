// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping of [`CourierError`] onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use courier_core::CourierError;
use serde::Serialize;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable description.
    pub error: String,
    /// Stable machine-readable code.
    pub code: &'static str,
}

/// A [`CourierError`] returned from a handler.
#[derive(Debug)]
pub struct ApiError(pub CourierError);

impl From<CourierError> for ApiError {
    fn from(err: CourierError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CourierError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CourierError::MaxReconnectAttemptsReached { .. } => StatusCode::CONFLICT,
            CourierError::MediaUnavailable { .. } => StatusCode::NOT_FOUND,
            CourierError::PairingExpired => StatusCode::GONE,
            CourierError::ConnectionNotReady(_) | CourierError::Config(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            CourierError::Transport { .. } | CourierError::UpstreamRender { .. } => {
                StatusCode::BAD_GATEWAY
            }
            CourierError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            CourierError::Io { .. } | CourierError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(code = self.0.code(), error = %self.0, "request failed");
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
            code: self.0.code(),
        };
        (status, Json(body)).into_response()
    }
}
