// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers.
//!
//! Public: `GET /health`, `GET /metrics`, `GET /media/{id}`.
//! Authenticated: everything under `/v1`.

use std::time::Duration;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use courier_core::{
    CourierError, DeliveryResult, HealthStatus, OrderNotificationPayload, ProviderKind, Recipient,
    SettingsSource,
};
use courier_dispatch::InvoiceDispatchReport;
use courier_session::{ConnectionManager, ConnectionStatus, Phase, render_qr};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::server::AppState;

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok` when the selected delivery path is usable, otherwise `degraded`.
    pub status: &'static str,
    pub name: String,
    pub version: String,
    pub uptime_secs: u64,
    pub provider: ProviderKind,
    pub manual_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<Phase>,
    pub transports: Vec<TransportHealth>,
}

#[derive(Debug, Serialize)]
pub struct TransportHealth {
    pub provider: ProviderKind,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl TransportHealth {
    fn new(provider: ProviderKind, health: HealthStatus) -> Self {
        let (status, detail) = match health {
            HealthStatus::Healthy => ("healthy", None),
            HealthStatus::Degraded(d) => ("degraded", Some(d)),
            HealthStatus::Unhealthy(d) => ("unhealthy", Some(d)),
        };
        Self {
            provider,
            status,
            detail,
        }
    }
}

/// Outcome of a single delivery, flattened for API clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,
    /// Compose link when no automated send happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<DeliveryResult> for SendResponse {
    fn from(result: DeliveryResult) -> Self {
        let success = result.is_success();
        let mut resp = Self {
            success,
            message_id: None,
            provider: None,
            whatsapp_url: None,
            error: None,
        };
        match result {
            DeliveryResult::Sent {
                message_id,
                provider,
            } => {
                resp.message_id = Some(message_id.0);
                resp.provider = Some(provider);
            }
            DeliveryResult::FallbackLink { url, reason } => {
                resp.whatsapp_url = Some(url);
                resp.error = reason;
            }
            DeliveryResult::Failed { reason } => resp.error = Some(reason),
        }
        resp
    }
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Response body for `POST /v1/connection/initialize`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    pub status: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairing_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairing_expires_in_secs: Option<u64>,
}

/// Response body for `GET /v1/connection`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatusResponse {
    pub provider: ProviderKind,
    pub is_manual_mode: bool,
    pub session_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairing_code: Option<String>,
    /// Full socket session view, when a socket session is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMessageRequest {
    pub phone_number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub order: OrderNotificationPayload,
    pub old_status: String,
    pub new_status: String,
}

/// Body of `PUT /v1/settings`. Absent fields stay unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub provider: Option<ProviderKind>,
    /// An empty string clears the admin number.
    #[serde(default)]
    pub admin_phone_number: Option<String>,
    #[serde(default)]
    pub enable_order_notifications: Option<bool>,
    #[serde(default)]
    pub prefer_manual_link_only: Option<bool>,
}

/// Messaging settings as exposed to API clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub provider: ProviderKind,
    pub admin_phone_number: Option<String>,
    pub enable_order_notifications: bool,
    pub prefer_manual_link_only: bool,
    pub is_manual_mode: bool,
}

impl SettingsView {
    fn of(settings: &courier_core::MessagingSettings) -> Self {
        Self {
            provider: settings.provider,
            admin_phone_number: settings.admin_phone_number.clone(),
            enable_order_notifications: settings.enable_order_notifications,
            prefer_manual_link_only: settings.prefer_manual_link_only,
            is_manual_mode: settings.is_manual_mode(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MediaUploadParams {
    #[serde(default)]
    pub filename: Option<String>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub ttl: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaResponse {
    pub id: String,
    pub url: String,
    pub expires_in_secs: u64,
}

fn connection_manager(state: &AppState) -> Result<&ConnectionManager, ApiError> {
    state.manager.as_ref().ok_or_else(|| {
        ApiError(CourierError::Config(
            "socket session is not configured".into(),
        ))
    })
}

/// GET /health
pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let settings = state.settings.current();
    let transports: Vec<TransportHealth> = state
        .dispatcher
        .gateway()
        .health()
        .await
        .into_iter()
        .map(|(kind, health)| TransportHealth::new(kind, health))
        .collect();

    let manual_mode = settings.is_manual_mode();
    let selected_healthy = transports
        .iter()
        .any(|t| t.provider == settings.provider && t.status == "healthy");

    Json(HealthResponse {
        status: if manual_mode || selected_healthy {
            "ok"
        } else {
            "degraded"
        },
        name: state.name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        provider: settings.provider,
        manual_mode,
        connection: state.manager.as_ref().map(ConnectionManager::phase),
        transports,
    })
}

/// GET /metrics
pub async fn get_metrics(State(state): State<AppState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /media/{id}
pub async fn get_media(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let asset = state.broker.get(&id)?;
    let disposition = format!("inline; filename=\"{}\"", asset.filename.replace('"', ""));
    let cache = format!("private, max-age={}", asset.remaining().as_secs());
    Ok((
        [
            (header::CONTENT_TYPE, asset.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, cache),
        ],
        asset.payload.clone(),
    )
        .into_response())
}

/// POST /v1/connection/initialize
///
/// Starts connecting and waits briefly for a pairing code or an open session.
pub async fn post_initialize(
    State(state): State<AppState>,
) -> Result<Json<InitializeResponse>, ApiError> {
    let manager = connection_manager(&state)?;
    let status = manager.initialize_and_wait(state.initialize_wait).await?;
    Ok(Json(InitializeResponse {
        status: status.phase,
        pairing_code: status.pairing_code,
        pairing_expires_in_secs: status.pairing_expires_in_secs,
    }))
}

/// GET /v1/connection
pub async fn get_connection(State(state): State<AppState>) -> Json<ProviderStatusResponse> {
    let settings = state.settings.current();
    let connection = state.manager.as_ref().map(ConnectionManager::status);
    Json(ProviderStatusResponse {
        provider: settings.provider,
        is_manual_mode: settings.is_manual_mode(),
        session_exists: connection.as_ref().is_some_and(|c| c.session_exists),
        phase: connection.as_ref().map(|c| c.phase),
        pairing_code: connection.as_ref().and_then(|c| c.pairing_code.clone()),
        connection,
    })
}

/// POST /v1/connection/reset
pub async fn post_reset(State(state): State<AppState>) -> Result<Json<SuccessResponse>, ApiError> {
    connection_manager(&state)?.reset().await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// GET /v1/connection/qr
///
/// The live pairing code as unicode block art.
pub async fn get_qr(State(state): State<AppState>) -> Result<Response, ApiError> {
    let code = connection_manager(&state)?.pairing_code()?;
    let art = render_qr(&code)?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], art).into_response())
}

/// POST /v1/messages/test
pub async fn post_test_message(
    State(state): State<AppState>,
    Json(body): Json<TestMessageRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    let result = state.dispatcher.send_test_message(&body.phone_number).await?;
    Ok(Json(result.into()))
}

/// POST /v1/notifications/order
pub async fn post_order_notification(
    State(state): State<AppState>,
    Json(order): Json<OrderNotificationPayload>,
) -> Result<Json<SendResponse>, ApiError> {
    let result = state.dispatcher.send_order_notification(&order).await?;
    Ok(Json(result.into()))
}

/// POST /v1/notifications/order-with-invoice
pub async fn post_order_with_invoice(
    State(state): State<AppState>,
    Json(order): Json<OrderNotificationPayload>,
) -> Result<Json<InvoiceDispatchReport>, ApiError> {
    let report = state
        .dispatcher
        .send_order_notification_with_invoice(&order)
        .await?;
    Ok(Json(report))
}

/// POST /v1/notifications/status
pub async fn post_status_update(
    State(state): State<AppState>,
    Json(body): Json<StatusUpdateRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    let result = state
        .dispatcher
        .send_status_update(&body.order, &body.old_status, &body.new_status)
        .await?;
    Ok(Json(result.into()))
}

/// GET /v1/settings
pub async fn get_settings(State(state): State<AppState>) -> Json<SettingsView> {
    Json(SettingsView::of(&state.settings.current()))
}

/// PUT /v1/settings
///
/// Applies to the next send; nothing in flight is interrupted.
pub async fn put_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<SettingsView>, ApiError> {
    let current = state.settings.current();

    if let Some(provider) = update.provider {
        let registered = state.dispatcher.gateway().registered();
        if provider != ProviderKind::Manual && !registered.contains(&provider) {
            return Err(CourierError::InvalidInput(format!(
                "provider {provider} is not configured"
            ))
            .into());
        }
    }
    let admin = match update.admin_phone_number.as_deref().map(str::trim) {
        Some("") => Some(None),
        Some(raw) => {
            Recipient::parse(raw, &current.default_country_code)?;
            Some(Some(raw.to_string()))
        }
        None => None,
    };

    let updated = state.settings.update(|s| {
        if let Some(provider) = update.provider {
            s.provider = provider;
        }
        if let Some(admin) = admin {
            s.admin_phone_number = admin;
        }
        if let Some(enabled) = update.enable_order_notifications {
            s.enable_order_notifications = enabled;
        }
        if let Some(manual_only) = update.prefer_manual_link_only {
            s.prefer_manual_link_only = manual_only;
        }
    });
    Ok(Json(SettingsView::of(&updated)))
}

/// POST /v1/media?filename=&ttl=
pub async fn post_media(
    State(state): State<AppState>,
    Query(params): Query<MediaUploadParams>,
    body: Bytes,
) -> Result<(StatusCode, Json<MediaResponse>), ApiError> {
    let ttl = params
        .ttl
        .map(Duration::from_secs)
        .unwrap_or_else(|| state.broker.default_ttl());
    let filename = params.filename.as_deref().unwrap_or("upload.bin");
    let id = state.broker.put(body.to_vec(), filename, ttl)?;
    Ok((
        StatusCode::CREATED,
        Json(MediaResponse {
            url: state.broker.resolve_url(&id),
            id,
            expires_in_secs: ttl.as_secs(),
        }),
    ))
}
