// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! API server built on axum.
//!
//! Sets up routes, middleware, and shared state.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Router,
    extract::{DefaultBodyLimit, MatchedPath, Request},
    middleware::{self as axum_middleware, Next},
    response::Response,
    routing::{get, post},
};
use courier_core::CourierError;
use courier_dispatch::NotificationDispatcher;
use courier_gateway::SharedSettings;
use courier_media::MediaBroker;
use courier_session::ConnectionManager;
use metrics::counter;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// State for the unauthenticated health and metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

impl HealthState {
    pub fn new(prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>) -> Self {
        Self {
            start_time: Instant::now(),
            prometheus_render,
        }
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Instance name reported by `/health`.
    pub name: String,
    pub settings: SharedSettings,
    pub broker: MediaBroker,
    pub dispatcher: Arc<NotificationDispatcher>,
    /// Socket session, absent when the socket transport is not wired.
    pub manager: Option<ConnectionManager>,
    /// How long `POST /v1/connection/initialize` waits for a pairing code.
    pub initialize_wait: Duration,
    /// Request body ceiling for `POST /v1/media`.
    pub media_max_bytes: usize,
    pub auth: AuthConfig,
    pub health: HealthState,
}

/// Bind address (mirrors `[server]` from courier-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Build the full router: public routes plus the authenticated `/v1` API.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .route("/media/{id}", get(handlers::get_media))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/connection", get(handlers::get_connection))
        .route("/v1/connection/initialize", post(handlers::post_initialize))
        .route("/v1/connection/reset", post(handlers::post_reset))
        .route("/v1/connection/qr", get(handlers::get_qr))
        .route("/v1/messages/test", post(handlers::post_test_message))
        .route("/v1/notifications/order", post(handlers::post_order_notification))
        .route(
            "/v1/notifications/order-with-invoice",
            post(handlers::post_order_with_invoice),
        )
        .route("/v1/notifications/status", post(handlers::post_status_update))
        .route(
            "/v1/settings",
            get(handlers::get_settings).put(handlers::put_settings),
        )
        .route(
            "/v1/media",
            post(handlers::post_media).layer(DefaultBodyLimit::max(state.media_max_bytes)),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(axum_middleware::from_fn(track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Count requests by route template and status.
async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = request.method().to_string();
    let response = next.run(request).await;
    counter!(
        "courier_http_requests_total",
        "method" => method,
        "route" => route,
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);
    response
}

/// Serve the API until `shutdown` resolves, then drain in-flight requests.
pub async fn start_server(
    config: &ServerConfig,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), CourierError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CourierError::Internal(format!("failed to bind api server to {addr}: {e}")))?;

    tracing::info!("API server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| CourierError::Internal(format!("api server error: {e}")))?;

    tracing::info!("API server stopped");
    Ok(())
}
