// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier serve` command implementation.
//!
//! Wires the media broker, connection manager, transports, provider gateway
//! and dispatcher from configuration, then runs the HTTP API until a
//! shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use courier_config::CourierConfig;
use courier_core::{CourierError, InvoiceRenderer};
use courier_dispatch::{DispatcherConfig, HttpInvoiceRenderer, NotificationDispatcher};
use courier_gateway::{ProviderGateway, SharedSettings};
use courier_media::{MediaBroker, MediaBrokerConfig};
use courier_prometheus::PrometheusExporter;
use courier_server::{AppState, AuthConfig, HealthState};
use courier_session::{
    BridgeConfig, BridgeDriver, ConnectionManager, MachineConfig, ManagerConfig, SnapshotStore,
};
use courier_transport::{
    BrowserTransport, CloudTransport, ManualLinkTransport, MediaFetcher, SocketTransport,
};
use tracing::{info, warn};

use crate::shutdown;

/// How long the bridge waits for a send acknowledgement.
const BRIDGE_ACK_TIMEOUT: Duration = Duration::from_secs(15);

/// Runs the `courier serve` command.
pub async fn run_serve(config: CourierConfig) -> Result<(), CourierError> {
    init_tracing(&config.courier.log_level);

    info!(name = %config.courier.name, "starting courier serve");

    let exporter = if config.server.prometheus {
        Some(PrometheusExporter::install()?)
    } else {
        None
    };

    let broker = MediaBroker::new(MediaBrokerConfig {
        public_base_url: config.media.public_base_url.clone(),
        default_ttl: Duration::from_secs(config.media.default_ttl_secs),
        max_bytes: config.media.max_bytes,
    });
    let settings = SharedSettings::new(config.messaging_settings());
    let manager = build_connection_manager(&config);

    let gateway = Arc::new(build_gateway(&config, &settings, &broker, &manager)?);
    info!(
        provider = %config.messaging.provider,
        registered = ?gateway.registered(),
        manual_only = config.messaging.prefer_manual_link_only,
        "provider gateway ready"
    );

    let mut dispatcher = NotificationDispatcher::new(
        gateway.clone(),
        broker.clone(),
        DispatcherConfig {
            currency: config.messaging.currency.clone(),
            sender_name: config.courier.name.clone(),
            invoice_ttl: Duration::from_secs(config.media.default_ttl_secs),
        },
    );
    if let Some(url) = config.renderer.invoice_url.as_deref() {
        let renderer = HttpInvoiceRenderer::new(url, Duration::from_secs(config.cloud.timeout_secs))?
            .with_max_bytes(config.media.max_bytes);
        dispatcher = dispatcher.with_renderer(Arc::new(renderer) as Arc<dyn InvoiceRenderer>);
        info!(url, "invoice renderer configured");
    }

    if config.session.auto_connect {
        if manager.has_credentials() {
            match manager.initialize().await {
                Ok(phase) => info!(%phase, "auto-connect started"),
                Err(e) => warn!(error = %e, "auto-connect refused"),
            }
        } else {
            info!("auto-connect skipped, no stored session credentials");
        }
    }

    let cancel = shutdown::install_signal_handler();

    let state = AppState {
        name: config.courier.name.clone(),
        settings,
        broker,
        dispatcher: Arc::new(dispatcher),
        manager: Some(manager),
        initialize_wait: Duration::from_secs(config.session.initialize_wait_secs),
        media_max_bytes: config.media.max_bytes,
        auth: AuthConfig {
            bearer_token: config.server.bearer_token.clone().filter(|t| !t.is_empty()),
        },
        health: HealthState::new(exporter.map(|exporter| {
            Arc::new(move || exporter.render()) as Arc<dyn Fn() -> String + Send + Sync>
        })),
    };
    if state.auth.bearer_token.is_none() {
        warn!("server.bearer_token is not set, every /v1 request will be rejected");
    }

    let server_config = courier_server::ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    let signal = cancel.clone();
    courier_server::start_server(&server_config, state, async move {
        signal.cancelled().await;
    })
    .await?;

    gateway.shutdown().await;
    info!("courier serve shutdown complete");
    Ok(())
}

/// Connection manager over the WebSocket bridge, resuming from the snapshot.
fn build_connection_manager(config: &CourierConfig) -> ConnectionManager {
    let session = &config.session;
    let driver = BridgeDriver::new(BridgeConfig {
        url: session.bridge_url.clone(),
        session_path: PathBuf::from(&session.session_path),
        request_timeout: BRIDGE_ACK_TIMEOUT,
    });
    let manager_config = ManagerConfig {
        machine: MachineConfig {
            max_reconnect_attempts: session.max_reconnect_attempts,
            reconnect_delay: Duration::from_secs(session.reconnect_delay_secs),
            pairing_ttl: Duration::from_secs(session.pairing_ttl_secs),
            pairing_retry_delay: Duration::from_secs(session.pairing_retry_delay_secs),
        },
        stale_connecting: Duration::from_secs(session.stale_connecting_secs),
    };
    ConnectionManager::new(
        Arc::new(driver),
        manager_config,
        Some(SnapshotStore::new(&session.state_file)),
    )
}

/// Register every transport the configuration carries credentials for.
/// The socket transport is always available; the manual link always is.
fn build_gateway(
    config: &CourierConfig,
    settings: &SharedSettings,
    broker: &MediaBroker,
    manager: &ConnectionManager,
) -> Result<ProviderGateway, CourierError> {
    let http_timeout = Duration::from_secs(config.cloud.timeout_secs);
    let fetcher = MediaFetcher::new(broker.clone(), config.media.max_bytes, http_timeout)?;

    let manual =
        ManualLinkTransport::new(&config.messaging.manual_link_base).with_broker(broker.clone());
    let mut gateway = ProviderGateway::new(Arc::new(settings.clone()), manual).with_transport(
        Arc::new(SocketTransport::new(
            manager.clone(),
            fetcher.clone(),
            Duration::from_secs(config.session.send_wait_secs),
        )),
    );

    if config.cloud.access_token.is_some() && config.cloud.phone_number_id.is_some() {
        gateway = gateway.with_transport(Arc::new(CloudTransport::new(&config.cloud, broker.clone())?));
    }
    if config.browser.webdriver_url.is_some() {
        gateway = gateway.with_transport(Arc::new(BrowserTransport::new(&config.browser, fetcher)?));
    }
    Ok(gateway)
}

/// Initializes the tracing subscriber with the given log level.
///
/// `RUST_LOG` overrides the configured level when set.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
