// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider selection with a guaranteed compose-link fallback.
//!
//! Selection order per call:
//! 1. manual mode (policy flag or `provider = "manual"`): compose link, no reason
//! 2. the configured transport: `Sent` on success
//! 3. any failure or missing transport: compose link carrying the reason

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use courier_core::{
    CourierError, DeliveryResult, HealthStatus, MediaRef, OutboundMessage, ProviderKind, Recipient,
    SettingsSource, Transport,
};
use courier_transport::ManualLinkTransport;
use metrics::{counter, histogram};
use tracing::{debug, info, warn};

/// Single entry point for sending; hides which transport is in use.
pub struct ProviderGateway {
    settings: Arc<dyn SettingsSource>,
    transports: HashMap<ProviderKind, Arc<dyn Transport>>,
    manual: ManualLinkTransport,
}

impl ProviderGateway {
    pub fn new(settings: Arc<dyn SettingsSource>, manual: ManualLinkTransport) -> Self {
        Self {
            settings,
            transports: HashMap::new(),
            manual,
        }
    }

    /// Register a transport under its [`Transport::kind`]. A later
    /// registration for the same kind replaces the earlier one.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        let kind = transport.kind();
        if kind == ProviderKind::Manual {
            debug!("manual transport is built in, ignoring registration");
            return self;
        }
        self.transports.insert(kind, transport);
        self
    }

    /// Kinds with a registered automated transport.
    pub fn registered(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<_> = self.transports.keys().copied().collect();
        kinds.sort_by_key(|k| k.to_string());
        kinds
    }

    pub fn settings(&self) -> Arc<courier_core::MessagingSettings> {
        self.settings.current()
    }

    /// Validate caller input, then deliver.
    ///
    /// Only caller errors (malformed recipient, empty message) are returned
    /// as `Err`; every delivery failure becomes a fallback link.
    pub async fn send_message(
        &self,
        recipient: &str,
        body: &str,
        media: Option<MediaRef>,
    ) -> Result<DeliveryResult, CourierError> {
        let settings = self.settings.current();
        let recipient = Recipient::parse(recipient, &settings.default_country_code)?;
        let msg = OutboundMessage::new(recipient, body, media)?;
        Ok(self.send(&msg).await)
    }

    /// Deliver an already-validated message. Never fails: the result is
    /// `Sent` or `FallbackLink`.
    pub async fn send(&self, msg: &OutboundMessage) -> DeliveryResult {
        let settings = self.settings.current();
        if settings.is_manual_mode() {
            counter!("courier_deliveries_total", "provider" => "manual", "outcome" => "link")
                .increment(1);
            debug!(recipient = %msg.recipient.masked(), "manual mode, composing link");
            return self.link(msg, None);
        }

        let provider = settings.provider;
        let Some(transport) = self.transports.get(&provider) else {
            return self.fallback(
                msg,
                provider,
                format!("no {provider} transport is configured"),
            );
        };

        let started = Instant::now();
        let outcome = transport.send(msg).await;
        histogram!("courier_send_duration_seconds", "provider" => provider.to_string())
            .record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(message_id) => {
                counter!(
                    "courier_deliveries_total",
                    "provider" => provider.to_string(),
                    "outcome" => "sent"
                )
                .increment(1);
                info!(
                    provider = %provider,
                    recipient = %msg.recipient.masked(),
                    message_id = %message_id,
                    "message sent"
                );
                DeliveryResult::Sent {
                    message_id,
                    provider,
                }
            }
            Err(e) => self.fallback(msg, provider, e.to_string()),
        }
    }

    /// Compose link for `msg`, regardless of settings.
    pub fn compose_link(&self, msg: &OutboundMessage) -> String {
        self.manual.compose_link(msg)
    }

    fn link(&self, msg: &OutboundMessage, reason: Option<String>) -> DeliveryResult {
        DeliveryResult::FallbackLink {
            url: self.manual.compose_link(msg),
            reason,
        }
    }

    fn fallback(&self, msg: &OutboundMessage, provider: ProviderKind, reason: String) -> DeliveryResult {
        counter!(
            "courier_deliveries_total",
            "provider" => provider.to_string(),
            "outcome" => "fallback"
        )
        .increment(1);
        counter!("courier_fallbacks_total", "provider" => provider.to_string()).increment(1);
        warn!(
            provider = %provider,
            recipient = %msg.recipient.masked(),
            reason = %reason,
            "automated send failed, falling back to compose link"
        );
        self.link(msg, Some(reason))
    }

    /// Health of every registered transport.
    pub async fn health(&self) -> Vec<(ProviderKind, HealthStatus)> {
        let checks = self.transports.iter().map(|(kind, transport)| async move {
            let status = transport
                .health_check()
                .await
                .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
            (*kind, status)
        });
        let mut results = futures::future::join_all(checks).await;
        results.sort_by_key(|(kind, _)| kind.to_string());
        results
    }

    /// Shut down every registered transport, logging failures.
    pub async fn shutdown(&self) {
        for (kind, transport) in &self.transports {
            if let Err(e) = transport.shutdown().await {
                warn!(provider = %kind, error = %e, "transport shutdown error");
            }
        }
    }
}
