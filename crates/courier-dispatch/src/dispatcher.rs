// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns order events into messages and drives delivery.
//!
//! The order notification is always attempted, and its outcome known,
//! before any invoice work begins. Invoice problems never undo a delivered
//! notification; they are reported alongside it.

use std::sync::Arc;
use std::time::Duration;

use courier_core::{
    CourierError, DeliveryResult, InvoiceRenderer, MediaRef, OrderNotificationPayload,
    OutboundMessage, Recipient,
};
use courier_gateway::ProviderGateway;
use courier_media::MediaBroker;
use serde::Serialize;
use tracing::{info, warn};

use crate::format;

/// Dispatcher settings that do not change at runtime.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Currency code appended to amounts.
    pub currency: String,
    /// Name used in test messages.
    pub sender_name: String,
    /// How long rendered invoices stay fetchable.
    pub invoice_ttl: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            currency: "ETB".to_string(),
            sender_name: "courier".to_string(),
            invoice_ttl: Duration::from_secs(600),
        }
    }
}

/// Outcome of [`NotificationDispatcher::send_order_notification_with_invoice`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDispatchReport {
    /// The notification produced a send or a compose link.
    pub success: bool,
    pub notification_sent: bool,
    pub notification: DeliveryResult,
    /// The invoice was delivered by an automated transport.
    pub invoice_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_message_id: Option<String>,
    /// Compose link or public media URL when the invoice was not sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_error: Option<String>,
}

/// Builds notification messages and hands them to the provider gateway.
pub struct NotificationDispatcher {
    gateway: Arc<ProviderGateway>,
    broker: MediaBroker,
    renderer: Option<Arc<dyn InvoiceRenderer>>,
    config: DispatcherConfig,
}

impl NotificationDispatcher {
    pub fn new(gateway: Arc<ProviderGateway>, broker: MediaBroker, config: DispatcherConfig) -> Self {
        Self {
            gateway,
            broker,
            renderer: None,
            config,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn InvoiceRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn gateway(&self) -> &Arc<ProviderGateway> {
        &self.gateway
    }

    /// The configured admin recipient, or a configuration error.
    fn admin_recipient(&self) -> Result<Recipient, CourierError> {
        let settings = self.gateway.settings();
        let raw = settings
            .admin_phone_number
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| CourierError::Config("admin phone number is not configured".into()))?;
        Recipient::parse(raw, &settings.default_country_code)
    }

    /// Alert the admin about a new order.
    ///
    /// Returns `Failed` without sending when order notifications are
    /// switched off.
    pub async fn send_order_notification(
        &self,
        order: &OrderNotificationPayload,
    ) -> Result<DeliveryResult, CourierError> {
        if !self.gateway.settings().enable_order_notifications {
            info!(order = %order.reference(), "order notifications disabled, skipping");
            return Ok(DeliveryResult::Failed {
                reason: "order notifications are disabled".into(),
            });
        }

        let recipient = self.admin_recipient()?;
        let body = format::order_notification(order, &self.config.currency);
        let msg = OutboundMessage::text(recipient, body)?;
        let result = self.gateway.send(&msg).await;
        info!(
            order = %order.reference(),
            sent = result.is_sent(),
            "order notification dispatched"
        );
        Ok(result)
    }

    /// Send the notification, then the rendered invoice as a media-only
    /// message. The invoice is attempted only if the notification produced
    /// something deliverable.
    pub async fn send_order_notification_with_invoice(
        &self,
        order: &OrderNotificationPayload,
    ) -> Result<InvoiceDispatchReport, CourierError> {
        let notification = self.send_order_notification(order).await?;
        let mut report = InvoiceDispatchReport {
            success: notification.is_success(),
            notification_sent: notification.is_success(),
            notification,
            invoice_sent: false,
            invoice_message_id: None,
            invoice_url: None,
            invoice_error: None,
        };
        if !report.success {
            return Ok(report);
        }

        match self.deliver_invoice(order).await {
            Ok(DeliveryResult::Sent { message_id, .. }) => {
                report.invoice_sent = true;
                report.invoice_message_id = Some(message_id.0);
            }
            Ok(DeliveryResult::FallbackLink { url, reason }) => {
                report.invoice_url = Some(url);
                report.invoice_error = reason;
            }
            Ok(DeliveryResult::Failed { reason }) => report.invoice_error = Some(reason),
            Err(e) => {
                warn!(order = %order.reference(), error = %e, "invoice not delivered");
                report.invoice_error = Some(e.to_string());
            }
        }
        Ok(report)
    }

    async fn deliver_invoice(&self, order: &OrderNotificationPayload) -> Result<DeliveryResult, CourierError> {
        let renderer = self.renderer.as_ref().ok_or_else(|| CourierError::UpstreamRender {
            message: "no invoice renderer is configured".into(),
            source: None,
        })?;
        let image = renderer.render_invoice(order).await?;
        let filename = format!("invoice-{}.png", order.reference());
        let id = self.broker.put(image, &filename, self.config.invoice_ttl)?;
        let msg = OutboundMessage::new(self.admin_recipient()?, "", Some(MediaRef::Hosted(id)))?;
        Ok(self.gateway.send(&msg).await)
    }

    /// Tell the customer their order moved from `old_status` to `new_status`.
    pub async fn send_status_update(
        &self,
        order: &OrderNotificationPayload,
        old_status: &str,
        new_status: &str,
    ) -> Result<DeliveryResult, CourierError> {
        let settings = self.gateway.settings();
        let recipient = Recipient::parse(&order.customer.phone, &settings.default_country_code)?;
        let body = format::status_update(order, old_status, new_status);
        let msg = OutboundMessage::text(recipient, body)?;
        let result = self.gateway.send(&msg).await;
        info!(
            order = %order.reference(),
            from = %old_status,
            to = %new_status,
            sent = result.is_sent(),
            "status update dispatched"
        );
        Ok(result)
    }

    /// Send a short test message to `phone_number`.
    pub async fn send_test_message(&self, phone_number: &str) -> Result<DeliveryResult, CourierError> {
        let settings = self.gateway.settings();
        let provider = if settings.is_manual_mode() {
            "manual".to_string()
        } else {
            settings.provider.to_string()
        };
        let body = format::test_message(&self.config.sender_name, &provider);
        self.gateway.send_message(phone_number, &body, None).await
    }
}
