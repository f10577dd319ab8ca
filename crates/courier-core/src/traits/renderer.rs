// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Invoice renderer collaborator.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::order::OrderNotificationPayload;

/// Produces an invoice image for an order.
///
/// Rendering lives outside the gateway; implementations typically call an
/// HTML-to-image service. Failures surface as [`CourierError::UpstreamRender`].
#[async_trait]
pub trait InvoiceRenderer: Send + Sync {
    async fn render_invoice(&self, order: &OrderNotificationPayload)
    -> Result<Vec<u8>, CourierError>;
}
