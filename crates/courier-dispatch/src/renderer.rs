// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for an external invoice renderer.
//!
//! The renderer receives the order as JSON and answers with image bytes.

use std::time::Duration;

use async_trait::async_trait;
use courier_core::{CourierError, InvoiceRenderer, OrderNotificationPayload};
use futures::StreamExt;
use tracing::debug;

/// Largest image accepted unless [`HttpInvoiceRenderer::with_max_bytes`] says otherwise.
const DEFAULT_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Renders invoices by POSTing the order to `url`.
#[derive(Debug, Clone)]
pub struct HttpInvoiceRenderer {
    client: reqwest::Client,
    url: String,
    max_bytes: usize,
}

impl HttpInvoiceRenderer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CourierError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CourierError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            max_bytes: DEFAULT_MAX_BYTES,
        })
    }

    /// Cap the rendered image size; larger responses are abandoned mid-read.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn too_large(&self, seen: u64) -> CourierError {
        render_error(format!(
            "rendered invoice is at least {seen} bytes, limit is {}",
            self.max_bytes
        ))
    }
}

fn render_error(message: String) -> CourierError {
    CourierError::UpstreamRender {
        message,
        source: None,
    }
}

#[async_trait]
impl InvoiceRenderer for HttpInvoiceRenderer {
    async fn render_invoice(
        &self,
        order: &OrderNotificationPayload,
    ) -> Result<Vec<u8>, CourierError> {
        let response = self
            .client
            .post(&self.url)
            .json(order)
            .send()
            .await
            .map_err(|e| CourierError::UpstreamRender {
                message: format!("renderer request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(render_error(format!("renderer returned {status}: {body}")));
        }

        if let Some(len) = response
            .content_length()
            .filter(|&len| len > self.max_bytes as u64)
        {
            return Err(self.too_large(len));
        }

        let mut bytes = Vec::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| CourierError::UpstreamRender {
                message: format!("failed to read renderer response: {e}"),
                source: Some(Box::new(e)),
            })?;
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large((bytes.len() + chunk.len()) as u64));
            }
            bytes.extend_from_slice(&chunk);
        }
        if bytes.is_empty() {
            return Err(render_error("renderer returned an empty image".into()));
        }
        debug!(order = %order.reference(), bytes = bytes.len(), "invoice rendered");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use courier_core::CustomerInfo;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn order() -> OrderNotificationPayload {
        OrderNotificationPayload {
            order_id: "9f1c".into(),
            display_id: None,
            customer: CustomerInfo {
                name: "Abebe".into(),
                phone: "0911234567".into(),
                email: None,
                address: None,
            },
            items: vec![],
            total: 0.0,
            delivery_cost: 0.0,
            discount: 0.0,
            timestamp: chrono::Utc::now(),
            status: "pending".into(),
            order_type: "delivery".into(),
        }
    }

    fn renderer(server: &MockServer) -> HttpInvoiceRenderer {
        HttpInvoiceRenderer::new(format!("{}/render/invoice", server.uri()), Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn posts_order_json_and_returns_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/render/invoice"))
            .and(body_partial_json(serde_json::json!({ "orderId": "9f1c" })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
            .expect(1)
            .mount(&server)
            .await;

        let bytes = renderer(&server).render_invoice(&order()).await.unwrap();
        assert_eq!(&bytes[1..], b"PNG");
    }

    #[tokio::test]
    async fn server_error_is_upstream_render_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("chromium crashed"))
            .mount(&server)
            .await;

        let err = renderer(&server).render_invoice(&order()).await.unwrap_err();
        assert!(matches!(err, CourierError::UpstreamRender { .. }));
        assert!(err.to_string().contains("chromium crashed"));
    }

    #[tokio::test]
    async fn oversized_image_is_upstream_render_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4096]))
            .mount(&server)
            .await;

        let err = renderer(&server)
            .with_max_bytes(1024)
            .render_invoice(&order())
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::UpstreamRender { .. }));
        assert!(err.to_string().contains("limit is 1024"), "got: {err}");
    }

    #[tokio::test]
    async fn empty_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let err = renderer(&server).render_invoice(&order()).await.unwrap_err();
        assert!(err.to_string().contains("empty image"));
    }
}
