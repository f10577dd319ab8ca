// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock invoice renderer.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use courier_core::{CourierError, InvoiceRenderer, OrderNotificationPayload};

/// Returns fixed bytes, or fails, and counts calls.
pub struct MockRenderer {
    result: Result<Vec<u8>, String>,
    calls: AtomicUsize,
}

impl MockRenderer {
    /// Renders every order as `bytes`.
    pub fn returning(bytes: Vec<u8>) -> Self {
        Self {
            result: Ok(bytes),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails every render with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InvoiceRenderer for MockRenderer {
    async fn render_invoice(
        &self,
        _order: &OrderNotificationPayload,
    ) -> Result<Vec<u8>, CourierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .clone()
            .map_err(|message| CourierError::UpstreamRender {
                message,
                source: None,
            })
    }
}
